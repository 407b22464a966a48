//! CLI entrypoint for `netgroup-report`.
//!
//! Fetches the requested netgroups (from `ldaplist` or a saved export),
//! resolves every member's full name, prints a fixed-width report and
//! optionally writes the same rows as CSV. Any error aborts the run before
//! anything is printed to stdout.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error, info};
use netgroup_report::{
    compiler::{FailurePolicy, LookupMode, ReportOptions},
    engine::{Engine, Report},
    export::{export_path, save_report_csv},
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    report::{render_header, render_row},
    source::{FileSource, GroupSource, LdaplistSource, ProfileDirectory, ProfileSource},
    stats::ReportStats,
};

#[derive(Parser, Debug)]
#[command(
    name = "netgroup-report",
    version,
    about = "Report netgroup members with company/environment/role metadata"
)]
struct Args {
    /// Netgroup name(s) to report on
    #[arg(
        short = 'g',
        long = "group",
        num_args = 1..,
        required_unless_present = "input"
    )]
    groups: Vec<String>,

    /// Read group data from a saved `ldaplist -l netgroup` export
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Resolve names from a saved `ldaplist -l passwd` export
    #[arg(short = 'p', long = "profiles")]
    profiles: Option<PathBuf>,

    /// Directory listing command used for live lookups
    #[arg(long = "ldaplist", default_value = LdaplistSource::DEFAULT_PROGRAM)]
    ldaplist: PathBuf,

    /// Timeout in seconds for each external command
    #[arg(long = "timeout", default_value_t = 30)]
    timeout_secs: u64,

    /// Resolve each group's members concurrently
    #[arg(long = "parallel")]
    parallel: bool,

    /// Leave out groups that cannot be reported instead of aborting
    #[arg(long = "skip-invalid-groups")]
    skip_invalid_groups: bool,

    /// Also write the report as CSV (file path or directory)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Override mmap threshold in bytes for --input/--profiles. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Log a run summary (rows, lookups, cache hits)
    #[arg(long = "stats")]
    stats: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress the table (still writes CSV if -o is provided)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    for p in args.input.iter().chain(args.profiles.iter()) {
        if !p.is_file() {
            bail!("input file not found: {}", p.display());
        }
    }
    if args.timeout_secs == 0 {
        bail!("--timeout must be at least 1 second");
    }
    Ok(())
}

fn options(args: &Args) -> ReportOptions {
    ReportOptions {
        lookup_mode: if args.parallel {
            LookupMode::Deferred
        } else {
            LookupMode::Eager
        },
        failure_policy: if args.skip_invalid_groups {
            FailurePolicy::SkipGroup
        } else {
            FailurePolicy::Abort
        },
    }
}

fn generate(args: &Args) -> Result<(Report, ReportStats)> {
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    let ldaplist =
        LdaplistSource::new(&args.ldaplist).with_timeout(Duration::from_secs(args.timeout_secs));
    let groups: Box<dyn GroupSource> = match &args.input {
        Some(path) => Box::new(FileSource::new(path, threshold)),
        None => Box::new(ldaplist.clone()),
    };
    let profiles: Box<dyn ProfileSource> = match &args.profiles {
        Some(path) => {
            let dir = ProfileDirectory::from_path(path, threshold)?;
            info!("loaded {} profile(s) from {}", dir.len(), path.display());
            Box::new(dir)
        }
        None => Box::new(ldaplist),
    };

    let engine = Engine::new(groups, profiles).with_options(options(args));
    let report = engine.run(&args.groups)?;
    let stats = ReportStats::collect(
        &report,
        engine.resolver().lookups(),
        engine.resolver().cache_hits(),
    );
    Ok((report, stats))
}

fn main() {
    let args = Args::parse();
    init_logger(if args.stats {
        args.verbose.max(1)
    } else {
        args.verbose
    });
    match args.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let (report, stats) = match generate(&args) {
        Ok(done) => done,
        Err(e) => {
            error!("failed to build report: {:#}", e);
            std::process::exit(3);
        }
    };

    if !args.quiet {
        println!("{}", render_header().bold());
        for row in &report.rows {
            println!("{}", render_row(row));
        }
    }

    if let Some(output) = &args.output {
        let path = export_path(output);
        if let Err(e) = save_report_csv(&report.rows, &path) {
            error!("failed to write {}: {:#}", path.display(), e);
            std::process::exit(4);
        }
        info!("wrote {} row(s) to {}", report.rows.len(), path.display());
    }

    if args.stats {
        info!("run stats: {}", stats.summary_line());
    }
}

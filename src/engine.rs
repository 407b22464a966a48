//! Engine: wires a group data source, a profile source and the report
//! compiler together for one run. The engine owns the [`NameResolver`], so
//! the name cache lives exactly as long as the engine.
//!
//! Typical usage:
//!
//! ```no_run
//! use netgroup_report::engine::Engine;
//! use netgroup_report::source::LdaplistSource;
//! # fn main() -> anyhow::Result<()> {
//! let ldaplist = LdaplistSource::default();
//! let engine = Engine::new(ldaplist.clone(), ldaplist);
//! let report = engine.run(&["ng_acme_prod_admin".to_string()])?;
//! print!("{}", netgroup_report::report::render_table(&report.rows));
//! # Ok(())
//! # }
//! ```
use std::io;

use anyhow::{Context, Result};
use log::info;

use crate::compiler::{ReportCompiler, ReportOptions, SkippedGroup};
use crate::group::ReportRow;
use crate::ldif::normalize_line;
use crate::resolver::NameResolver;
use crate::source::{GroupSource, ProfileSource, SourceError};

/// Outcome of a run: rows in input order plus any groups left out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub skipped: Vec<SkippedGroup>,
    pub groups: usize,
}

pub struct Engine<G, P> {
    groups: G,
    resolver: NameResolver<P>,
    options: ReportOptions,
}

impl<G: GroupSource, P: ProfileSource> Engine<G, P> {
    pub fn new(groups: G, profiles: P) -> Self {
        Self {
            groups,
            resolver: NameResolver::new(profiles),
            options: ReportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &NameResolver<P> {
        &self.resolver
    }

    /// Fetch the named groups from the group source and compile the report.
    pub fn run(&self, group_names: &[String]) -> Result<Report> {
        let lines = self
            .groups
            .group_lines(group_names)
            .context("fetching group data")?;
        self.compile_stream(lines)
    }

    /// Compile a fallible raw line stream. The last group is always closed
    /// after the stream ends.
    pub fn compile_stream<I>(&self, lines: I) -> Result<Report>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut rows = Vec::new();
        let mut compiler = ReportCompiler::new(&self.resolver, self.options);
        for (n, line) in lines.into_iter().enumerate() {
            let line = line
                .map_err(|e| SourceError::from_io("group data", e))
                .context("reading group data")?;
            compiler
                .feed(normalize_line(&line), &mut rows)
                .with_context(|| format!("group data line {}", n + 1))?;
        }
        compiler
            .finish(&mut rows)
            .context("closing the last group")?;

        let groups = compiler.groups_emitted();
        info!(
            "compiled {} row(s) from {} group(s); {} profile lookup(s), {} cache hit(s)",
            rows.len(),
            groups,
            self.resolver.lookups(),
            self.resolver.cache_hits()
        );
        Ok(Report {
            rows,
            skipped: compiler.into_skipped(),
            groups,
        })
    }

    /// Compile in-memory lines. Intended for tests and small integrations.
    pub fn compile_lines<I, S>(&self, lines: I) -> Result<Report>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compile_stream(lines.into_iter().map(|l| Ok::<String, io::Error>(l.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileError, FailurePolicy, LookupMode};
    use crate::group::GroupError;
    use crate::io::LineIter;
    use crate::source::ProfileDirectory;

    const NETGROUPS: &str = "\
dn: cn=ng_acme_prod_admin,ou=netgroup,dc=example,dc=com
objectClass: nisNetgroup
cn: ng_acme_prod_admin
nisNetgroupTriple: (,alice,)
nisNetgroupTriple: (,bob,)

dn: cn=ng_acme_dev_ro,ou=netgroup,dc=example,dc=com
cn: ng_acme_dev_ro
nisNetgroupTriple: (devbox,,)
nisNetgroupTriple: (,bob,example.com)";

    const PROFILES: &str = "\
uid: alice
gecos: Alice
displayName: Alice Liddell

uid: bob
description: Robert Jones
";

    struct StaticGroups(&'static str);

    impl GroupSource for StaticGroups {
        fn group_lines(&self, _groups: &[String]) -> Result<LineIter, SourceError> {
            Ok(Box::new(
                self.0.lines().map(|l| Ok::<_, io::Error>(l.to_string())),
            ))
        }
    }

    struct BrokenGroups;

    impl GroupSource for BrokenGroups {
        fn group_lines(&self, _groups: &[String]) -> Result<LineIter, SourceError> {
            let lines = vec![
                Ok("cn: ng_acme_prod_admin".to_string()),
                Err(io::Error::other(SourceError::Io {
                    what: "ldaplist".into(),
                    source: io::Error::from(io::ErrorKind::UnexpectedEof),
                })),
            ];
            Ok(Box::new(lines.into_iter()))
        }
    }

    fn profiles() -> ProfileDirectory {
        ProfileDirectory::from_lines(PROFILES.lines())
    }

    #[test]
    fn run_joins_groups_and_names() {
        let engine = Engine::new(StaticGroups(NETGROUPS), profiles());
        let report = engine.run(&["ng_acme_prod_admin".into()]).unwrap();
        let got: Vec<(&str, &str, &str)> = report
            .rows
            .iter()
            .map(|r| {
                (
                    r.group.name.as_str(),
                    r.member.id.as_str(),
                    r.member.full_name.as_str(),
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![
                ("ng_acme_prod_admin", "alice", "Alice Liddell"),
                ("ng_acme_prod_admin", "bob", "Robert Jones"),
                ("ng_acme_dev_ro", "bob", "Robert Jones"),
            ]
        );
        assert_eq!(report.groups, 2);
        assert_eq!(engine.resolver().lookups(), 2);
    }

    #[test]
    fn crlf_and_padding_are_normalized() {
        let engine = Engine::new(StaticGroups(""), profiles());
        let report = engine
            .compile_lines(["  cn: ng_acme_qa_ro \r", "\tnisNetgroupTriple: (,alice,)\r", "\r"])
            .unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].group.environment, "qa");
    }

    #[test]
    fn errors_abort_without_rows() {
        let engine = Engine::new(StaticGroups(""), profiles());
        let err = engine
            .compile_lines([
                "cn: ng_acme_prod_ro",
                "nisNetgroupTriple: (,alice,)",
                "",
                "cn: broken",
                "nisNetgroupTriple: (,bob,)",
            ])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompileError>(),
            Some(CompileError::Group(GroupError::InvalidGroupName { .. }))
        ));
    }

    #[test]
    fn source_failures_are_fatal() {
        let engine = Engine::new(BrokenGroups, profiles()).with_options(ReportOptions {
            lookup_mode: LookupMode::Eager,
            failure_policy: FailurePolicy::SkipGroup,
        });
        let err = engine.run(&[]).unwrap_err();
        assert!(err.downcast_ref::<SourceError>().is_some());
    }

    #[test]
    fn skip_policy_reports_skipped_groups() {
        let engine = Engine::new(StaticGroups(""), profiles()).with_options(ReportOptions {
            lookup_mode: LookupMode::Deferred,
            failure_policy: FailurePolicy::SkipGroup,
        });
        let report = engine
            .compile_lines([
                "cn: ng_acme_prod_ro",
                "nisNetgroupTriple: (,alice,)",
                "nisNetgroupTriple: (,zed,)",
                "",
                "cn: ng_acme_prod_rw",
                "nisNetgroupTriple: (,bob,)",
            ])
            .unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "ng_acme_prod_ro");
        assert_eq!(report.skipped[0].members, 2);
    }
}

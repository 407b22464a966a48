//! Line-producing data sources.
//!
//! Group data and member profiles are fetched through two small traits so the
//! pipeline never knows whether lines come from the `ldaplist` command or from
//! a saved export. Commands run under a watchdog that kills the child once the
//! configured timeout expires.
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::io::{LineIter, ReadLines, open_export};
use crate::ldif::{decode_tuple, normalize_lines};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("failed reading {what}: {source}")]
    Io {
        what: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    /// Recover a `SourceError` that travelled through a line iterator as an
    /// `io::Error`; plain I/O failures become `SourceError::Io`.
    pub fn from_io(what: &str, err: io::Error) -> Self {
        let wrapped = err.get_ref().is_some_and(|inner| inner.is::<SourceError>());
        if !wrapped {
            return SourceError::Io {
                what: what.to_string(),
                source: err,
            };
        }
        match err.into_inner().map(|inner| inner.downcast::<SourceError>()) {
            Some(Ok(source)) => *source,
            _ => SourceError::Io {
                what: what.to_string(),
                source: io::Error::other("unrecoverable source error"),
            },
        }
    }
}

/// Primary source: raw LDIF lines for the requested netgroups.
pub trait GroupSource {
    fn group_lines(&self, groups: &[String]) -> Result<LineIter, SourceError>;
}

/// Secondary source: raw LDIF lines of one member's profile record.
pub trait ProfileSource: Send + Sync {
    fn profile_lines(&self, id: &str) -> Result<Vec<String>, SourceError>;
}

impl<T: GroupSource + ?Sized> GroupSource for Box<T> {
    fn group_lines(&self, groups: &[String]) -> Result<LineIter, SourceError> {
        (**self).group_lines(groups)
    }
}

impl<T: ProfileSource + ?Sized> ProfileSource for Box<T> {
    fn profile_lines(&self, id: &str) -> Result<Vec<String>, SourceError> {
        (**self).profile_lines(id)
    }
}

impl<T: ProfileSource + ?Sized> ProfileSource for &T {
    fn profile_lines(&self, id: &str) -> Result<Vec<String>, SourceError> {
        (**self).profile_lines(id)
    }
}

impl<T: ProfileSource + ?Sized> ProfileSource for Arc<T> {
    fn profile_lines(&self, id: &str) -> Result<Vec<String>, SourceError> {
        (**self).profile_lines(id)
    }
}

/// Runs the Solaris-style `ldaplist -l <map> <keys...>` command.
#[derive(Debug, Clone)]
pub struct LdaplistSource {
    program: PathBuf,
    timeout: Duration,
}

impl Default for LdaplistSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

impl LdaplistSource {
    pub const DEFAULT_PROGRAM: &'static str = "ldaplist";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn<S: AsRef<str>>(&self, map: &str, keys: &[S]) -> Result<ChildLines, SourceError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-l").arg(map);
        for k in keys {
            cmd.arg(k.as_ref());
        }
        let command = describe(&self.program, map, keys);
        debug!("running `{}`", command);
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| SourceError::Io {
            what: command.clone(),
            source: io::Error::other("child stdout was not captured"),
        })?;
        Ok(ChildLines::watch(child, stdout, command, self.timeout))
    }
}

impl GroupSource for LdaplistSource {
    fn group_lines(&self, groups: &[String]) -> Result<LineIter, SourceError> {
        Ok(Box::new(self.spawn("netgroup", groups)?))
    }
}

impl ProfileSource for LdaplistSource {
    fn profile_lines(&self, id: &str) -> Result<Vec<String>, SourceError> {
        self.spawn("passwd", &[id])?
            .collect::<io::Result<Vec<String>>>()
            .map_err(|e| SourceError::from_io(id, e))
    }
}

fn describe<S: AsRef<str>>(program: &Path, map: &str, keys: &[S]) -> String {
    let mut s = format!("{} -l {}", program.display(), map);
    for k in keys {
        s.push(' ');
        s.push_str(k.as_ref());
    }
    s
}

/// Streams a child's stdout line by line. On EOF the child is reaped and a
/// non-zero exit or an expired timeout surfaces as a final `Err` item.
struct ChildLines {
    lines: ReadLines<Box<dyn Read + Send>>,
    exit: mpsc::Receiver<Exit>,
    // Dropping this sender tells the watchdog to kill an unfinished child.
    release: Option<mpsc::Sender<()>>,
    command: String,
    timeout: Duration,
    finished: bool,
}

enum Exit {
    Status(ExitStatus),
    TimedOut,
    Wait(io::Error),
}

impl ChildLines {
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    fn watch<R>(child: Child, stdout: R, command: String, timeout: Duration) -> Self
    where
        R: Read + Send + 'static,
    {
        let (exit_tx, exit) = mpsc::channel();
        let (release, released) = mpsc::channel();
        let deadline = Instant::now() + timeout;
        thread::spawn(move || watchdog(child, deadline, released, exit_tx));
        Self {
            lines: ReadLines::new(Box::new(stdout)),
            exit,
            release: Some(release),
            command,
            timeout,
            finished: false,
        }
    }

    /// Wait for the watchdog's verdict. The watchdog enforces the deadline,
    /// so this returns within the timeout even if the child closed stdout
    /// early and kept running.
    fn reap(&mut self) -> Result<(), SourceError> {
        let exit = self.exit.recv();
        self.release.take();
        match exit {
            Ok(Exit::Status(status)) if status.success() => Ok(()),
            Ok(Exit::Status(status)) => Err(SourceError::Failed {
                command: self.command.clone(),
                status,
            }),
            Ok(Exit::TimedOut) => Err(SourceError::Timeout {
                command: self.command.clone(),
                timeout: self.timeout,
            }),
            Ok(Exit::Wait(source)) => Err(SourceError::Io {
                what: self.command.clone(),
                source,
            }),
            Err(_) => Err(SourceError::Io {
                what: self.command.clone(),
                source: io::Error::other("watchdog exited without a status"),
            }),
        }
    }
}

/// Owns the child until it exits, the deadline passes or the reader goes
/// away. The child is never waited on from any other thread.
fn watchdog(
    mut child: Child,
    deadline: Instant,
    released: mpsc::Receiver<()>,
    exit: mpsc::Sender<Exit>,
) {
    let outcome = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Exit::Status(status),
            Ok(None) => {}
            Err(e) => break Exit::Wait(e),
        }
        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break Exit::TimedOut;
        }
        let pause = ChildLines::POLL_INTERVAL.min(deadline - now);
        if let Err(RecvTimeoutError::Disconnected) = released.recv_timeout(pause) {
            debug!("reader dropped; killing child {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
            return;
        }
    };
    let _ = exit.send(outcome);
}

fn into_io(err: SourceError) -> io::Error {
    match err {
        SourceError::Timeout { .. } => io::Error::new(io::ErrorKind::TimedOut, err),
        _ => io::Error::other(err),
    }
}

impl Iterator for ChildLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.lines.next() {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(e)) => {
                self.finished = true;
                match self.reap() {
                    // A failed or killed child explains the broken pipe better.
                    Err(source) => {
                        debug!("read error on `{}`: {}", self.command, e);
                        Some(Err(into_io(source)))
                    }
                    Ok(()) => Some(Err(e)),
                }
            }
            None => {
                self.finished = true;
                self.reap().err().map(|e| Err(into_io(e)))
            }
        }
    }
}

/// Group data read from a saved `ldaplist -l netgroup` export. The file is
/// taken to contain exactly the groups of interest; requested names are only
/// logged.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    mmap_threshold: u64,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, mmap_threshold: u64) -> Self {
        Self {
            path: path.into(),
            mmap_threshold,
        }
    }
}

impl GroupSource for FileSource {
    fn group_lines(&self, groups: &[String]) -> Result<LineIter, SourceError> {
        if !groups.is_empty() {
            debug!(
                "reading {} from {}; group filter not applied",
                groups.join(", "),
                self.path.display()
            );
        }
        open_export(&self.path, self.mmap_threshold).map_err(|e| SourceError::Io {
            what: self.path.display().to_string(),
            source: io::Error::other(format!("{e:#}")),
        })
    }
}

/// Profile records from a saved `ldaplist -l passwd` export, indexed by `uid`.
/// Unknown ids return an empty record.
#[derive(Debug, Default, Clone)]
pub struct ProfileDirectory {
    records: HashMap<String, Vec<String>>,
}

impl ProfileDirectory {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dir = Self::default();
        let mut block: Vec<String> = Vec::new();
        for line in normalize_lines(lines).chain(std::iter::once(String::new())) {
            if !line.is_empty() {
                block.push(line);
                continue;
            }
            let uid = block.iter().find_map(|l| match decode_tuple(l) {
                Ok(("uid", v)) if !v.is_empty() => Some(v.to_string()),
                _ => None,
            });
            match uid {
                Some(uid) => {
                    dir.records.insert(uid, std::mem::take(&mut block));
                }
                None => block.clear(),
            }
        }
        dir
    }

    pub fn from_path<P: AsRef<Path>>(path: P, mmap_threshold: u64) -> anyhow::Result<Self> {
        let lines = open_export(&path, mmap_threshold)?
            .collect::<io::Result<Vec<String>>>()?;
        Ok(Self::from_lines(lines))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProfileSource for ProfileDirectory {
    fn profile_lines(&self, id: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.records.get(id).cloned().unwrap_or_default())
    }
}

//! Incremental report compiler.
//!
//! [`ReportCompiler`] consumes normalized LDIF lines one at a time. A `cn: `
//! line names the current group, `nisNetgroup*` lines add members, and an
//! empty line closes the group and emits one [`ReportRow`] per member. The
//! stream does not have to end with a blank line, so callers must close the
//! last group with [`ReportCompiler::finish`] (equivalent to feeding `""`).
use log::{debug, warn};

use crate::group::{GroupError, GroupRecord, ReportRow};
use crate::member::{Member, extract_member_id};
use crate::resolver::{NameResolver, ResolveError};
use crate::source::ProfileSource;

/// Prefix of the group identity line.
pub const GROUP_PREFIX: &str = "cn: ";
/// Prefix of membership-triple lines.
pub const MEMBERSHIP_PREFIX: &str = "nisNetgroup";

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// When member names are looked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupMode {
    /// Resolve each member as its line is read.
    #[default]
    Eager,
    /// Collect a group's ids and resolve them concurrently when it closes.
    Deferred,
}

/// What happens to a group that cannot be reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first error aborts the whole run.
    #[default]
    Abort,
    /// Drop the offending group, remember why, and keep going.
    SkipGroup,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub lookup_mode: LookupMode,
    pub failure_policy: FailurePolicy,
}

/// A group left out of the report under [`FailurePolicy::SkipGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    pub name: String,
    pub members: usize,
    pub reason: String,
}

pub struct ReportCompiler<'r, P> {
    resolver: &'r NameResolver<P>,
    options: ReportOptions,
    group_name: String,
    members: Vec<Member>,
    pending: Vec<String>,
    failure: Option<String>,
    dropped: usize,
    skipped: Vec<SkippedGroup>,
    groups_emitted: usize,
}

impl<'r, P: ProfileSource> ReportCompiler<'r, P> {
    pub fn new(resolver: &'r NameResolver<P>, options: ReportOptions) -> Self {
        Self {
            resolver,
            options,
            group_name: String::new(),
            members: Vec::new(),
            pending: Vec::new(),
            failure: None,
            dropped: 0,
            skipped: Vec::new(),
            groups_emitted: 0,
        }
    }

    /// Process one normalized line, appending any completed rows to `rows`.
    pub fn feed(&mut self, line: &str, rows: &mut Vec<ReportRow>) -> Result<(), CompileError> {
        if line.is_empty() {
            return self.flush(rows);
        }
        if let Some(value) = line.strip_prefix(GROUP_PREFIX) {
            self.group_name = value.trim().to_string();
        } else if line.starts_with(MEMBERSHIP_PREFIX) {
            if let Some(id) = extract_member_id(line) {
                self.add_member(id)?;
            }
        }
        Ok(())
    }

    /// Close the last group once the input is exhausted.
    pub fn finish(&mut self, rows: &mut Vec<ReportRow>) -> Result<(), CompileError> {
        self.feed("", rows)
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Members resolved so far for the open group.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Ids waiting for deferred resolution in the open group.
    pub fn pending_ids(&self) -> &[String] {
        &self.pending
    }

    pub fn skipped(&self) -> &[SkippedGroup] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedGroup> {
        self.skipped
    }

    /// Groups that produced rows (or were valid and empty).
    pub fn groups_emitted(&self) -> usize {
        self.groups_emitted
    }

    fn add_member(&mut self, id: &str) -> Result<(), CompileError> {
        if self.failure.is_some() {
            self.dropped += 1;
            return Ok(());
        }
        match self.options.lookup_mode {
            LookupMode::Deferred => self.pending.push(id.to_string()),
            LookupMode::Eager => match self.resolver.resolve(id) {
                Ok(full_name) => self.members.push(Member::new(id, full_name)),
                Err(e) => {
                    self.dropped += 1;
                    self.fail(e.into())?;
                }
            },
        }
        Ok(())
    }

    fn fail(&mut self, err: CompileError) -> Result<(), CompileError> {
        match self.options.failure_policy {
            FailurePolicy::Abort => Err(err),
            FailurePolicy::SkipGroup => {
                self.failure = Some(err.to_string());
                Ok(())
            }
        }
    }

    fn flush(&mut self, rows: &mut Vec<ReportRow>) -> Result<(), CompileError> {
        let name = std::mem::take(&mut self.group_name);
        let members = std::mem::take(&mut self.members);
        let pending = std::mem::take(&mut self.pending);
        let dropped = std::mem::take(&mut self.dropped);
        let failure = self.failure.take();

        if name.is_empty() && members.is_empty() && pending.is_empty() && failure.is_none() {
            // Repeated blank lines, or the explicit flush after a trailing one.
            return Ok(());
        }
        let count = members.len() + pending.len() + dropped;
        if let Some(reason) = failure {
            self.skip(name, count, reason);
            return Ok(());
        }
        match self.emit(&name, members, pending, rows) {
            Ok(emitted) => {
                debug!("group {} closed with {} member(s)", name, emitted);
                self.groups_emitted += 1;
                Ok(())
            }
            Err(e) if self.options.failure_policy == FailurePolicy::SkipGroup => {
                self.skip(name, count, e.to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn emit(
        &self,
        name: &str,
        mut members: Vec<Member>,
        pending: Vec<String>,
        rows: &mut Vec<ReportRow>,
    ) -> Result<usize, CompileError> {
        let group = GroupRecord::parse(name)?;
        if !pending.is_empty() {
            let names = self.resolver.resolve_all(&pending)?;
            members.extend(
                pending
                    .into_iter()
                    .zip(names)
                    .map(|(id, full_name)| Member::new(id, full_name)),
            );
        }
        let emitted = members.len();
        rows.extend(
            members
                .into_iter()
                .map(|m| ReportRow::new(group.clone(), m)),
        );
        Ok(emitted)
    }

    fn skip(&mut self, name: String, members: usize, reason: String) {
        warn!(
            "skipping group {:?} ({} member(s) dropped): {}",
            name, members, reason
        );
        self.skipped.push(SkippedGroup {
            name,
            members,
            reason,
        });
    }
}

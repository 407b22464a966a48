//! Run summary: how much the report covers and how well the name cache did.
use std::collections::HashSet;

use crate::engine::Report;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportStats {
    pub groups: usize,
    pub rows: usize,
    pub distinct_members: usize,
    pub lookups: usize,
    pub cache_hits: usize,
    pub skipped_groups: usize,
}

impl ReportStats {
    pub fn collect(report: &Report, lookups: usize, cache_hits: usize) -> Self {
        let members: HashSet<&str> = report.rows.iter().map(|r| r.member.id.as_str()).collect();
        Self {
            groups: report.groups,
            rows: report.rows.len(),
            distinct_members: members.len(),
            lookups,
            cache_hits,
            skipped_groups: report.skipped.len(),
        }
    }

    /// Share of resolutions served from the cache.
    pub fn hit_rate(&self) -> String {
        let total = self.lookups + self.cache_hits;
        if total == 0 {
            return "0.00%".to_string();
        }
        format!("{:.2}%", (self.cache_hits as f64) / (total as f64) * 100.0)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "groups={} rows={} members={} lookups={} cache_hits={} ({}) skipped={}",
            self.groups,
            self.rows,
            self.distinct_members,
            self.lookups,
            self.cache_hits,
            self.hit_rate(),
            self.skipped_groups
        )
    }
}

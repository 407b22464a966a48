//! CSV export of report rows, one record per (group, member) pair with the
//! same columns as the terminal table.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::Writer;
use serde::Serialize;

use crate::group::ReportRow;

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    groupname: &'a str,
    company: &'a str,
    environment: &'a str,
    role: &'a str,
    keep: &'a str,
    userid: &'a str,
    fullname: &'a str,
}

impl<'a> From<&'a ReportRow> for CsvRow<'a> {
    fn from(r: &'a ReportRow) -> Self {
        Self {
            groupname: &r.group.name,
            company: &r.group.company,
            environment: &r.group.environment,
            role: &r.group.role,
            keep: r.flag,
            userid: &r.member.id,
            fullname: &r.member.full_name,
        }
    }
}

pub fn save_report_csv<P: AsRef<Path>>(rows: &[ReportRow], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    if rows.is_empty() {
        // serialize() only emits the header alongside the first record
        wtr.write_record([
            "groupname",
            "company",
            "environment",
            "role",
            "keep",
            "userid",
            "fullname",
        ])?;
    }
    for r in rows {
        wtr.serialize(CsvRow::from(r))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Resolve the export target: directories get a timestamped file name.
pub fn export_path(output: &Path) -> PathBuf {
    if output.is_dir() {
        let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
        output.join(format!("netgroup_report_{}.csv", ts))
    } else {
        output.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupRecord;
    use crate::member::Member;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows() {
        let rows = vec![ReportRow::new(
            GroupRecord::parse("ng_acme_prod_admin").unwrap(),
            Member::new("bob", "Jones, Robert"),
        )];
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        save_report_csv(&rows, &path).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("groupname,company,environment,role,keep,userid,fullname")
        );
        assert_eq!(
            lines.next(),
            Some("ng_acme_prod_admin,acme,prod,admin,N,bob,\"Jones, Robert\"")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_report_still_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        save_report_csv(&[], &path).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content.trim_end(),
            "groupname,company,environment,role,keep,userid,fullname"
        );
    }

    #[test]
    fn directory_target_gets_timestamped_name() {
        let dir = tempdir().unwrap();
        let p = export_path(dir.path());
        let name = p.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("netgroup_report_"));
        assert!(name.ends_with(".csv"));
        let file = dir.path().join("x.csv");
        assert_eq!(export_path(&file), file);
    }
}

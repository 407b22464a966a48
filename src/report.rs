//! Fixed-width terminal rendering of report rows.
//!
//! Columns are padded to minimum widths and separated by ` : `; longer values
//! are never truncated, so wide names push the rest of their line right.
use crate::group::ReportRow;

/// Column headers in output order.
pub const HEADERS: [&str; 7] = [
    "groupname",
    "company",
    "env",
    "role",
    "keep",
    "userid",
    "fullname",
];

/// Minimum width of each column.
pub const WIDTHS: [usize; 7] = [16, 3, 3, 4, 4, 15, 45];

const SEPARATOR: &str = " : ";

fn format_line(fields: [&str; 7]) -> String {
    let mut line = String::new();
    for (i, (field, width)) in fields.iter().zip(WIDTHS).enumerate() {
        if i > 0 {
            line.push_str(SEPARATOR);
        }
        line.push_str(&format!("{:<width$}", field, width = width));
    }
    line.trim_end().to_string()
}

pub fn render_header() -> String {
    format_line(HEADERS)
}

pub fn render_row(row: &ReportRow) -> String {
    format_line([
        &row.group.name,
        &row.group.company,
        &row.group.environment,
        &row.group.role,
        row.flag,
        &row.member.id,
        &row.member.full_name,
    ])
}

/// Header line followed by one line per row, each newline-terminated.
pub fn render_table(rows: &[ReportRow]) -> String {
    let mut out = render_header();
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupRecord;
    use crate::member::Member;

    fn row(group: &str, id: &str, name: &str) -> ReportRow {
        ReportRow::new(GroupRecord::parse(group).unwrap(), Member::new(id, name))
    }

    #[test]
    fn snapshot_table() {
        let rows = vec![
            row("ng_acme_prod_admin", "alice", "Alice Liddell"),
            row("ng_acme_prod_admin", "bob", "Robert Jones"),
            row("app_initech_uat_ro", "pgibbons", "Peter Gibbons"),
        ];
        insta::assert_snapshot!(render_table(&rows));
    }

    #[test]
    fn empty_report_is_header_only() {
        let out = render_table(&[]);
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("groupname        : company : env : role : keep : userid"));
    }

    #[test]
    fn long_values_are_not_truncated() {
        let r = row("netgroup_verylongcompany_production_admin", "u1", "X");
        let line = render_row(&r);
        assert!(line.starts_with("netgroup_verylongcompany_production_admin : verylongcompany : production"));
        assert!(line.ends_with(" : u1              : X"));
    }
}

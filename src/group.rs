//! Netgroup data model: group metadata decoded from the
//! `prefix_company_environment_role` naming convention, and the joined
//! report row emitted per (group, member) pair.
use crate::member::Member;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("invalid group name {name:?}: expected 4 '_'-separated tokens, found {tokens}")]
    InvalidGroupName { name: String, tokens: usize },
}

/// Group metadata derived from the group name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupRecord {
    pub name: String,
    pub company: String,
    pub environment: String,
    pub role: String,
}

impl GroupRecord {
    /// Separator between naming convention tokens.
    pub const DELIMITER: char = '_';

    /// Decode `prefix_company_environment_role`. Exactly four tokens are
    /// required; empty tokens are accepted.
    pub fn parse(name: &str) -> Result<Self, GroupError> {
        let parts: Vec<&str> = name.split(Self::DELIMITER).collect();
        match parts.as_slice() {
            [_prefix, company, environment, role] => Ok(Self {
                name: name.to_string(),
                company: company.to_string(),
                environment: environment.to_string(),
                role: role.to_string(),
            }),
            _ => Err(GroupError::InvalidGroupName {
                name: name.to_string(),
                tokens: parts.len(),
            }),
        }
    }
}

/// Static value of the flag column.
pub const RETAIN_FLAG: &str = "N";

/// One output row: a member joined with its group's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub group: GroupRecord,
    pub member: Member,
    pub flag: &'static str,
}

impl ReportRow {
    pub fn new(group: GroupRecord, member: Member) -> Self {
        Self {
            group,
            member,
            flag: RETAIN_FLAG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_token_name() {
        let g = GroupRecord::parse("app_acme_prod_admin").unwrap();
        assert_eq!(g.name, "app_acme_prod_admin");
        assert_eq!(g.company, "acme");
        assert_eq!(g.environment, "prod");
        assert_eq!(g.role, "admin");
    }

    #[test]
    fn rejects_wrong_token_counts() {
        for (name, n) in [("onlythree_parts_here", 3), ("a_b_c_d_e", 5), ("", 1)] {
            match GroupRecord::parse(name) {
                Err(GroupError::InvalidGroupName { tokens, .. }) => assert_eq!(tokens, n),
                other => panic!("expected InvalidGroupName for {name:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn row_carries_static_flag() {
        let g = GroupRecord::parse("ng_co_dev_ro").unwrap();
        let row = ReportRow::new(g, Member::new("bob", "Bob Jones"));
        assert_eq!(row.flag, "N");
    }
}

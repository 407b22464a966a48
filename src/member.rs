use std::sync::LazyLock;

use regex::Regex;

/// Second field of a `(host,user,domain)` triple; must be non-empty alphanumeric.
static USER_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",(?P<user>[a-zA-Z0-9]+),").expect("user field pattern is valid")
});

/// A group member with its resolved display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub id: String,
    pub full_name: String,
}

impl Member {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
        }
    }
}

/// Extract the user identifier from a membership-triple line. Lines whose
/// user field is empty or absent yield `None`.
pub fn extract_member_id(line: &str) -> Option<&str> {
    USER_FIELD
        .captures(line)
        .and_then(|caps| caps.name("user"))
        .map(|m| m.as_str())
}

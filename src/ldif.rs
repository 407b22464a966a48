//! Minimal LDIF line handling: whitespace normalization and `attr: value`
//! decoding. Only the flat single-line form emitted by `ldaplist -l` is
//! understood; continuation lines and base64 values are not.

#[derive(Debug, thiserror::Error)]
pub enum LdifError {
    #[error("malformed LDIF record (no ':' separator): {0}")]
    MalformedRecord(String),
}

/// Strip incidental whitespace (including `\r`) from one raw line.
pub fn normalize_line(line: &str) -> &str {
    line.trim()
}

/// Lazily normalize a whole line stream.
pub fn normalize_lines<I, S>(lines: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|l| normalize_line(l.as_ref()).to_string())
}

/// Split a line on its first ':' into a trimmed `(attribute, value)` pair.
/// The attribute name is not validated.
pub fn decode_tuple(line: &str) -> Result<(&str, &str), LdifError> {
    match line.split_once(':') {
        Some((attr, value)) => Ok((attr.trim(), value.trim())),
        None => Err(LdifError::MalformedRecord(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_and_trims_both_halves() {
        assert_eq!(decode_tuple("sn: Dürer").unwrap(), ("sn", "Dürer"));
        assert_eq!(
            decode_tuple("  displayName :   Ann Lee  ").unwrap(),
            ("displayName", "Ann Lee")
        );
    }

    #[test]
    fn keeps_colons_after_the_first() {
        let (attr, value) = decode_tuple("gecos: Smith, J: Ops").unwrap();
        assert_eq!(attr, "gecos");
        assert_eq!(value, "Smith, J: Ops");
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = decode_tuple("sn Dürer").unwrap_err();
        assert!(matches!(err, LdifError::MalformedRecord(ref l) if l == "sn Dürer"));
        assert!(decode_tuple("").is_err());
    }

    #[test]
    fn normalizer_keeps_count_and_order() {
        let raw = vec!["cn: a_b_c_d\r\n", "   ", "\tnisNetgroupTriple: (,x,)  "];
        let out: Vec<String> = normalize_lines(raw).collect();
        assert_eq!(out, vec!["cn: a_b_c_d", "", "nisNetgroupTriple: (,x,)"]);
    }
}

//! dns label rules shared by node names.
//!
//! a valid label is:
//! - 1 to `max_len` characters
//! - lowercase alphanumeric and hyphens only
//! - free of leading or trailing hyphens

use rand::Rng;
use rand::distr::Alphanumeric;

/// errors from dns label validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsLabelError {
    Empty,
    TooLong(usize),
    InvalidCharacters,
    InvalidHyphenPosition,
}

/// validate a string as a dns label.
pub fn validate(s: &str, max_len: usize) -> Result<(), DnsLabelError> {
    if s.is_empty() {
        return Err(DnsLabelError::Empty);
    }

    if s.len() > max_len {
        return Err(DnsLabelError::TooLong(s.len()));
    }

    if !s.chars().all(is_label_char) {
        return Err(DnsLabelError::InvalidCharacters);
    }

    if s.starts_with('-') || s.ends_with('-') {
        return Err(DnsLabelError::InvalidHyphenPosition);
    }

    Ok(())
}

/// sanitise an arbitrary string into a valid dns label.
///
/// lowercases, maps every other character to a hyphen, collapses hyphen
/// runs, strips leading/trailing hyphens and truncates to `max_len`.
/// returns `None` if the result would be empty.
pub fn sanitise(s: &str, max_len: usize) -> Option<String> {
    let mut result = String::with_capacity(s.len().min(max_len));
    // start of string behaves like a preceding hyphen
    let mut last_was_hyphen = true;
    for c in s.chars().flat_map(char::to_lowercase) {
        if result.len() >= max_len {
            break;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            result.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            result.push('-');
            last_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.is_empty() { None } else { Some(result) }
}

/// generate a random string of `len` characters that is safe inside a dns label.
pub fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid() {
        assert!(validate("hello", 63).is_ok());
        assert!(validate("a-b-c", 63).is_ok());
        assert!(validate("123", 63).is_ok());
    }

    #[test]
    fn test_validate_errors() {
        assert_eq!(validate("", 63), Err(DnsLabelError::Empty));
        assert_eq!(validate(&"a".repeat(64), 63), Err(DnsLabelError::TooLong(64)));
        assert_eq!(validate("Hello", 63), Err(DnsLabelError::InvalidCharacters));
        assert_eq!(validate("end-", 63), Err(DnsLabelError::InvalidHyphenPosition));
    }

    #[test]
    fn test_sanitise() {
        assert_eq!(sanitise("Hello World", 63).unwrap(), "hello-world");
        assert_eq!(sanitise("a---b", 63).unwrap(), "a-b");
        assert_eq!(sanitise("---hello---", 63).unwrap(), "hello");
        assert_eq!(sanitise("laptop.local", 63).unwrap(), "laptop-local");
        assert!(sanitise("@@@", 63).is_none());
    }

    #[test]
    fn test_sanitise_truncates_without_trailing_hyphen() {
        let input = format!("{}-tail", "a".repeat(62));
        let out = sanitise(&input, 63).unwrap();
        assert_eq!(out.len(), 62);
        assert!(!out.ends_with('-'));
    }

    #[test]
    fn test_random_suffix() {
        let suffix = random_suffix(8);
        assert_eq!(suffix.len(), 8);
        assert!(validate(&suffix, 8).is_ok());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn sanitised_output_is_valid(s in ".{0,120}") {
            if let Some(label) = sanitise(&s, 63) {
                prop_assert!(validate(&label, 63).is_ok());
            }
        }

        #[test]
        fn valid_labels_are_fixed_points(s in "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?") {
            prop_assume!(!s.contains("--"));
            prop_assert_eq!(sanitise(&s, 63), Some(s.clone()));
        }
    }
}

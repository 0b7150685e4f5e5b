use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};

/// Wildcard token accepted inside PASS/FAIL directives
pub const WILDCARD: &str = ".*";

/// A PASS or FAIL condition checked against captured output.
///
/// Without wildcards the predicate must equal one whole output line. With a
/// `.*` wildcard it becomes an unanchored pattern where `.` also matches
/// newlines, so it can span several lines.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Line(String),
    Pattern(Regex),
}

impl Predicate {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.is_empty() {
            return Err(Error::malformed("empty PASS/FAIL predicate"));
        }

        let matcher = if source.contains(WILDCARD) {
            let regex = Regex::new(&glob_to_regex(&source)).map_err(|e| {
                Error::malformed(format!("predicate '{source}' cannot be compiled: {e}"))
            })?;
            Matcher::Pattern(regex)
        } else {
            Matcher::Line(source.clone())
        };

        Ok(Self { source, matcher })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.matcher, Matcher::Pattern(_))
    }

    pub fn matches(&self, output: &str) -> bool {
        match &self.matcher {
            Matcher::Line(expected) => output
                .lines()
                .any(|line| line.strip_suffix('\r').unwrap_or(line) == expected),
            Matcher::Pattern(regex) => regex.is_match(output),
        }
    }
}

/// Translate `.*` wildcards into a regex, escaping everything else
fn glob_to_regex(source: &str) -> String {
    let pieces: Vec<String> = source.split(WILDCARD).map(regex::escape).collect();
    format!("(?s){}", pieces.join(".*"))
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Predicate {}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matches_whole_line_only() {
        let predicate = Predicate::new("4 of 4").unwrap();
        assert!(!predicate.is_pattern());
        assert!(predicate.matches("1 of 4\n4 of 4\n"));
        assert!(predicate.matches("4 of 4\r\n"));
        assert!(!predicate.matches("14 of 44\n"));
        assert!(!predicate.matches("prefix 4 of 4"));
    }

    #[test]
    fn test_literal_is_case_sensitive() {
        let predicate = Predicate::new("OK").unwrap();
        assert!(!predicate.matches("ok\n"));
    }

    #[test]
    fn test_wildcard_spans_lines() {
        let predicate = Predicate::new("1.*2.*3.*4").unwrap();
        assert!(predicate.is_pattern());
        assert!(predicate.matches("1 of 4\n2 of 4\n3 of 4\n4 of 4\n"));
        assert!(!predicate.matches("1 of 1\n"));
    }

    #[test]
    fn test_wildcard_escapes_other_metacharacters() {
        let predicate = Predicate::new("a+b.*(c)").unwrap();
        assert!(predicate.matches("xa+b then (c)"));
        assert!(!predicate.matches("aab then c"));
    }

    #[test]
    fn test_empty_predicate_is_rejected() {
        assert!(matches!(Predicate::new(""), Err(Error::MalformedConfig(_))));
    }
}

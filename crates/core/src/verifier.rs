//! Decides whether a run met its config's expectations

use serde::Serialize;
use std::fmt;

use crate::types::{ExecutionResult, Predicate, TestConfig};

/// Which check a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AssertionFailure {
    FailPredicateMatched { predicate: String },
    ExitCodeMismatch { expected: i32, actual: i32 },
    NoPassPredicateMatched { predicates: Vec<String> },
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailPredicateMatched { predicate } => {
                write!(f, "FAIL predicate '{predicate}' matched the output")
            }
            Self::ExitCodeMismatch { expected, actual } => {
                write!(f, "expected exit code {expected}, got {actual}")
            }
            Self::NoPassPredicateMatched { predicates } => {
                write!(f, "no PASS predicate matched ({})", predicates.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Passed,
    Failed(AssertionFailure),
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

/// Check `result` against `config`.
///
/// FAIL predicates are checked first and override everything else, then the
/// exit code, then the PASS predicates (any one of them is enough).
pub fn verify(config: &TestConfig, result: &ExecutionResult) -> Verdict {
    let output = result.combined_output();

    if let Some(predicate) = config.fail.iter().find(|p| p.matches(&output)) {
        return Verdict::Failed(AssertionFailure::FailPredicateMatched {
            predicate: predicate.source().to_string(),
        });
    }

    if result.exit_code != config.expected_exit_code {
        return Verdict::Failed(AssertionFailure::ExitCodeMismatch {
            expected: config.expected_exit_code,
            actual: result.exit_code,
        });
    }

    if !config.pass.is_empty() && !config.pass.iter().any(|p| p.matches(&output)) {
        return Verdict::Failed(AssertionFailure::NoPassPredicateMatched {
            predicates: config.pass.iter().map(Predicate::to_string).collect(),
        });
    }

    Verdict::Passed
}

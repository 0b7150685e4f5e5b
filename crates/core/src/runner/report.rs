use std::path::PathBuf;
use std::time::Duration;

use crate::{error::Error, verifier::AssertionFailure};

/// Terminal state of one config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    Passed,
    /// The run finished but an expectation was violated
    Failed(AssertionFailure),
    /// Spawn failure, timeout or build failure; not an assertion failure
    Errored(String),
    Skipped,
}

impl ConfigOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ConfigOutcome::Passed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfigOutcome::Passed => "PASSED",
            ConfigOutcome::Failed(_) => "FAILED",
            ConfigOutcome::Errored(_) => "ERROR",
            ConfigOutcome::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigReport {
    pub name: String,
    /// Rendered RUN pipeline
    pub command: String,
    pub outcome: ConfigOutcome,
    pub duration: Option<Duration>,
    /// Filled in for failed runs only
    pub stdout_tail: String,
    pub stderr_tail: String,
}

impl ConfigReport {
    pub fn new(name: impl Into<String>, command: impl Into<String>, outcome: ConfigOutcome) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            outcome,
            duration: None,
            stdout_tail: String::new(),
            stderr_tail: String::new(),
        }
    }
}

/// Fixture-level state after the runner is done with it
#[derive(Debug)]
pub enum FixtureStatus {
    /// Configs ran (or were skipped) individually
    Completed,
    /// The run was aborted before this fixture started
    Skipped,
    ParseFailed(Error),
    BuildFailed(Error),
}

#[derive(Debug)]
pub struct FixtureReport {
    pub path: PathBuf,
    pub status: FixtureStatus,
    pub configs: Vec<ConfigReport>,
}

impl FixtureReport {
    pub fn is_fixture_error(&self) -> bool {
        matches!(
            self.status,
            FixtureStatus::ParseFailed(_) | FixtureStatus::BuildFailed(_)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    /// Fixtures that failed to parse or build
    pub fixture_errors: usize,
}

/// Everything one `run` produced, in input order
#[derive(Debug, Default)]
pub struct RunReport {
    pub fixtures: Vec<FixtureReport>,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for fixture in &self.fixtures {
            if fixture.is_fixture_error() {
                summary.fixture_errors += 1;
            }
            for config in &fixture.configs {
                summary.total += 1;
                match config.outcome {
                    ConfigOutcome::Passed => summary.passed += 1,
                    ConfigOutcome::Failed(_) => summary.failed += 1,
                    ConfigOutcome::Errored(_) => summary.errored += 1,
                    ConfigOutcome::Skipped => summary.skipped += 1,
                }
            }
        }
        summary
    }

    /// 0 when everything passed, 1 on assertion failures, 2 on tooling errors
    pub fn exit_code(&self) -> i32 {
        let summary = self.summary();
        if summary.fixture_errors > 0 || summary.errored > 0 {
            2
        } else if summary.failed > 0 {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(status: FixtureStatus, outcomes: Vec<ConfigOutcome>) -> FixtureReport {
        FixtureReport {
            path: PathBuf::from("tests/openmp.c"),
            status,
            configs: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| ConfigReport::new(format!("c{i}"), "true", outcome))
                .collect(),
        }
    }

    #[test]
    fn test_all_passed_exits_zero() {
        let report = RunReport {
            fixtures: vec![fixture(
                FixtureStatus::Completed,
                vec![ConfigOutcome::Passed, ConfigOutcome::Passed],
            )],
        };
        assert_eq!(report.summary().passed, 2);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_assertion_failure_exits_one() {
        let failure = AssertionFailure::ExitCodeMismatch {
            expected: 2,
            actual: 0,
        };
        let report = RunReport {
            fixtures: vec![fixture(
                FixtureStatus::Completed,
                vec![ConfigOutcome::Passed, ConfigOutcome::Failed(failure)],
            )],
        };
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_errors_take_precedence() {
        let report = RunReport {
            fixtures: vec![
                fixture(
                    FixtureStatus::Completed,
                    vec![ConfigOutcome::Errored("timed out".to_string()), ConfigOutcome::Skipped],
                ),
                fixture(
                    FixtureStatus::ParseFailed(Error::MalformedConfig("bad".to_string())),
                    vec![],
                ),
            ],
        };
        let summary = report.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.fixture_errors, 1);
        assert_eq!(report.exit_code(), 2);
    }
}

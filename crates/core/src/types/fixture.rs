use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Predicate;
use crate::command::Pipeline;

/// One named run scenario of a fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestConfig {
    pub name: String,
    /// Assignments applied on top of the allow-listed environment, in order
    pub env: Vec<(String, String)>,
    pub run: Pipeline,
    pub pass: Vec<Predicate>,
    pub fail: Vec<Predicate>,
    pub expected_exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl TestConfig {
    pub fn new(name: impl Into<String>, run: Pipeline) -> Self {
        Self {
            name: name.into(),
            env: Vec::new(),
            run,
            pass: Vec::new(),
            fail: Vec::new(),
            expected_exit_code: 0,
            timeout: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_pass(mut self, predicate: Predicate) -> Self {
        self.pass.push(predicate);
        self
    }

    pub fn with_fail(mut self, predicate: Predicate) -> Self {
        self.fail.push(predicate);
        self
    }

    pub fn with_expected_exit_code(mut self, code: i32) -> Self {
        self.expected_exit_code = code;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of `key` as the child will see it from this config's overlay
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A source file, the artifact built from it, and its configs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFixture {
    pub path: PathBuf,
    pub binary: PathBuf,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    /// In `CONFIGS` order
    pub configs: Vec<TestConfig>,
}

impl SourceFixture {
    pub fn config(&self, name: &str) -> Option<&TestConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    pub fn config_names(&self) -> impl Iterator<Item = &str> {
        self.configs.iter().map(|c| c.name.as_str())
    }

    /// Name used in reports, the file name when there is one
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

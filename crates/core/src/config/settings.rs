use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAMES: [&str; 2] = [".easytest.json", "easytest.json"];

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TAIL_LINES: usize = 10;
const DEFAULT_BUILD_DIR: &str = "target/easytest";
const DEFAULT_RUN: &str = "@BINARY@";

/// Variables children inherit from the runner when no allow-list is configured
pub const DEFAULT_ENV_ALLOWLIST: [&str; 7] =
    ["PATH", "HOME", "TMPDIR", "LANG", "LC_ALL", "TERM", "SYSTEMROOT"];

pub const DEFAULT_TOOLS: [&str; 9] = [
    "sort", "uniq", "grep", "head", "tail", "wc", "cat", "diff", "env",
];

pub const DEFAULT_EXTENSIONS: [&str; 8] = ["c", "cc", "cpp", "cxx", "f", "f90", "cu", "rs"];

/// Compiler invocation template.
///
/// `@SOURCE@` and `@BINARY@` are substituted inside args, while an arg that is
/// exactly `@COMPILE_FLAGS@` or `@LINK@` expands to the fixture's flag list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            command: "cc".to_string(),
            args: vec![
                "@COMPILE_FLAGS@".to_string(),
                "-o".to_string(),
                "@BINARY@".to_string(),
                "@SOURCE@".to_string(),
                "@LINK@".to_string(),
            ],
        }
    }
}

/// Contents of `.easytest.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Extra placeholder values, e.g. `OpenMP_C_FLAGS`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub symbols: BTreeMap<String, String>,
    /// Tool names looked up on PATH and exposed as `@name@`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<PathBuf>,
    /// Directory the compiler and every RUN stage start in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// File extensions picked up when a directory is given to `run`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_allowlist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<usize>,
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents).map_err(|e| {
            Error::ConfigError(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path;

        loop {
            for name in CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    return Some(config_path);
                }
            }

            current = current.parent()?;
        }
    }

    /// Load the nearest config file above `start_path`, or defaults when none exists
    pub fn discover(start_path: &Path) -> Result<(Self, Option<PathBuf>)> {
        match Self::find_config_file(start_path) {
            Some(path) => Ok((Self::load_from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// The configuration written by `easytest init`
    pub fn starter() -> Self {
        Self {
            symbols: BTreeMap::from([("OpenMP_C_FLAGS".to_string(), "-fopenmp".to_string())]),
            tools: Some(DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect()),
            compiler: Some(CompilerSettings::default()),
            build_dir: Some(PathBuf::from(DEFAULT_BUILD_DIR)),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn jobs(&self) -> usize {
        self.jobs.filter(|jobs| *jobs > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn tail_lines(&self) -> usize {
        self.tail_lines.unwrap_or(DEFAULT_TAIL_LINES)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.build_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR))
    }

    pub fn default_run(&self) -> &str {
        self.default_run.as_deref().unwrap_or(DEFAULT_RUN)
    }

    pub fn tools(&self) -> Vec<String> {
        self.tools
            .clone()
            .unwrap_or_else(|| DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect())
    }

    pub fn extensions(&self) -> Vec<String> {
        self.extensions
            .clone()
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect())
    }

    pub fn env_allowlist(&self) -> Vec<String> {
        self.env_allowlist
            .clone()
            .unwrap_or_else(|| DEFAULT_ENV_ALLOWLIST.iter().map(|v| v.to_string()).collect())
    }

    /// Resolve relative build and working dirs against the directory holding the config file
    pub fn anchor_paths(&mut self, config_path: &Path) {
        let Some(base) = config_path.parent() else {
            return;
        };
        let build_dir = self.build_dir();
        if build_dir.is_relative() {
            self.build_dir = Some(base.join(build_dir));
        }
        if let Some(dir) = self.working_dir.as_mut().filter(|dir| dir.is_relative()) {
            *dir = base.join(&*dir);
        }
    }
}

//! Main runner that coordinates parsing, building, execution and verification

pub mod report;

pub use report::{ConfigOutcome, ConfigReport, FixtureReport, FixtureStatus, RunReport, Summary};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    command::{Builder, binary_path},
    config::Settings,
    error::Result,
    executor::Executor,
    parser::{BINARY, FixtureParser, SOURCE, SymbolTable},
    types::{SourceFixture, TestConfig, tail},
    verifier::{Verdict, verify},
};

/// Shared flag that stops the runner between configs and fixtures
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs fixtures on a worker pool; configs within one fixture run in order
pub struct Runner {
    symbols: SymbolTable,
    default_run: String,
    build_dir: PathBuf,
    builder: Option<Builder>,
    executor: Executor,
    jobs: usize,
    filter: Option<String>,
    fail_fast: bool,
    tail_lines: usize,
    abort: AbortSignal,
}

impl Runner {
    pub fn new(symbols: SymbolTable, executor: Executor) -> Self {
        let defaults = Settings::default();
        Self {
            symbols,
            default_run: defaults.default_run().to_string(),
            build_dir: defaults.build_dir(),
            builder: None,
            executor,
            jobs: 1,
            filter: None,
            fail_fast: false,
            tail_lines: defaults.tail_lines(),
            abort: AbortSignal::new(),
        }
    }

    /// Build a runner from `.easytest.json` settings, resolving tools on PATH
    pub fn from_settings(settings: &Settings) -> Self {
        let mut symbols: SymbolTable = settings.symbols.clone().into_iter().collect();
        let path_var = std::env::var("PATH").ok();
        let tools: Vec<String> = settings
            .tools()
            .into_iter()
            .filter(|tool| symbols.get(tool).is_none())
            .collect();
        symbols.add_tools(&tools, path_var.as_deref());
        debug!("Symbol table has {} entries", symbols.len());

        let mut executor =
            Executor::new(settings.timeout()).with_env_allowlist(settings.env_allowlist());
        if let Some(dir) = &settings.working_dir {
            executor = executor.with_working_dir(dir);
        }

        let mut runner = Self::new(symbols, executor)
            .with_default_run(settings.default_run())
            .with_build_dir(settings.build_dir())
            .with_jobs(settings.jobs())
            .with_tail_lines(settings.tail_lines());
        if let Some(compiler) = &settings.compiler {
            let mut builder = Builder::new(compiler.clone());
            if let Some(dir) = &settings.working_dir {
                builder = builder.with_working_dir(dir);
            }
            runner = runner.with_builder(builder);
        }
        runner
    }

    pub fn with_default_run(mut self, template: impl Into<String>) -> Self {
        self.default_run = template.into();
        self
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    pub fn with_builder(mut self, builder: Builder) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Symbol table for one fixture: the shared symbols plus SOURCE and BINARY
    pub fn symbols_for(&self, source: &Path) -> SymbolTable {
        let binary = binary_path(&self.build_dir, source, self.builder.is_some());
        // Stages may start in a configured working dir
        let source = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
        self.symbols
            .clone()
            .with(SOURCE, source.to_string_lossy())
            .with(BINARY, binary.to_string_lossy())
    }

    pub fn parse_fixture(&self, path: &Path) -> Result<SourceFixture> {
        self.parser(&self.symbols_for(path)).parse_file(path)
    }

    fn parser<'a>(&self, symbols: &'a SymbolTable) -> FixtureParser<'a> {
        FixtureParser::new(symbols).with_default_run(self.default_run.as_str())
    }

    pub fn run(&self, fixtures: &[PathBuf]) -> RunReport {
        let workers = self.jobs.min(fixtures.len()).max(1);
        info!("Running {} fixture(s) on {} worker(s)", fixtures.len(), workers);

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(path) = fixtures.get(index) else {
                            break;
                        };
                        debug!("Worker {} picked {}", worker, path.display());
                        if tx.send((index, self.run_fixture(path))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut indexed: Vec<(usize, FixtureReport)> = rx.into_iter().collect();
        indexed.sort_by_key(|(index, _)| *index);
        let reports = indexed.into_iter().map(|(_, report)| report).collect();

        RunReport { fixtures: reports }
    }

    pub fn run_fixture(&self, path: &Path) -> FixtureReport {
        if self.abort.is_triggered() {
            return self.skip_fixture(path);
        }

        let symbols = self.symbols_for(path);
        let fixture = match self.parser(&symbols).parse_file(path) {
            Ok(fixture) => fixture,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                return FixtureReport {
                    path: path.to_path_buf(),
                    status: FixtureStatus::ParseFailed(e),
                    configs: Vec::new(),
                };
            }
        };

        let selected: Vec<&TestConfig> = fixture
            .configs
            .iter()
            .filter(|config| self.selects(config))
            .collect();

        let mut report = FixtureReport {
            path: path.to_path_buf(),
            status: FixtureStatus::Completed,
            configs: Vec::new(),
        };

        if self.abort.is_triggered() {
            report.configs = selected.iter().map(|c| skipped(c)).collect();
            return report;
        }

        if let Some(builder) = self.builder.as_ref().filter(|_| !selected.is_empty()) {
            if let Err(e) = builder.build(&fixture, &symbols) {
                warn!("Failed to build {}: {}", path.display(), e);
                if self.fail_fast {
                    self.abort.trigger();
                }
                report.configs = selected
                    .iter()
                    .map(|c| {
                        ConfigReport::new(
                            c.name.as_str(),
                            c.run.to_shell_command(),
                            ConfigOutcome::Errored("fixture build failed".to_string()),
                        )
                    })
                    .collect();
                report.status = FixtureStatus::BuildFailed(e);
                return report;
            }
        }

        for config in selected {
            if self.abort.is_triggered() {
                report.configs.push(skipped(config));
                continue;
            }

            let config_report = self.run_config(config);
            if self.fail_fast && !config_report.outcome.is_passed() {
                info!("Stopping after '{}' ({})", config.name, config_report.outcome.label());
                self.abort.trigger();
            }
            report.configs.push(config_report);
        }

        report
    }

    /// Report an aborted fixture, listing its configs when it still parses
    fn skip_fixture(&self, path: &Path) -> FixtureReport {
        let symbols = self.symbols_for(path);
        let configs = match self.parser(&symbols).parse_file(path) {
            Ok(fixture) => fixture
                .configs
                .iter()
                .filter(|config| self.selects(config))
                .map(skipped)
                .collect(),
            Err(e) => {
                debug!("Skipping unparsable {}: {}", path.display(), e);
                Vec::new()
            }
        };

        FixtureReport {
            path: path.to_path_buf(),
            status: FixtureStatus::Skipped,
            configs,
        }
    }

    fn selects(&self, config: &TestConfig) -> bool {
        self.filter.as_deref().is_none_or(|name| config.name == name)
    }

    fn run_config(&self, config: &TestConfig) -> ConfigReport {
        let command = config.run.to_shell_command();
        info!("Running config '{}': {}", config.name, command);

        match self.executor.execute(config) {
            Ok(result) => {
                let verdict = verify(config, &result);
                debug!(
                    "Config '{}' exited with {} in {:?}",
                    config.name, result.exit_code, result.duration
                );
                let mut report = match verdict {
                    Verdict::Passed => ConfigReport::new(&config.name, command, ConfigOutcome::Passed),
                    Verdict::Failed(failure) => {
                        let mut report =
                            ConfigReport::new(&config.name, command, ConfigOutcome::Failed(failure));
                        report.stdout_tail = tail(&result.stdout, self.tail_lines);
                        report.stderr_tail = tail(&result.stderr, self.tail_lines);
                        report
                    }
                };
                report.duration = Some(result.duration);
                report
            }
            Err(e) => {
                warn!("Config '{}' errored: {}", config.name, e);
                ConfigReport::new(&config.name, command, ConfigOutcome::Errored(e.to_string()))
            }
        }
    }
}

fn skipped(config: &TestConfig) -> ConfigReport {
    ConfigReport::new(
        config.name.as_str(),
        config.run.to_shell_command(),
        ConfigOutcome::Skipped,
    )
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::verifier::AssertionFailure;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture(dir: &Path, name: &str, directives: &[&str]) -> PathBuf {
        let mut source = String::from("int main(void) { return 0; }\n\n/* easytest configuration.\n");
        for directive in directives {
            source.push_str(&format!(" * {directive}\n"));
        }
        source.push_str(" */\n");

        let path = dir.join(name);
        fs::write(&path, source).unwrap();
        path
    }

    fn runner(dir: &Path) -> Runner {
        Runner::new(SymbolTable::new(), Executor::new(Duration::from_secs(10)))
            .with_build_dir(dir.join("build"))
    }

    fn outcomes(report: &FixtureReport) -> Vec<(&str, &ConfigOutcome)> {
        report
            .configs
            .iter()
            .map(|c| (c.name.as_str(), &c.outcome))
            .collect()
    }

    #[test]
    fn test_back_to_back_configs_do_not_share_environment() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(
            temp_dir.path(),
            "env.c",
            &[
                "CONFIGS: first second",
                "ENVIRONMENT-first: MARKER=first",
                "RUN-first: sh -c 'echo MARKER=$MARKER'",
                "PASS-first: MARKER=first",
                "ENVIRONMENT-second: OTHER=1",
                "RUN-second: sh -c 'echo MARKER=$MARKER'",
                "PASS-second: MARKER=",
            ],
        );

        let report = runner(temp_dir.path()).run_fixture(&path);
        assert_eq!(
            outcomes(&report),
            vec![
                ("first", &ConfigOutcome::Passed),
                ("second", &ConfigOutcome::Passed)
            ]
        );
    }

    #[test]
    fn test_unresolved_placeholder_spawns_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("marker");
        let touch = format!("RUN-ok: touch '{}'", marker.display());
        let path = write_fixture(
            temp_dir.path(),
            "bad.c",
            &["CONFIGS: ok bad", &touch, "RUN-bad: @BINARY@ | @nosuchtool@"],
        );

        let report = runner(temp_dir.path()).run_fixture(&path);
        assert!(matches!(
            report.status,
            FixtureStatus::ParseFailed(crate::Error::UnresolvedPlaceholder { .. })
        ));
        assert!(report.configs.is_empty());
        assert!(!marker.exists());
    }

    #[test]
    fn test_failure_carries_output_tail() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(
            temp_dir.path(),
            "tail.c",
            &[
                "CONFIGS: noisy",
                "RUN-noisy: sh -c 'for i in 1 2 3 4 5; do echo line$i; done; echo oops >&2'",
                "PASS-noisy: line9",
            ],
        );

        let report = runner(temp_dir.path()).with_tail_lines(2).run_fixture(&path);
        let noisy = &report.configs[0];
        assert!(matches!(
            noisy.outcome,
            ConfigOutcome::Failed(AssertionFailure::NoPassPredicateMatched { .. })
        ));
        assert_eq!(noisy.stdout_tail, "line4\nline5");
        assert_eq!(noisy.stderr_tail, "oops");
    }

    #[test]
    fn test_fail_fast_skips_remaining_configs() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(
            temp_dir.path(),
            "ff.c",
            &["CONFIGS: broken later", "RUN-broken: false", "RUN-later: true"],
        );

        let runner = runner(temp_dir.path()).with_fail_fast(true);
        let report = runner.run_fixture(&path);
        assert!(matches!(report.configs[0].outcome, ConfigOutcome::Failed(_)));
        assert_eq!(report.configs[1].outcome, ConfigOutcome::Skipped);
        assert!(runner.abort_signal().is_triggered());
    }

    #[test]
    fn test_abort_before_fixture_reports_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(temp_dir.path(), "a.c", &["CONFIGS: x y", "RUN: true"]);

        let runner = runner(temp_dir.path());
        runner.abort_signal().trigger();
        let report = runner.run(&[path]);

        let summary = report.summary();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.total, 2);
        assert!(matches!(report.fixtures[0].status, FixtureStatus::Skipped));
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_working_dir_setting_reaches_stages() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("here.txt"), "").unwrap();
        let path = write_fixture(
            temp_dir.path(),
            "cwd.c",
            &["CONFIGS: list", "RUN-list: ls", "PASS-list: here.txt"],
        );

        let settings = Settings {
            tools: Some(Vec::new()),
            build_dir: Some(temp_dir.path().join("build")),
            working_dir: Some(work),
            ..Default::default()
        };
        let report = Runner::from_settings(&settings).run_fixture(&path);
        assert_eq!(outcomes(&report), vec![("list", &ConfigOutcome::Passed)]);
    }

    #[test]
    fn test_abort_skips_fixture_that_would_not_parse() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(temp_dir.path(), "bad.c", &["CONFIGS: a", "RUN-b: true"]);

        let runner = runner(temp_dir.path());
        runner.abort_signal().trigger();
        let report = runner.run(&[path]);

        let fixture = &report.fixtures[0];
        assert!(matches!(fixture.status, FixtureStatus::Skipped));
        assert!(fixture.configs.is_empty());
        assert_eq!(report.summary().fixture_errors, 0);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_filter_selects_one_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(
            temp_dir.path(),
            "f.c",
            &["CONFIGS: keep drop", "RUN-keep: true", "RUN-drop: false"],
        );

        let report = runner(temp_dir.path())
            .with_filter(Some("keep".to_string()))
            .run_fixture(&path);
        assert_eq!(outcomes(&report), vec![("keep", &ConfigOutcome::Passed)]);
    }

    #[test]
    fn test_parallel_fixtures_keep_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| {
                let run = format!("RUN: sh -c 'sleep 0.{}; exit 0'", 6 - i);
                write_fixture(temp_dir.path(), &format!("f{i}.c"), &[run.as_str()])
            })
            .collect();

        let report = runner(temp_dir.path()).with_jobs(3).run(&paths);
        let order: Vec<PathBuf> = report.fixtures.iter().map(|f| f.path.clone()).collect();
        assert_eq!(order, paths);
        assert_eq!(report.summary().passed, 6);
    }

    #[test]
    fn test_spawn_failure_is_an_error_not_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(temp_dir.path(), "missing.c", &["CONFIGS: run"]);

        let report = runner(temp_dir.path()).run(&[path]);
        assert!(matches!(
            report.fixtures[0].configs[0].outcome,
            ConfigOutcome::Errored(_)
        ));
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn test_build_failure_errors_every_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(temp_dir.path(), "b.c", &["CONFIGS: x y"]);
        let builder = Builder::new(crate::config::CompilerSettings {
            command: "false".to_string(),
            args: vec![],
        });

        let report = runner(temp_dir.path()).with_builder(builder).run(&[path]);
        let fixture = &report.fixtures[0];
        assert!(matches!(fixture.status, FixtureStatus::BuildFailed(_)));
        assert_eq!(fixture.configs.len(), 2);
        assert_eq!(report.summary().errored, 2);
        assert_eq!(report.exit_code(), 2);
    }
}

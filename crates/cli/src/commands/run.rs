use anyhow::{Result, bail};
use easytest_core::Runner;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use super::load_settings;
use crate::display::{print_fixture, print_report};
use crate::utils::collect_fixtures;

/// Options collected from `easytest run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub fixtures: Vec<PathBuf>,
    pub timeout: Option<u64>,
    pub jobs: Option<usize>,
    pub filter: Option<String>,
    pub fail_fast: bool,
    pub config: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn run_command(options: RunOptions) -> Result<i32> {
    let settings = load_settings(options.config.as_deref())?;
    let fixtures = collect_fixtures(&options.fixtures, &settings.extensions())?;
    if fixtures.is_empty() {
        bail!("No fixtures found");
    }
    debug!("Collected {} fixture(s)", fixtures.len());

    let mut runner = Runner::from_settings(&settings)
        .with_filter(options.filter)
        .with_fail_fast(options.fail_fast);
    if let Some(secs) = options.timeout {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    if let Some(jobs) = options.jobs {
        runner = runner.with_jobs(jobs);
    }

    if options.dry_run {
        let mut exit_code = 0;
        for path in &fixtures {
            match runner.parse_fixture(path) {
                Ok(fixture) => {
                    print_fixture(&fixture);
                    println!();
                }
                Err(e) => {
                    println!("💥 {}: {}", path.display(), e);
                    exit_code = 2;
                }
            }
        }
        return Ok(exit_code);
    }

    info!("Running {} fixture(s)", fixtures.len());
    let report = runner.run(&fixtures);
    print_report(&report);
    Ok(report.exit_code())
}

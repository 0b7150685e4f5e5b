use easytest_core::{
    ConfigOutcome, FixtureStatus, RunReport, SourceFixture, Summary, TestConfig,
    runner::{ConfigReport, FixtureReport},
};
use std::time::Duration;

pub fn outcome_icon(outcome: &ConfigOutcome) -> &'static str {
    match outcome {
        ConfigOutcome::Passed => "✅",
        ConfigOutcome::Failed(_) => "❌",
        ConfigOutcome::Errored(_) => "💥",
        ConfigOutcome::Skipped => "⏭️",
    }
}

pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn format_summary(summary: &Summary) -> String {
    let mut line = format!(
        "{} configs: {} passed, {} failed, {} errored, {} skipped",
        summary.total, summary.passed, summary.failed, summary.errored, summary.skipped
    );
    if summary.fixture_errors > 0 {
        line.push_str(&format!(" ({} fixture error(s))", summary.fixture_errors));
    }
    line
}

pub fn print_report(report: &RunReport) {
    for fixture in &report.fixtures {
        print_fixture_report(fixture);
    }

    println!("{}", "=".repeat(80));
    let summary = report.summary();
    let icon = match report.exit_code() {
        0 => "✅",
        1 => "❌",
        _ => "💥",
    };
    println!("{} {}", icon, format_summary(&summary));
}

fn print_fixture_report(fixture: &FixtureReport) {
    println!("🧪 {}", fixture.path.display());

    match &fixture.status {
        FixtureStatus::Completed => {}
        FixtureStatus::Skipped => println!("   ⏭️  skipped after abort"),
        FixtureStatus::ParseFailed(e) => println!("   💥 parse error: {}", e),
        FixtureStatus::BuildFailed(e) => println!("   💥 build error: {}", e),
    }

    for config in &fixture.configs {
        print_config_report(config);
    }
}

fn print_config_report(config: &ConfigReport) {
    let timing = config
        .duration
        .map(|d| format!(" ({})", format_duration(d)))
        .unwrap_or_default();
    println!(
        "   {} {} {}{}",
        outcome_icon(&config.outcome),
        config.outcome.label(),
        config.name,
        timing
    );

    match &config.outcome {
        ConfigOutcome::Failed(failure) => {
            println!("      🔧 {}", config.command);
            println!("      ❗ {}", failure);
            print_tail("stdout", &config.stdout_tail);
            print_tail("stderr", &config.stderr_tail);
        }
        ConfigOutcome::Errored(message) => {
            println!("      🔧 {}", config.command);
            println!("      ❗ {}", message);
        }
        ConfigOutcome::Passed | ConfigOutcome::Skipped => {}
    }
}

fn print_tail(stream: &str, tail: &str) {
    if tail.is_empty() {
        return;
    }
    println!("      📄 {} (tail):", stream);
    for line in tail.lines() {
        println!("         {}", line);
    }
}

/// Human-readable view of a parsed fixture, used by `analyze` and `run --dry-run`
pub fn print_fixture(fixture: &SourceFixture) {
    println!("🔍 Fixture: {}", fixture.path.display());
    println!("{}", "=".repeat(80));
    println!("   📦 Binary: {}", fixture.binary.display());
    if !fixture.compile_flags.is_empty() {
        println!("   🔨 Compile flags: {}", fixture.compile_flags.join(" "));
    }
    if !fixture.link_flags.is_empty() {
        println!("   🔗 Link flags: {}", fixture.link_flags.join(" "));
    }

    for config in &fixture.configs {
        println!();
        print_config(config);
    }
}

fn print_config(config: &TestConfig) {
    println!("   ⚙️  Config '{}'", config.name);
    println!("      • run: {}", config.run.to_shell_command());
    for (key, value) in &config.env {
        println!("      • env: {}={}", key, value);
    }
    for predicate in &config.pass {
        println!("      • pass: {}", predicate);
    }
    for predicate in &config.fail {
        println!("      • fail: {}", predicate);
    }
    println!("      • exit code: {}", config.expected_exit_code);
    if let Some(timeout) = config.timeout {
        println!("      • timeout: {}", format_duration(timeout));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_format_summary() {
        let summary = Summary {
            total: 3,
            passed: 1,
            failed: 1,
            errored: 1,
            skipped: 0,
            fixture_errors: 1,
        };
        assert_eq!(
            format_summary(&summary),
            "3 configs: 1 passed, 1 failed, 1 errored, 0 skipped (1 fixture error(s))"
        );
    }
}

use anyhow::{Context, Result};
use easytest_core::Runner;
use std::path::Path;

use super::load_settings;
use crate::display::print_fixture;

pub fn analyze_command(fixture: &Path, json: bool, config: Option<&Path>) -> Result<i32> {
    let settings = load_settings(config)?;
    let runner = Runner::from_settings(&settings);

    let parsed = match runner.parse_fixture(fixture) {
        Ok(parsed) => parsed,
        Err(e) => {
            println!("💥 {}: {}", fixture.display(), e);
            return Ok(2);
        }
    };

    if json {
        let output =
            serde_json::to_string_pretty(&parsed).context("Failed to serialize fixture")?;
        println!("{}", output);
    } else {
        print_fixture(&parsed);
    }

    Ok(0)
}

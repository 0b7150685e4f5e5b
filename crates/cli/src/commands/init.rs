use anyhow::{Context, Result};
use easytest_core::{Settings, config::CONFIG_FILE_NAMES};
use std::{env, path::PathBuf};
use tracing::info;

pub fn init_command(cwd: Option<&str>, force: bool) -> Result<i32> {
    let project_root = match cwd {
        Some(cwd) => PathBuf::from(cwd),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    let project_root = project_root
        .canonicalize()
        .context("Failed to canonicalize project root")?;

    let config_path = project_root.join(CONFIG_FILE_NAMES[0]);
    if config_path.exists() && !force {
        println!("❌ Config already exists at: {}", config_path.display());
        println!("   Use --force to overwrite");
        return Ok(0);
    }

    info!("Writing starter configuration to {}", config_path.display());
    Settings::starter()
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!("✅ Created config: {}", config_path.display());
    println!("\n📌 Next steps:");
    println!("   Point 'compiler' at the toolchain that builds your fixtures");
    println!("   Add '@NAME@' placeholders under 'symbols' or 'tools'");
    println!("   Run: easytest run <fixture-path>");

    Ok(0)
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{RunOptions, analyze_command, init_command, run_command};

#[derive(Parser, Debug)]
#[command(name = "easytest")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build fixtures and run every config they declare
    #[command(visible_alias = "r")]
    Run {
        /// Fixture files, or directories to search for fixtures
        #[arg(required = true)]
        fixtures: Vec<PathBuf>,

        /// Kill a config's processes after this many seconds
        #[arg(short, long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Number of fixtures to run in parallel
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Only run configs with this name
        #[arg(short, long, value_name = "NAME")]
        filter: Option<String>,

        /// Skip remaining configs after the first failure or error
        #[arg(long)]
        fail_fast: bool,

        /// Path to an .easytest.json file (searched upwards by default)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the resolved configs without building or running anything
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Parse a fixture and show its resolved configs
    #[command(visible_alias = "a")]
    Analyze {
        /// Fixture file to analyze
        fixture: PathBuf,

        /// Print the parsed fixture as JSON
        #[arg(long)]
        json: bool,

        /// Path to an .easytest.json file (searched upwards by default)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Write a starter .easytest.json
    Init {
        /// Directory to create the config in (defaults to current directory)
        #[arg(long)]
        cwd: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },
}

impl Commands {
    /// Execute the command, returning the process exit code
    pub fn execute(self) -> Result<i32> {
        match self {
            Commands::Run {
                fixtures,
                timeout,
                jobs,
                filter,
                fail_fast,
                config,
                dry_run,
            } => run_command(RunOptions {
                fixtures,
                timeout,
                jobs,
                filter,
                fail_fast,
                config,
                dry_run,
            }),
            Commands::Analyze {
                fixture,
                json,
                config,
            } => analyze_command(&fixture, json, config.as_deref()),
            Commands::Init { cwd, force } => init_command(cwd.as_deref(), force),
        }
    }
}

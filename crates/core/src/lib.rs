//! easytest - a declarative runner for fixtures with embedded test directives
//!
//! This crate provides functionality to:
//! - Parse the configuration block embedded in a fixture's source file
//! - Build the fixture and run it under each named configuration
//! - Verify captured output and exit codes against PASS/FAIL directives
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod parser;
pub mod runner;
pub mod types;
pub mod verifier;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use types::*;

// Re-export main API components
pub use command::{Builder, Pipeline, Stage};
pub use config::Settings;
pub use executor::Executor;
pub use parser::{FixtureParser, SymbolTable};
pub use runner::{AbortSignal, ConfigOutcome, FixtureStatus, RunReport, Runner, Summary};
pub use verifier::{AssertionFailure, Verdict, verify};

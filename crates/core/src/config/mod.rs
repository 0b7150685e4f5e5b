//! Configuration management for easytest

mod settings;

// Re-export main types
pub use settings::{
    CONFIG_FILE_NAMES, CompilerSettings, DEFAULT_ENV_ALLOWLIST, DEFAULT_EXTENSIONS, DEFAULT_TOOLS,
    Settings,
};

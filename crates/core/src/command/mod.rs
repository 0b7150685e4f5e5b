//! Command pipelines and fixture builds

pub mod build;
pub mod pipeline;

// Re-export commonly used types
pub use build::{Builder, binary_path};
pub use pipeline::{Pipeline, Stage};

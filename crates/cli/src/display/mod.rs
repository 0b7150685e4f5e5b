pub mod formatter;

pub use formatter::{format_summary, print_fixture, print_report};

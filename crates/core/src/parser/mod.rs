//! Embedded configuration block parsing

pub mod directive;
pub mod fixture_parser;
pub mod symbols;
pub mod tokens;

// Re-export commonly used items
pub use directive::{Directive, DirectiveKey, extract_directives};
pub use fixture_parser::{DEFAULT_CONFIG, FixtureParser};
pub use symbols::{BINARY, SOURCE, SymbolTable, find_program};

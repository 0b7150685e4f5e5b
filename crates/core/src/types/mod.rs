pub mod execution;
pub mod fixture;
pub mod predicate;

// Re-export commonly used types
pub use execution::{ExecutionResult, tail};
pub use fixture::{SourceFixture, TestConfig};
pub use predicate::Predicate;

pub mod file;

pub use file::collect_fixtures;

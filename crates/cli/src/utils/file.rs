use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Expand the paths given on the command line into fixture files.
///
/// Files are taken as is. Directories are searched recursively for files
/// whose extension is in `extensions`, skipping hidden entries.
pub fn collect_fixtures(paths: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut fixtures = Vec::new();

    for path in paths {
        if path.is_file() {
            fixtures.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| has_extension(p, extensions))
                .collect();
            found.sort();
            fixtures.extend(found);
        } else {
            bail!("Fixture not found: {}", path.display());
        }
    }

    Ok(fixtures)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

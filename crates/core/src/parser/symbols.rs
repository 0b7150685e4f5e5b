//! Placeholder lookup for `@NAME@` tokens

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Placeholder for the built fixture binary
pub const BINARY: &str = "BINARY";
/// Placeholder for the fixture source file
pub const SOURCE: &str = "SOURCE";

/// Explicit table of placeholder values handed to the parser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    symbols: BTreeMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.symbols.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.symbols.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Look up each tool on `path_var` and add the ones that exist
    pub fn add_tools<'a>(
        &mut self,
        tools: impl IntoIterator<Item = &'a String>,
        path_var: Option<&str>,
    ) {
        for tool in tools {
            match find_program(tool, path_var) {
                Some(found) => {
                    debug!("Resolved tool @{}@ -> {}", tool, found.display());
                    self.insert(tool.clone(), found.to_string_lossy());
                }
                None => debug!("Tool '{}' not found on PATH", tool),
            }
        }
    }

    /// Replace every `@NAME@` in `text`.
    ///
    /// An `@` that does not open a well-formed placeholder is copied as is.
    pub fn substitute(&self, text: &str, directive: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find('@') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());

            if name_len > 0 && after[name_len..].starts_with('@') {
                let name = &after[..name_len];
                let value = self.get(name).ok_or_else(|| Error::UnresolvedPlaceholder {
                    name: name.to_string(),
                    directive: directive.to_string(),
                })?;
                out.push_str(value);
                rest = &after[name_len + 1..];
            } else {
                out.push('@');
                rest = after;
            }
        }
        out.push_str(rest);

        Ok(out)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = SymbolTable::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

/// Search `path_var` for an executable named `name`, like CMake's find_program
pub fn find_program(name: &str, path_var: Option<&str>) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(path_var?)
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::new()
            .with(BINARY, "/build/openmp")
            .with("sort", "/usr/bin/sort")
            .with("OpenMP_C_FLAGS", "-fopenmp")
    }

    #[test]
    fn test_substitutes_known_placeholders() {
        let out = table().substitute("@BINARY@ | @sort@", "RUN-sort").unwrap();
        assert_eq!(out, "/build/openmp | /usr/bin/sort");
    }

    #[test]
    fn test_placeholder_inside_word() {
        let out = table().substitute("--flags=@OpenMP_C_FLAGS@x", "LINK").unwrap();
        assert_eq!(out, "--flags=-fopenmpx");
    }

    #[test]
    fn test_unresolved_placeholder_is_an_error() {
        let err = table().substitute("@BINARY@ | @uniq@", "RUN-sort").unwrap_err();
        match err {
            Error::UnresolvedPlaceholder { name, directive } => {
                assert_eq!(name, "uniq");
                assert_eq!(directive, "RUN-sort");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stray_at_signs_pass_through() {
        let out = table().substitute("mail user@host @ @@ @x y@", "RUN").unwrap();
        assert_eq!(out, "mail user@host @ @@ @x y@");
    }

    #[cfg(unix)]
    #[test]
    fn test_find_program_on_path() {
        let found = find_program("sh", Some("/nonexistent:/bin:/usr/bin"));
        assert!(found.is_some());
        assert!(find_program("definitely-not-a-tool-xyz", Some("/bin")).is_none());
        assert!(find_program("sh", None).is_none());
    }
}

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use super::Stage;
use crate::{
    config::CompilerSettings,
    error::{Error, Result},
    parser::{BINARY, SOURCE, SymbolTable},
    types::SourceFixture,
};

const COMPILE_FLAGS_ARG: &str = "@COMPILE_FLAGS@";
const LINK_ARG: &str = "@LINK@";

/// Compiles a fixture into its binary by running the compiler template
#[derive(Debug, Clone)]
pub struct Builder {
    compiler: CompilerSettings,
    working_dir: Option<PathBuf>,
}

impl Builder {
    pub fn new(compiler: CompilerSettings) -> Self {
        Self {
            compiler,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Expand the compiler template for `fixture`
    pub fn build_command(&self, fixture: &SourceFixture, symbols: &SymbolTable) -> Result<Stage> {
        let mut symbols = symbols
            .clone()
            .with(BINARY, fixture.binary.to_string_lossy());
        if symbols.get(SOURCE).is_none() {
            symbols.insert(SOURCE, fixture.path.to_string_lossy());
        }

        let mut args = Vec::new();
        for arg in &self.compiler.args {
            match arg.as_str() {
                COMPILE_FLAGS_ARG => args.extend(fixture.compile_flags.iter().cloned()),
                LINK_ARG => args.extend(fixture.link_flags.iter().cloned()),
                _ => args.push(symbols.substitute(arg, "compiler args")?),
            }
        }

        Ok(Stage::new(
            symbols.substitute(&self.compiler.command, "compiler command")?,
            args,
        ))
    }

    pub fn build(&self, fixture: &SourceFixture, symbols: &SymbolTable) -> Result<()> {
        let stage = self.build_command(fixture, symbols)?;
        if let Some(parent) = fixture.binary.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Building {}", fixture.display_name());
        debug!("Build command: {} {:?}", stage.program, stage.args);

        let mut cmd = Command::new(&stage.program);
        cmd.args(&stage.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| Error::SpawnFailure {
            program: stage.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.trim().is_empty() {
                stderr = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            return Err(Error::BuildFailed {
                code: output.status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        Ok(())
    }
}

/// Where the binary for `source` lands inside `build_dir`.
///
/// With `unique` the binary goes into a per-source subdirectory keyed by a
/// hash of the source path, so fixtures sharing a file stem never collide.
pub fn binary_path(build_dir: &Path, source: &Path, unique: bool) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fixture".to_string());
    let dir = if unique {
        let digest = format!("{:x}", md5::compute(source.to_string_lossy().as_bytes()));
        build_dir.join(&digest[..8])
    } else {
        build_dir.to_path_buf()
    };

    let mut binary = dir.join(stem);
    if cfg!(windows) {
        binary.set_extension("exe");
    }
    binary
}

//! Turns directives into a typed `SourceFixture`

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::directive::{Directive, DirectiveKey, extract_directives};
use super::symbols::{BINARY, SymbolTable};
use super::tokens::{Token, tokenize, words};
use crate::{
    command::{Pipeline, Stage},
    error::{Error, Result},
    types::{Predicate, SourceFixture, TestConfig},
};

/// Config name used when a fixture has no `CONFIGS` directive
pub const DEFAULT_CONFIG: &str = "default";

/// Directives that apply to one config, or to all of them when unsuffixed
#[derive(Debug, Default)]
struct Section {
    env: Vec<Directive>,
    run: Option<Directive>,
    pass: Vec<Directive>,
    fail: Vec<Directive>,
    timeout: Option<Directive>,
}

#[derive(Debug, Default)]
struct Collected {
    configs: Option<Directive>,
    compile_flags: Option<Directive>,
    link: Option<Directive>,
    defaults: Section,
    named: HashMap<String, Section>,
}

pub struct FixtureParser<'a> {
    symbols: &'a SymbolTable,
    default_run: Option<String>,
}

impl<'a> FixtureParser<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            default_run: None,
        }
    }

    /// RUN template for configs that have neither their own nor an unsuffixed RUN
    pub fn with_default_run(mut self, template: impl Into<String>) -> Self {
        self.default_run = Some(template.into());
        self
    }

    pub fn parse_file(&self, path: &Path) -> Result<SourceFixture> {
        let source = std::fs::read_to_string(path)?;
        self.parse(path, &source)
    }

    pub fn parse(&self, path: &Path, source: &str) -> Result<SourceFixture> {
        debug!("Parsing fixture {}", path.display());
        let collected = collect(extract_directives(source)?)?;

        let names = match &collected.configs {
            Some(directive) => config_names(directive)?,
            None => vec![DEFAULT_CONFIG.to_string()],
        };

        if let Some(orphan) = collected
            .named
            .keys()
            .find(|name| !names.contains(*name))
        {
            return Err(Error::malformed(format!(
                "directives reference config '{orphan}' which is not listed in CONFIGS"
            )));
        }

        let empty = Section::default();
        let configs = names
            .iter()
            .map(|name| {
                let own = collected.named.get(name).unwrap_or(&empty);
                self.build_config(name, own, &collected.defaults)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SourceFixture {
            path: path.to_path_buf(),
            binary: self.symbols.get(BINARY).map(PathBuf::from).unwrap_or_default(),
            compile_flags: self.flags(collected.compile_flags.as_ref())?,
            link_flags: self.flags(collected.link.as_ref())?,
            configs,
        })
    }

    fn flags(&self, directive: Option<&Directive>) -> Result<Vec<String>> {
        let Some(directive) = directive else {
            return Ok(Vec::new());
        };
        let label = directive.to_string();
        words(&directive.value)?
            .iter()
            .map(|word| self.symbols.substitute(word, &label))
            .collect()
    }

    fn build_config(&self, name: &str, own: &Section, defaults: &Section) -> Result<TestConfig> {
        let run = match own.run.as_ref().or(defaults.run.as_ref()) {
            Some(directive) => self.pipeline(&directive.value, &directive.to_string())?,
            None => match &self.default_run {
                Some(template) => self.pipeline(template, &format!("default RUN of '{name}'"))?,
                None => {
                    return Err(Error::malformed(format!(
                        "config '{name}' has no RUN directive and no default"
                    )));
                }
            },
        };

        let mut config = TestConfig::new(name, run);

        for directive in defaults.env.iter().chain(&own.env) {
            config.env.extend(self.assignments(directive)?);
        }

        let pass = if own.pass.is_empty() { &defaults.pass } else { &own.pass };
        for directive in pass {
            config.pass.push(Predicate::new(directive.value.as_str())?);
        }

        let fail = if own.fail.is_empty() { &defaults.fail } else { &own.fail };
        let mut expected_code: Option<i32> = None;
        for directive in fail {
            match directive.value.parse::<i32>() {
                Ok(code) => {
                    if expected_code.is_some_and(|existing| existing != code) {
                        return Err(Error::malformed(format!(
                            "config '{name}' declares conflicting FAIL exit codes"
                        )));
                    }
                    expected_code = Some(code);
                }
                Err(_) => config.fail.push(Predicate::new(directive.value.as_str())?),
            }
        }
        if let Some(code) = expected_code {
            config.expected_exit_code = code;
        }

        if let Some(directive) = own.timeout.as_ref().or(defaults.timeout.as_ref()) {
            config.timeout = Some(parse_timeout(directive)?);
        }

        Ok(config)
    }

    fn pipeline(&self, template: &str, label: &str) -> Result<Pipeline> {
        let mut stages = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut tokens = tokenize(template)?;
        // Trailing sentinel closes the last stage
        tokens.push(Token::Pipe);

        for token in tokens {
            match token {
                Token::Word(word) => current.push(self.symbols.substitute(&word, label)?),
                Token::Pipe => {
                    let mut stage_words = std::mem::take(&mut current).into_iter();
                    let Some(program) = stage_words.next() else {
                        return Err(Error::malformed(format!("empty pipeline stage in {label}")));
                    };
                    stages.push(Stage::new(program, stage_words.collect()));
                }
            }
        }

        Pipeline::new(stages).ok_or_else(|| Error::malformed(format!("empty command in {label}")))
    }

    fn assignments(&self, directive: &Directive) -> Result<Vec<(String, String)>> {
        let label = directive.to_string();
        words(&directive.value)?
            .into_iter()
            .map(|word| {
                let (key, value) = word
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .ok_or_else(|| {
                        Error::malformed(format!("{label}: expected KEY=VALUE, got '{word}'"))
                    })?;
                Ok((key.to_string(), self.symbols.substitute(value, &label)?))
            })
            .collect()
    }
}

fn collect(directives: Vec<Directive>) -> Result<Collected> {
    let mut collected = Collected::default();

    for directive in directives {
        if !directive.key.is_per_config() {
            if directive.config.is_some() {
                return Err(Error::malformed(format!(
                    "line {}: {} does not take a config suffix",
                    directive.line,
                    directive.key.as_str()
                )));
            }
            let slot = match directive.key {
                DirectiveKey::Configs => &mut collected.configs,
                DirectiveKey::CompileFlags => &mut collected.compile_flags,
                _ => &mut collected.link,
            };
            set_once(slot, directive)?;
            continue;
        }

        let section = match &directive.config {
            Some(name) => collected.named.entry(name.clone()).or_default(),
            None => &mut collected.defaults,
        };
        match directive.key {
            DirectiveKey::Environment => section.env.push(directive),
            DirectiveKey::Pass => section.pass.push(directive),
            DirectiveKey::Fail => section.fail.push(directive),
            DirectiveKey::Run => set_once(&mut section.run, directive)?,
            DirectiveKey::Timeout => set_once(&mut section.timeout, directive)?,
            DirectiveKey::Configs | DirectiveKey::CompileFlags | DirectiveKey::Link => {
                unreachable!("global directives are handled above")
            }
        }
    }

    Ok(collected)
}

fn set_once(slot: &mut Option<Directive>, directive: Directive) -> Result<()> {
    if let Some(previous) = slot {
        return Err(Error::malformed(format!(
            "{directive} on line {} repeats line {}",
            directive.line, previous.line
        )));
    }
    *slot = Some(directive);
    Ok(())
}

fn config_names(directive: &Directive) -> Result<Vec<String>> {
    let names: Vec<String> = directive
        .value
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(Error::malformed("CONFIGS lists no config names"));
    }
    if let Some(bad) = names.iter().find(|name| !is_config_name(name)) {
        return Err(Error::malformed(format!(
            "config name '{bad}' may only use letters, digits and '_.+-'"
        )));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(Error::malformed(format!(
            "config '{duplicate}' is listed twice in CONFIGS"
        )));
    }

    Ok(names)
}

/// Names must be usable as a directive suffix
fn is_config_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
}

fn parse_timeout(directive: &Directive) -> Result<Duration> {
    directive
        .value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| {
            Error::malformed(format!(
                "{directive}: expected a positive number of seconds, got '{}'",
                directive.value
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENMP: &str = r#"#include <stdio.h>
#include <omp.h>

int main()
{
#pragma omp parallel
  {
    printf("%d of %d\n", omp_get_thread_num() + 1, omp_get_num_threads());
  }
  return 0;
}

/* CMake-easytest configuration.
 *
 * CONFIGS: sort env
 *
 * COMPILE_FLAGS: @OpenMP_C_FLAGS@
 * LINK: @OpenMP_C_FLAGS@
 *
 *
 * ENVIRONMENT-sort: OMP_NUM_THREADS=4
 * RUN-sort: @BINARY@ | @sort@
 * PASS-sort: 1.*2.*3.*4
 *
 * ENVIRONMENT-env: OMP_NUM_THREADS=1
 * FAIL-env: 2
 */
"#;

    fn symbols() -> SymbolTable {
        SymbolTable::new()
            .with(BINARY, "/build/openmp")
            .with("sort", "/usr/bin/sort")
            .with("OpenMP_C_FLAGS", "-fopenmp")
    }

    fn parse(source: &str) -> Result<SourceFixture> {
        let symbols = symbols();
        FixtureParser::new(&symbols)
            .with_default_run("@BINARY@")
            .parse(Path::new("tests/openmp.c"), source)
    }

    #[test]
    fn test_parses_openmp_fixture() {
        let fixture = parse(OPENMP).unwrap();

        assert_eq!(fixture.binary, PathBuf::from("/build/openmp"));
        assert_eq!(fixture.compile_flags, vec!["-fopenmp"]);
        assert_eq!(fixture.link_flags, vec!["-fopenmp"]);
        assert_eq!(fixture.config_names().collect::<Vec<_>>(), vec!["sort", "env"]);

        let sort = fixture.config("sort").unwrap();
        assert_eq!(sort.env_value("OMP_NUM_THREADS"), Some("4"));
        assert_eq!(sort.run.to_shell_command(), "/build/openmp | /usr/bin/sort");
        assert_eq!(sort.pass.len(), 1);
        assert!(sort.pass[0].is_pattern());
        assert_eq!(sort.expected_exit_code, 0);

        let env = fixture.config("env").unwrap();
        assert_eq!(env.env_value("OMP_NUM_THREADS"), Some("1"));
        assert_eq!(env.run.to_shell_command(), "/build/openmp");
        assert!(env.fail.is_empty());
        assert_eq!(env.expected_exit_code, 2);
    }

    #[test]
    fn test_parsing_is_idempotent() {
        assert_eq!(parse(OPENMP).unwrap(), parse(OPENMP).unwrap());
    }

    #[test]
    fn test_unresolved_tool_is_rejected() {
        let symbols = SymbolTable::new()
            .with(BINARY, "/build/openmp")
            .with("OpenMP_C_FLAGS", "-fopenmp");
        let err = FixtureParser::new(&symbols)
            .parse(Path::new("openmp.c"), OPENMP)
            .unwrap_err();
        match err {
            Error::UnresolvedPlaceholder { name, directive } => {
                assert_eq!(name, "sort");
                assert_eq!(directive, "RUN-sort");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_run_without_default_is_malformed() {
        let symbols = symbols();
        let err = FixtureParser::new(&symbols)
            .parse(Path::new("openmp.c"), OPENMP)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedConfig(msg) if msg.contains("'env'")));
    }

    #[test]
    fn test_unsuffixed_directives_are_inherited() {
        let source = "/* easytest configuration\n\
                      * CONFIGS: a b\n\
                      * ENVIRONMENT: SHARED=1 MODE=base\n\
                      * RUN: @BINARY@ --quiet\n\
                      * PASS: done\n\
                      * TIMEOUT: 2.5\n\
                      * ENVIRONMENT-b: MODE=fast\n\
                      * PASS-b: finished.*\n\
                      */";
        let fixture = parse(source).unwrap();

        let a = fixture.config("a").unwrap();
        assert_eq!(a.run.to_shell_command(), "/build/openmp --quiet");
        assert_eq!(a.env_value("MODE"), Some("base"));
        assert_eq!(a.pass[0].source(), "done");
        assert_eq!(a.timeout, Some(Duration::from_millis(2500)));

        let b = fixture.config("b").unwrap();
        assert_eq!(b.env_value("SHARED"), Some("1"));
        assert_eq!(b.env_value("MODE"), Some("fast"));
        assert_eq!(b.pass.len(), 1);
        assert_eq!(b.pass[0].source(), "finished.*");
    }

    #[test]
    fn test_missing_configs_means_single_default() {
        let source = "/* easytest configuration\n * PASS: ok\n */";
        let fixture = parse(source).unwrap();
        assert_eq!(fixture.config_names().collect::<Vec<_>>(), vec![DEFAULT_CONFIG]);
        assert_eq!(fixture.configs[0].run.to_shell_command(), "/build/openmp");
    }

    #[test]
    fn test_fail_text_and_code_mix() {
        let source = "/* easytest configuration\n\
                      * CONFIGS: x\n\
                      * FAIL-x: Segmentation fault\n\
                      * FAIL-x: 3\n\
                      */";
        let x = parse(source).unwrap().configs.remove(0);
        assert_eq!(x.expected_exit_code, 3);
        assert_eq!(x.fail.len(), 1);
        assert_eq!(x.fail[0].source(), "Segmentation fault");
    }

    #[test]
    fn test_malformed_blocks() {
        let cases = [
            ("duplicate name", "/* easytest configuration\n * CONFIGS: a a\n */"),
            ("orphan directive", "/* easytest configuration\n * CONFIGS: a\n * RUN-b: true\n */"),
            ("repeated RUN", "/* easytest configuration\n * CONFIGS: a\n * RUN-a: x\n * RUN-a: y\n */"),
            ("bad env", "/* easytest configuration\n * CONFIGS: a\n * ENVIRONMENT-a: NOVALUE\n */"),
            ("empty stage", "/* easytest configuration\n * CONFIGS: a\n * RUN-a: x | | y\n */"),
            ("suffixed LINK", "/* easytest configuration\n * CONFIGS: a\n * LINK-a: -lm\n */"),
            ("bad timeout", "/* easytest configuration\n * CONFIGS: a\n * TIMEOUT-a: soon\n */"),
            ("two exit codes", "/* easytest configuration\n * CONFIGS: a\n * FAIL-a: 1\n * FAIL-a: 2\n */"),
            ("empty CONFIGS", "/* easytest configuration\n * CONFIGS:\n */"),
            ("bad name", "/* easytest configuration\n * CONFIGS: a/b\n */"),
        ];

        for (label, source) in cases {
            let result = parse(source);
            assert!(
                matches!(result, Err(Error::MalformedConfig(_))),
                "{label}: expected MalformedConfig, got {result:?}"
            );
        }
    }

    #[test]
    fn test_environment_values_are_substituted() {
        let source = "/* easytest configuration\n\
                      * CONFIGS: a\n\
                      * ENVIRONMENT-a: TOOL=@sort@ 'GREETING=hello world'\n\
                      */";
        let a = parse(source).unwrap().configs.remove(0);
        assert_eq!(a.env_value("TOOL"), Some("/usr/bin/sort"));
        assert_eq!(a.env_value("GREETING"), Some("hello world"));
    }

    #[test]
    fn test_environment_value_may_contain_pipe() {
        let source = "/* easytest configuration\n\
                      * CONFIGS: x\n\
                      * ENVIRONMENT-x: A=a|b\n\
                      * RUN-x: true\n\
                      */";
        let x = parse(source).unwrap().configs.remove(0);
        assert_eq!(x.env_value("A"), Some("a|b"));
    }

    #[test]
    fn test_dotted_config_names_are_accepted() {
        let source = "/* easytest configuration\n\
                      * CONFIGS: gcc-O2 v1.0+fast\n\
                      * RUN-v1.0+fast: true\n\
                      */";
        let names: Vec<String> = parse(source)
            .unwrap()
            .configs
            .into_iter()
            .map(|config| config.name)
            .collect();
        assert_eq!(names, vec!["gcc-O2", "v1.0+fast"]);
    }
}

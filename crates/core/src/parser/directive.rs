//! Tagged-line grammar of the embedded configuration block
//!
//! A directive is `KEY[-name]: value`. A deeper-indented line that is not a
//! directive itself continues the previous directive; a blank line ends it.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const BLOCK_HEADER: &str = "easytest configuration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKey {
    Configs,
    CompileFlags,
    Link,
    Environment,
    Run,
    Pass,
    Fail,
    Timeout,
}

impl DirectiveKey {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "CONFIGS" => Self::Configs,
            "COMPILE_FLAGS" => Self::CompileFlags,
            "LINK" => Self::Link,
            "ENVIRONMENT" => Self::Environment,
            "RUN" => Self::Run,
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            "TIMEOUT" => Self::Timeout,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configs => "CONFIGS",
            Self::CompileFlags => "COMPILE_FLAGS",
            Self::Link => "LINK",
            Self::Environment => "ENVIRONMENT",
            Self::Run => "RUN",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Timeout => "TIMEOUT",
        }
    }

    /// Whether the key may carry a `-<config>` suffix
    pub fn is_per_config(&self) -> bool {
        !matches!(self, Self::Configs | Self::CompileFlags | Self::Link)
    }
}

/// One parsed `KEY[-name]: value` line, with continuations joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: DirectiveKey,
    pub config: Option<String>,
    pub value: String,
    /// 1-based line in the source file
    pub line: usize,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config {
            Some(name) => write!(f, "{}-{}", self.key.as_str(), name),
            None => f.write_str(self.key.as_str()),
        }
    }
}

/// A `/* ... */` comment with the line its body starts on
#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockComment<'a> {
    body: &'a str,
    first_line: usize,
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z][A-Z_]*)(?:-([A-Za-z0-9_.+-]+))?:(.*)$")
            .expect("directive regex is valid")
    })
}

/// Find the last recognised configuration block and read its directives
pub fn extract_directives(source: &str) -> Result<Vec<Directive>> {
    let block = block_comments(source)
        .into_iter()
        .rev()
        .find(is_config_block)
        .ok_or_else(|| Error::malformed("no easytest configuration block found"))?;

    debug!("Configuration block starts at line {}", block.first_line);
    Ok(read_directives(&block))
}

fn block_comments(source: &str) -> Vec<BlockComment<'_>> {
    let mut blocks = Vec::new();
    let mut offset = 0;

    while let Some(open) = source[offset..].find("/*") {
        let body_start = offset + open + 2;
        let Some(close) = source[body_start..].find("*/") else {
            break;
        };
        let body_end = body_start + close;
        blocks.push(BlockComment {
            body: &source[body_start..body_end],
            first_line: source[..body_start].matches('\n').count() + 1,
        });
        offset = body_end + 2;
    }

    blocks
}

fn is_config_block(block: &BlockComment<'_>) -> bool {
    block.body.lines().any(|line| {
        let (_, content) = strip_decoration(line);
        content.to_ascii_lowercase().contains(BLOCK_HEADER) || content.starts_with("CONFIGS:")
    })
}

/// Strip comment decoration, returning (indentation, trimmed content)
fn strip_decoration(line: &str) -> (usize, &str) {
    let trimmed = line.trim_start();
    let rest = match trimmed.strip_prefix('*') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => trimmed,
    };
    let content = rest.trim_start();
    (rest.len() - content.len(), content.trim_end())
}

fn read_directives(block: &BlockComment<'_>) -> Vec<Directive> {
    let mut directives: Vec<Directive> = Vec::new();
    // Indentation of the directive that may still take continuation lines
    let mut open_indent: Option<usize> = None;

    for (index, raw) in block.body.lines().enumerate() {
        let line = block.first_line + index;
        let (indent, content) = strip_decoration(raw);

        if content.is_empty() {
            open_indent = None;
            continue;
        }

        if let Some(caps) = directive_regex().captures(content) {
            let tag = &caps[1];
            let Some(key) = DirectiveKey::from_tag(tag) else {
                warn!("Ignoring unknown directive '{}' on line {}", tag, line);
                open_indent = None;
                continue;
            };
            directives.push(Directive {
                key,
                config: caps.get(2).map(|m| m.as_str().to_string()),
                value: caps[3].trim().to_string(),
                line,
            });
            open_indent = Some(indent);
            continue;
        }

        match (open_indent, directives.last_mut()) {
            (Some(base), Some(last)) if indent > base => {
                if !last.value.is_empty() {
                    last.value.push(' ');
                }
                last.value.push_str(content);
            }
            _ => open_indent = None,
        }
    }

    directives
}

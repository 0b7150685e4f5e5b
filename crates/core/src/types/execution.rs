use std::time::Duration;

/// Captured outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code of the last pipeline stage
    pub exit_code: i32,
    pub duration: Duration,
}

impl ExecutionResult {
    /// stdout followed by stderr, the text predicates are checked against
    pub fn combined_output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        combined.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') && !self.stderr.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }
}

/// Last `count` lines of `text`
pub fn tail(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output_separates_streams() {
        let result = ExecutionResult {
            stdout: "out".to_string(),
            stderr: "err\n".to_string(),
            exit_code: 0,
            duration: Duration::ZERO,
        };
        assert_eq!(result.combined_output(), "out\nerr\n");
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\nd\n", 2), "c\nd");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 3), "");
    }
}

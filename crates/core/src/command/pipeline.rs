use serde::Serialize;

/// One process of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub program: String,
    pub args: Vec<String>,
}

impl Stage {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// A RUN command: one or more stages joined stdout to stdin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Build a pipeline; returns `None` when there are no stages
    pub fn new(stages: Vec<Stage>) -> Option<Self> {
        if stages.is_empty() {
            None
        } else {
            Some(Self { stages })
        }
    }

    pub fn single(stage: Stage) -> Self {
        Self {
            stages: vec![stage],
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn to_shell_command(&self) -> String {
        let mut cmd = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                cmd.push_str(" | ");
            }
            push_word(&mut cmd, &stage.program);
            for arg in &stage.args {
                cmd.push(' ');
                push_word(&mut cmd, arg);
            }
        }
        cmd
    }
}

fn push_word(cmd: &mut String, word: &str) {
    if word.is_empty() || word.contains([' ', '|', '\t']) {
        cmd.push_str(&format!("'{word}'"));
    } else {
        cmd.push_str(word);
    }
}

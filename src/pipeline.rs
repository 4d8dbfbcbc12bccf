use std::fmt;

use crate::aliases::AliasTable;
use crate::error::PipelineError;
use crate::expander;
use crate::jobs::MAX_MEMBERS;
use crate::parser::{ParsedLine, Word};

/// The list of all builtin command names.
pub const BUILTINS: &[&str] = &["quit", "jobs", "bg", "fg", "alias"];

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// One program in a pipeline: `argv[0]` is the program or builtin name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    argv: Vec<String>,
}

impl Stage {
    fn from_words(words: &[Word]) -> Self {
        Self {
            argv: expander::expand_words(words),
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn is_builtin(&self) -> bool {
        is_builtin(self.program())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.argv().iter().map(|a| render_arg(a)).collect();
        f.write_str(&rendered.join(" "))
    }
}

fn render_arg(arg: &str) -> String {
    let special = arg == "&"
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '|' | '*' | '?' | '['));
    if special {
        format!("'{arg}'")
    } else {
        arg.to_string()
    }
}

/// One or more stages joined by pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub background: bool,
}

impl Pipeline {
    /// The builtin this line invokes, if it is a lone builtin stage.
    pub fn builtin(&self) -> Option<&Stage> {
        match self.stages.as_slice() {
            [only] if only.is_builtin() => Some(only),
            _ => None,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{stage}")?;
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

/// Group a parsed line into pipeline stages.
///
/// Alias substitution runs on the leading word first, so an alias may
/// expand into a pipeline of its own.
pub fn build(line: ParsedLine, aliases: &AliasTable) -> Result<Pipeline, PipelineError> {
    let mut words = aliases.rewrite(line.words)?;
    // An alias body may end in its own `&`.
    let mut background = line.background;
    if words.last().is_some_and(Word::is_background_marker) {
        words.pop();
        background = true;
    }

    let mut stages = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    for word in words {
        if word.is_pipe() {
            if current.is_empty() {
                return Err(PipelineError::EmptyStage);
            }
            stages.push(Stage::from_words(&current));
            current.clear();
        } else {
            current.push(word);
        }
    }
    if current.is_empty() {
        return Err(PipelineError::EmptyStage);
    }
    stages.push(Stage::from_words(&current));

    if stages.len() > MAX_MEMBERS {
        return Err(PipelineError::TooManyStages {
            count: stages.len(),
            max: MAX_MEMBERS,
        });
    }

    if stages.len() > 1 {
        if let Some(stage) = stages.iter().find(|s| s.is_builtin()) {
            return Err(PipelineError::BuiltinInPipeline(stage.program().to_string()));
        }
    }

    Ok(Pipeline {
        stages,
        background,
    })
}

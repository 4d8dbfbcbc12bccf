use std::io::Write;

use tracing::debug;

use crate::aliases::AliasTable;
use crate::builtins;
use crate::error::ShellError;
use crate::foreground::{self, TerminalPolicy};
use crate::launcher;
use crate::parser;
use crate::pipeline;
use crate::search_path::SearchPath;
use crate::signals;

/// What the read-evaluate loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

/// Per-session state owned by the main flow.
pub struct Shell {
    pub aliases: AliasTable,
    pub search_path: SearchPath,
    pub policy: TerminalPolicy,
}

impl Shell {
    pub fn new(search_path: SearchPath, policy: TerminalPolicy) -> Self {
        Self {
            aliases: AliasTable::new(),
            search_path,
            policy,
        }
    }

    /// Evaluate one input line. Errors are reported on `stderr` and never end
    /// the session.
    pub fn eval(&mut self, line: &str, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Flow {
        match self.try_eval(line, stdout, stderr) {
            Ok(flow) => flow,
            Err(err) => {
                let _ = writeln!(stderr, "{err}");
                Flow::Continue
            }
        }
    }

    fn try_eval(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Flow, ShellError> {
        let parsed = parser::parse(line)?;
        if parsed.is_empty() {
            return Ok(Flow::Continue);
        }
        let pipeline = pipeline::build(parsed, &self.aliases)?;
        debug!(%pipeline, "evaluating");

        if let Some(stage) = pipeline.builtin() {
            return Ok(builtins::execute(stage, self, stdout, stderr));
        }

        let cmdline = line.trim();
        let launched = launcher::launch(&pipeline, cmdline, &self.search_path)?;
        for problem in &launched.problems {
            writeln!(stderr, "{problem}")?;
        }

        if pipeline.background {
            writeln!(stdout, "[{}] ({}) {}", launched.seq, launched.pgid, cmdline)?;
        } else {
            stdout.flush()?;
            foreground::wait_foreground(launched.pgid, self.policy);
            report_notices(stdout);
        }
        Ok(Flow::Continue)
    }
}

/// Print whatever the signal handlers queued since the last call.
pub fn report_notices(stdout: &mut dyn Write) {
    for notice in signals::take_notices() {
        let _ = writeln!(stdout, "{notice}");
    }
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(shell: &mut Shell, line: &str) -> (Flow, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let flow = shell.eval(line, &mut out, &mut err);
        (
            flow,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn shell() -> Shell {
        Shell::new(SearchPath::default(), TerminalPolicy::Retain)
    }

    #[test]
    fn blank_line_is_a_no_op() {
        let (flow, out, err) = eval(&mut shell(), "   ");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn parse_errors_are_reported() {
        let (flow, _, err) = eval(&mut shell(), "echo 'unterminated");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(err, "unmatched single quote\n");
    }

    #[test]
    fn pipeline_errors_are_reported() {
        let (_, _, err) = eval(&mut shell(), "ls | | wc");
        assert!(err.contains("empty pipeline stage"));
        let (_, _, err) = eval(&mut shell(), "jobs | wc");
        assert!(err.contains("jobs: builtin commands cannot be used in a pipeline"));
    }

    #[test]
    fn unknown_first_stage_spawns_nothing() {
        // An empty search path cannot resolve a bare name.
        let (flow, out, err) = eval(&mut shell(), "definitely-not-a-command arg");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());
        assert_eq!(err, "definitely-not-a-command: Command not found\n");
    }

    #[test]
    fn alias_then_quit() {
        let mut sh = shell();
        eval(&mut sh, "alias bye='quit 4'");
        assert_eq!(eval(&mut sh, "bye").0, Flow::Exit(4));
    }
}

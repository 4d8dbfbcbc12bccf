use std::io::{self, BufRead, Write};

use crossterm::tty::IsTty;

pub const PROMPT: &str = "CaiShell> ";

/// Supplies one input line at a time, emitting the prompt when asked to.
pub struct LineSource<R> {
    input: R,
    prompt: Option<&'static str>,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(input: R, prompt: Option<&'static str>) -> Self {
        Self { input, prompt }
    }

    /// Read the next line without its terminator. `Ok(None)` is end of input.
    pub fn next_line(&mut self, stdout: &mut dyn Write) -> io::Result<Option<String>> {
        if let Some(prompt) = self.prompt {
            write!(stdout, "{prompt}")?;
            stdout.flush()?;
        }

        // Raw bytes: a line that is not UTF-8 is still a line, not a read error.
        let mut raw = Vec::new();
        if self.input.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }
}

/// The prompt to show: none when disabled or when stdin is not a terminal.
pub fn interactive_prompt(enabled: bool) -> Option<&'static str> {
    (enabled && io::stdin().is_tty()).then_some(PROMPT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn yields_lines_then_end_of_input() {
        let mut source = LineSource::new(Cursor::new("echo hi\r\njobs\nlast"), None);
        let mut out = Vec::new();
        assert_eq!(source.next_line(&mut out).unwrap().as_deref(), Some("echo hi"));
        assert_eq!(source.next_line(&mut out).unwrap().as_deref(), Some("jobs"));
        assert_eq!(source.next_line(&mut out).unwrap().as_deref(), Some("last"));
        assert_eq!(source.next_line(&mut out).unwrap(), None);
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_utf8_does_not_end_input() {
        let mut source = LineSource::new(Cursor::new(&b"echo \xff\nnext\n"[..]), None);
        let mut out = Vec::new();
        assert_eq!(
            source.next_line(&mut out).unwrap().as_deref(),
            Some("echo \u{fffd}")
        );
        assert_eq!(source.next_line(&mut out).unwrap().as_deref(), Some("next"));
        assert_eq!(source.next_line(&mut out).unwrap(), None);
    }

    #[test]
    fn prompt_is_written_before_each_read() {
        let mut source = LineSource::new(Cursor::new("a\n"), Some(PROMPT));
        let mut out = Vec::new();
        source.next_line(&mut out).unwrap();
        source.next_line(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{PROMPT}{PROMPT}"));
    }
}

use crate::error::ParseError;

/// The reserved pipe separator.
pub const PIPE: &str = "|";
/// Trailing marker requesting a background job.
pub const BACKGROUND: &str = "&";

/// A single argument after quote removal.
///
/// `quoted` records whether any part of the word came from inside single
/// quotes. Quoted words are never treated as operators and never expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub quoted: bool,
}

impl Word {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn is_pipe(&self) -> bool {
        !self.quoted && self.text == PIPE
    }

    pub fn is_background_marker(&self) -> bool {
        !self.quoted && self.text == BACKGROUND
    }

    /// Render the word so that `tokenize` reads it back unchanged.
    #[cfg(test)]
    pub fn render(&self) -> String {
        let needs_quotes = self.quoted
            || self.text.chars().any(char::is_whitespace)
            || self.text.contains('|');
        if needs_quotes {
            format!("'{}'", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub words: Vec<Word>,
    pub background: bool,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens; whitespace is skipped
    Normal,
    /// Building an unquoted word; whitespace ends it
    InWord,
    /// Inside single quotes; everything is literal
    InSingleQuote,
}

/// Split a line into words and strip a trailing `&`.
///
/// A blank line yields an empty word list; callers treat that as a no-op.
pub fn parse(line: &str) -> Result<ParsedLine, ParseError> {
    let mut words = tokenize(line)?;
    let background = words.last().is_some_and(Word::is_background_marker);
    if background {
        words.pop();
    }
    Ok(ParsedLine { words, background })
}

/// Tokenize input into words.
///
/// Single quotes may open anywhere in a word and are removed; an unquoted `|`
/// always stands alone. Words that are empty after quote removal are dropped.
pub fn tokenize(input: &str) -> Result<Vec<Word>, ParseError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut state = State::Normal;

    for ch in input.chars() {
        match (&state, ch) {
            (State::Normal, c) if c.is_whitespace() => {}
            (State::Normal, '\'') => {
                quoted = true;
                state = State::InSingleQuote;
            }
            (State::Normal, '|') => {
                words.push(Word::plain(PIPE));
            }
            (State::Normal, c) => {
                current.push(c);
                state = State::InWord;
            }

            (State::InWord, c) if c.is_whitespace() => {
                finish_word(&mut words, &mut current, &mut quoted);
                state = State::Normal;
            }
            (State::InWord, '\'') => {
                quoted = true;
                state = State::InSingleQuote;
            }
            (State::InWord, '|') => {
                finish_word(&mut words, &mut current, &mut quoted);
                words.push(Word::plain(PIPE));
                state = State::Normal;
            }
            (State::InWord, c) => current.push(c),

            // Closing quote returns to word-building so `a'b c'd` stays one word.
            (State::InSingleQuote, '\'') => state = State::InWord,
            (State::InSingleQuote, c) => current.push(c),
        }
    }

    match state {
        State::InSingleQuote => Err(ParseError::MalformedQuote),
        _ => {
            finish_word(&mut words, &mut current, &mut quoted);
            Ok(words)
        }
    }
}

fn finish_word(words: &mut Vec<Word>, current: &mut String, quoted: &mut bool) {
    if !current.is_empty() {
        words.push(Word {
            text: std::mem::take(current),
            quoted: *quoted,
        });
    }
    *quoted = false;
}

/// Flatten words into plain strings, discarding quote context.
#[cfg(test)]
pub fn words_to_strings(words: &[Word]) -> Vec<String> {
    words.iter().map(|w| w.text.clone()).collect()
}

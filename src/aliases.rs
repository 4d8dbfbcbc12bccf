use std::collections::BTreeMap;

use crate::error::{AliasError, PipelineError};
use crate::parser::{self, Word};

/// Upper bound on chained alias substitutions for one command line.
pub const MAX_ALIAS_DEPTH: usize = 16;

/// Name → replacement text. The text is re-tokenized on every use so it may
/// carry quotes and pipes.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an alias from a `name=value` definition (quotes
    /// already removed by the tokenizer).
    pub fn define(&mut self, definition: &str) -> Result<(), AliasError> {
        let Some((name, value)) = definition.split_once('=') else {
            return Err(AliasError::Malformed(definition.to_string()));
        };
        if !is_valid_name(name) || value.trim().is_empty() {
            return Err(AliasError::Malformed(definition.to_string()));
        }
        parser::tokenize(value)?;
        self.entries.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Substitute the leading word until it no longer names an alias.
    ///
    /// An alias whose replacement starts with its own name stops there; any
    /// other revisit, or more than [`MAX_ALIAS_DEPTH`] substitutions, is a
    /// cycle.
    pub fn rewrite(&self, mut words: Vec<Word>) -> Result<Vec<Word>, PipelineError> {
        let mut expanded: Vec<String> = Vec::new();

        loop {
            let Some(first) = words.first() else {
                return Ok(words);
            };
            if first.quoted {
                return Ok(words);
            }
            let Some(value) = self.entries.get(&first.text) else {
                return Ok(words);
            };

            let name = first.text.clone();
            if expanded.contains(&name) || expanded.len() >= MAX_ALIAS_DEPTH {
                return Err(PipelineError::AliasCycle(name));
            }

            let mut replacement = parser::tokenize(value)?;
            let self_referential = replacement
                .first()
                .is_some_and(|w| !w.quoted && w.text == name);
            replacement.extend(words.drain(1..));
            words = replacement;
            expanded.push(name);

            if self_referential {
                return Ok(words);
            }
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c == '|' || c == '\'' || c == '/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{tokenize, words_to_strings};

    fn rewrite(table: &AliasTable, line: &str) -> Result<Vec<String>, PipelineError> {
        table
            .rewrite(tokenize(line).unwrap())
            .map(|w| words_to_strings(&w))
    }

    #[test]
    fn define_and_rewrite() {
        let mut table = AliasTable::new();
        table.define("ll=ls -l").unwrap();
        assert_eq!(rewrite(&table, "ll /tmp").unwrap(), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn redefine_replaces() {
        let mut table = AliasTable::new();
        table.define("x=echo one").unwrap();
        table.define("x=echo two").unwrap();
        assert_eq!(table.get("x"), Some("echo two"));
    }

    #[test]
    fn malformed_definitions_are_rejected() {
        let mut table = AliasTable::new();
        assert!(matches!(table.define("novalue"), Err(AliasError::Malformed(_))));
        assert!(matches!(table.define("=ls"), Err(AliasError::Malformed(_))));
        assert!(matches!(table.define("x="), Err(AliasError::Malformed(_))));
        assert!(matches!(table.define("x=echo 'open"), Err(AliasError::Parse(_))));
    }

    #[test]
    fn chained_aliases_expand() {
        let mut table = AliasTable::new();
        table.define("a=b --flag").unwrap();
        table.define("b=echo").unwrap();
        assert_eq!(rewrite(&table, "a x").unwrap(), vec!["echo", "--flag", "x"]);
    }

    #[test]
    fn self_reference_is_a_fixed_point() {
        let mut table = AliasTable::new();
        table.define("ls=ls -F").unwrap();
        assert_eq!(rewrite(&table, "ls").unwrap(), vec!["ls", "-F"]);
    }

    #[test]
    fn mutual_recursion_is_a_cycle() {
        let mut table = AliasTable::new();
        table.define("a=b").unwrap();
        table.define("b=a").unwrap();
        assert_eq!(
            rewrite(&table, "a"),
            Err(PipelineError::AliasCycle("a".into()))
        );
    }

    #[test]
    fn quoted_command_bypasses_alias() {
        let mut table = AliasTable::new();
        table.define("ls=echo nope").unwrap();
        assert_eq!(rewrite(&table, "'ls'").unwrap(), vec!["ls"]);
    }

    #[test]
    fn alias_may_introduce_pipe() {
        let mut table = AliasTable::new();
        table.define("count=wc -l |cat").unwrap();
        let words = table.rewrite(tokenize("count").unwrap()).unwrap();
        assert!(words[2].is_pipe());
    }
}

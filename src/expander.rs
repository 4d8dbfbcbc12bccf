use crate::parser::Word;

/// Expand a stage's words into final argument strings.
/// Quoted words pass through untouched; unquoted words get tilde and glob
/// expansion.
pub fn expand_words(words: &[Word]) -> Vec<String> {
    let mut result = Vec::new();
    for word in words {
        if word.quoted {
            result.push(word.text.clone());
            continue;
        }
        let expanded = expand_tilde(&word.text);
        result.extend(expand_globs(&expanded));
    }
    result
}

// ── Tilde Expansion ──

fn expand_tilde(token: &str) -> String {
    if !token.starts_with('~') {
        return token.to_string();
    }

    let Some(home) = home_dir() else {
        return token.to_string();
    };

    if token == "~" {
        return home;
    }

    if let Some(rest) = token.strip_prefix("~/") {
        return format!("{home}/{rest}");
    }

    // ~username is left as typed
    token.to_string()
}

fn home_dir() -> Option<String> {
    std::env::var("HOME").ok().filter(|h| !h.is_empty())
}

// ── Glob Expansion ──

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

fn expand_globs(pattern: &str) -> Vec<String> {
    if !contains_glob_chars(pattern) {
        return vec![pattern.to_string()];
    }

    match glob::glob(pattern) {
        Ok(paths) => {
            let mut matches: Vec<String> = paths
                .filter_map(|entry| entry.ok())
                .map(|path| path.to_string_lossy().into_owned())
                .collect();

            if matches.is_empty() {
                // POSIX keeps an unmatched pattern literal
                vec![pattern.to_string()]
            } else {
                matches.sort();
                matches
            }
        }
        Err(_) => vec![pattern.to_string()],
    }
}

//! Tokenizer for input lines.
//!
//! Shell-style word splitting with quoting and backslash escapes. There is
//! no globbing and no operators; every word is a plain argument.

use crate::error::{ShellError, ShellResult};

/// Split `line` into words. An empty or blank line gives no words.
pub fn tokenize(line: &str) -> ShellResult<Vec<String>> {
    let line = strip_comment(line);
    shlex::split(line).ok_or_else(|| {
        ShellError::Parse(format!(
            "unbalanced quotes or trailing escape in `{}`",
            line.trim()
        ))
    })
}

/// Drop a `#` comment that starts a word outside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut word_start = true;

    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            word_start = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double && word_start => return &line[..idx],
            _ => {}
        }
        word_start = c.is_whitespace() && !in_single && !in_double;
    }
    line
}

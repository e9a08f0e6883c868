//! Environment handling for one command line.
//!
//! Leading `NAME=VALUE` words are applied to the dispatch environment and
//! removed; `$NAME` and `${NAME}` in the remaining words are replaced from
//! that environment. Referencing an unset variable is an error.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{ShellError, ShellResult};

pub type Env = HashMap<String, String>;

/// Apply leading assignments to `env`, then expand variables in the rest.
pub fn parse_env_args(args: Vec<String>, env: &mut Env) -> ShellResult<Vec<String>> {
    let mut words = args.into_iter().peekable();

    while let Some((name, value)) = words.peek().and_then(|w| split_assignment(w)) {
        let value = expand_word(value, env)?;
        env.insert(name.to_string(), value);
        words.next();
    }

    words.map(|word| expand_word(&word, env)).collect()
}

/// `NAME=VALUE` with a valid variable name.
pub fn split_assignment(word: &str) -> Option<(&str, &str)> {
    let (name, value) = word.split_once('=')?;
    is_valid_name(name).then_some((name, value))
}

pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace `$NAME`, `${NAME}` and positional `$N` in one word.
pub fn expand_word(word: &str, env: &Env) -> ShellResult<String> {
    if !word.contains('$') {
        return Ok(word.to_string());
    }

    let mut result = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('{') => {
                chars.next();
                let name = collect_braced(&mut chars)?;
                result.push_str(lookup(&name, env)?);
            }
            Some(c) if c.is_ascii_digit() => {
                let name = chars.next().map(String::from).unwrap_or_default();
                result.push_str(lookup(&name, env)?);
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                result.push_str(lookup(&name, env)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

fn collect_braced(chars: &mut Peekable<Chars<'_>>) -> ShellResult<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            if name.is_empty() {
                return Err(ShellError::Parse("bad substitution: ${}".to_string()));
            }
            return Ok(name);
        }
        name.push(c);
    }
    Err(ShellError::Parse(format!("unterminated substitution: ${{{name}")))
}

fn lookup<'a>(name: &str, env: &'a Env) -> ShellResult<&'a str> {
    env.get(name)
        .map(String::as_str)
        .ok_or_else(|| ShellError::UndefinedVariable(name.to_string()))
}

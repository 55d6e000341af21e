//! Line tokenization for subject specifications.
//!
//! Batch files carry one specification per line: whitespace-separated
//! tokens, with double-quoted groups kept as a single token. Splitting a
//! token into key and value happens on the first `=` only; everything
//! after it belongs to the value.

use crate::error::{Error, Result};

/// One token of a specification, split on the first `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `KEY=VALUE` token. The value may be empty (`KEY=`).
    KeyValue { key: String, value: String },
    /// Token without an `=`, forwarded untouched.
    Raw(String),
}

impl Token {
    /// Classify a raw token. Never fails; a token without `=` is `Raw`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((key, value)) => Self::KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            },
            None => Self::Raw(raw.to_string()),
        }
    }
}

/// Whether a batch line is a comment: first non-whitespace char is `#`.
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Split one batch line into tokens.
///
/// Tokens are separated by runs of whitespace. A double-quoted group is
/// part of the enclosing token with the quotes stripped and inner
/// whitespace preserved, so `ROI="left hippocampus"` is one token with
/// value `left hippocampus`. Inside quotes, `\"` and `\\` escape the
/// quote and the backslash; any other backslash sequence is kept
/// verbatim. An unterminated quote is an error.
pub fn split_line(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut have_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => in_quotes = false,
                '\\' => match chars.next() {
                    Some(escaped @ ('"' | '\\')) => current.push(escaped),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(Error::UnclosedQuote(line.to_string())),
                },
                _ => current.push(c),
            }
        } else if c == '"' {
            in_quotes = true;
            have_token = true;
        } else if c.is_whitespace() {
            if have_token {
                tokens.push(std::mem::take(&mut current));
                have_token = false;
            }
        } else {
            current.push(c);
            have_token = true;
        }
    }

    if in_quotes {
        return Err(Error::UnclosedQuote(line.to_string()));
    }
    if have_token {
        tokens.push(current);
    }
    Ok(tokens)
}

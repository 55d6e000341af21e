//! Subject specification model.
//!
//! A specification is the ordered KEY=VALUE token list describing one job
//! to submit. It comes either straight from the command line or from one
//! line of a batch file. Token order is preserved end-to-end: the
//! dispatcher forwards the sequence verbatim to the per-subject runner.

use std::fmt;

use crate::error::Result;
use crate::tokenize::{self, Token};

/// Key that identifies the subject within a specification.
pub const SUBJECT_KEY: &str = "SUBJECT";

/// One subject specification: an ordered token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectSpec {
    tokens: Vec<String>,
}

impl SubjectSpec {
    /// Build a specification from already-split tokens (direct argv).
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Parse one batch-file line.
    ///
    /// Returns `Ok(None)` for blank lines and comments (first
    /// non-whitespace char `#`); those are skipped without validation.
    pub fn from_line(line: &str) -> Result<Option<Self>> {
        if tokenize::is_comment(line) {
            return Ok(None);
        }
        let tokens = tokenize::split_line(line)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { tokens }))
    }

    /// The token sequence, in original order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether the joined token text reads as a comment. Catches
    /// commented-out specifications passed as direct arguments.
    pub fn is_comment(&self) -> bool {
        self.tokens
            .first()
            .is_some_and(|first| first.starts_with('#'))
    }

    /// Value of the first token whose key is exactly `SUBJECT`.
    ///
    /// `None` when no such token exists. The value may be empty
    /// (`SUBJECT=`); callers treat that the same as absent.
    pub fn subject_id(&self) -> Option<String> {
        self.tokens.iter().find_map(|raw| match Token::parse(raw) {
            Token::KeyValue { key, value } if key == SUBJECT_KEY => Some(value),
            _ => None,
        })
    }
}

impl fmt::Display for SubjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

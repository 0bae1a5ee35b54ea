//! Parse errors

use super::ast::Span;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why SQL text could not be turned into a `Statement`
///
/// A parse error is terminal for an analysis request: nothing downstream
/// runs on a statement that did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    /// Malformed SQL, as reported by the SQL parser
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Byte offset of the offending token
        position: usize,
        line: usize,
        column: usize,
        message: String,
    },

    /// Well-formed SQL outside the supported subset
    #[error("unsupported construct at line {line}, column {column}: {construct}")]
    Unsupported {
        construct: String,
        span: Span,
        line: usize,
        column: usize,
    },
}

/// Discriminant of a `ParseError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    Syntax,
    Unsupported,
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            Self::Syntax { .. } => ParseErrorKind::Syntax,
            Self::Unsupported { .. } => ParseErrorKind::Unsupported,
        }
    }

    /// Byte offset where the problem starts
    pub fn position(&self) -> usize {
        match self {
            Self::Syntax { position, .. } => *position,
            Self::Unsupported { span, .. } => span.start,
        }
    }
}

/// Splits sqlparser's ` at Line: L, Column: C` suffix off an error message
pub(crate) fn split_location(message: &str) -> (&str, Option<(usize, usize)>) {
    const MARKER: &str = " at Line: ";
    let Some(idx) = message.rfind(MARKER) else {
        return (message, None);
    };
    let location = message[idx + MARKER.len()..]
        .split_once(", Column: ")
        .and_then(|(line, column)| Some((line.trim().parse().ok()?, column.trim().parse().ok()?)));
    match location {
        Some(location) => (&message[..idx], Some(location)),
        None => (message, None),
    }
}

//! Error types for exposition parsing.

use thiserror::Error;

/// Result type alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A payload that is not valid Prometheus text exposition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: sample has no value")]
    MissingValue { line: usize },

    #[error("line {line}: invalid metric name '{name}'")]
    InvalidName { line: usize, name: String },

    #[error("line {line}: malformed label set: {reason}")]
    Labels { line: usize, reason: String },

    #[error("line {line}: invalid sample value '{value}'")]
    InvalidValue { line: usize, value: String },

    #[error("line {line}: invalid sample timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line}: unexpected trailing text '{text}'")]
    Trailing { line: usize, text: String },

    #[error("line {line}: malformed {directive} directive")]
    Directive { line: usize, directive: &'static str },
}

impl ParseError {
    /// 1-based line number the error was found on.
    pub fn line(&self) -> usize {
        match self {
            ParseError::MissingValue { line }
            | ParseError::InvalidName { line, .. }
            | ParseError::Labels { line, .. }
            | ParseError::InvalidValue { line, .. }
            | ParseError::InvalidTimestamp { line, .. }
            | ParseError::Trailing { line, .. }
            | ParseError::Directive { line, .. } => *line,
        }
    }
}

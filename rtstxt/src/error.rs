//! Error types for the text format parser and its serde bridge.

use std::fmt;

/// Errors that can occur while parsing a token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unexpected end of file while parsing.
    UnexpectedEof {
        /// Position in the token stream where EOF was encountered.
        position: usize,
    },
    /// Encountered an unexpected token.
    UnexpectedToken {
        /// Position in the token stream.
        position: usize,
        /// The token that was found.
        token: String,
        /// What was expected instead.
        expected: String,
    },
    /// Invalid left-hand side in an assignment.
    InvalidLhs {
        /// Position in the token stream.
        position: usize,
        /// What was found on the LHS.
        found: String,
    },
    /// Missing right-hand side after `=` in an assignment.
    MissingRhs {
        /// Position in the token stream where RHS was expected.
        position: usize,
    },
    /// Parsing succeeded but there are unconsumed tokens remaining.
    UnconsumedTokens {
        /// Position where unconsumed tokens start.
        position: usize,
        /// Number of tokens remaining.
        remaining: usize,
    },
    /// Input was empty (no tokens to parse).
    EmptyInput,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof { position } => {
                write!(f, "Unexpected end of file at position {}", position)
            }
            ParseError::UnexpectedToken {
                position,
                token,
                expected,
            } => write!(
                f,
                "Unexpected token '{}' at position {}, expected {}",
                token, position, expected
            ),
            ParseError::InvalidLhs { position, found } => write!(
                f,
                "Invalid left-hand side '{}' at position {}",
                found, position
            ),
            ParseError::MissingRhs { position } => {
                write!(f, "Missing right-hand side at position {}", position)
            }
            ParseError::UnconsumedTokens {
                position,
                remaining,
            } => write!(
                f,
                "Parsing incomplete: {} unconsumed tokens starting at position {}",
                remaining, position
            ),
            ParseError::EmptyInput => write!(f, "Cannot parse empty input"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors raised while mapping between parse trees and serde types.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The text could not be parsed.
    Parse(ParseError),
    /// The tree did not match the requested shape, or a value cannot be written.
    Message(String),
}

impl Error {
    pub(crate) fn msg(s: impl Into<String>) -> Self {
        Error::Message(s.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "parse error: {}", e),
            Error::Message(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Message(_) => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

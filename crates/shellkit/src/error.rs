//! Error types for shellkit

use thiserror::Error;

/// Result type alias using shellkit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Shellkit error types.
///
/// `Incomplete` is not a failure in resumable mode: it signals that the
/// caller should feed more input before the current construct can close.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input detected while tokenizing.
    #[error("syntax error: {0}")]
    Lex(String),

    /// An open construct (quote, `$(`, `if` without `fi`, ...) reached
    /// end of input. Resumable callers should supply more text.
    #[error("unexpected end of input: {0}")]
    Incomplete(String),

    /// Grammar violation while parsing.
    #[error("parse error: {0}")]
    Parse(String),

    /// Bad parameter reference, failed `${P:?}`, or modifier misuse.
    #[error("bad substitution: {0}")]
    Expansion(String),

    /// Arithmetic evaluation failure (division by zero, malformed expression).
    #[error("arithmetic error: {0}")]
    Arith(String),

    /// Redirection target could not be opened or written.
    #[error("redirection error: {0}")]
    Redirection(String),

    /// Command name resolved to neither function, builtin, nor PATH entry.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// I/O error from the host system.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when more input may complete the parse.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Incomplete(_))
    }

    /// Exit status a failing command should report for this error.
    pub fn exit_status(&self) -> i32 {
        match self {
            Error::CommandNotFound(_) => 127,
            Error::Lex(_) | Error::Incomplete(_) | Error::Parse(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_is_detected() {
        assert!(Error::Incomplete("'if' without 'fi'".into()).is_incomplete());
        assert!(!Error::Parse("unexpected token".into()).is_incomplete());
    }

    #[test]
    fn exit_status_mapping() {
        assert_eq!(Error::CommandNotFound("nope".into()).exit_status(), 127);
        assert_eq!(Error::Parse("bad".into()).exit_status(), 2);
        assert_eq!(Error::Expansion("P: unset".into()).exit_status(), 1);
    }
}

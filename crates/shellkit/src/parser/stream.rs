//! Token stream cursor used by the grammar rules
//!
//! The stream is the sole token accessor for the parser: peeking,
//! consuming, conditional matching, and error synchronization all go
//! through it.

use super::tokens::{Position, Token, TokenKind};
use crate::error::{Error, Result};

/// Keywords the stream can synchronize on after an error.
const SYNC_KEYWORDS: &[&str] = &["fi", "done", "esac"];

/// A cursor over a lexed token list.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    current: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// The current token. The lexer guarantees a trailing EOF token, so
    /// this never runs out.
    pub fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or_else(|| {
            self.tokens.last().expect("token stream always holds at least EOF")
        })
    }

    /// Look `offset` tokens ahead without consuming.
    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    /// Source position of the current token, for diagnostics.
    pub fn position(&self) -> Position {
        self.peek().position
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    /// Consume and return the current token.
    pub fn consume(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        tok
    }

    /// Consume the current token if it is the given operator.
    pub fn match_operator(&mut self, op: &str) -> bool {
        if self.peek().is_operator(op) {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Consume the current token if it would be promoted to the given
    /// keyword in this position.
    pub fn match_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_keyword(kw) {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Consume a newline token if present.
    pub fn match_newline(&mut self) -> bool {
        if self.peek().is_newline() {
            self.consume();
            true
        } else {
            false
        }
    }

    pub fn skip_newlines(&mut self) {
        while self.match_newline() {}
    }

    pub fn at_operator(&self, op: &str) -> bool {
        self.peek().is_operator(op)
    }

    pub fn at_keyword(&self, kw: &str) -> bool {
        self.peek().is_keyword(kw)
    }

    pub fn at_word(&self) -> bool {
        self.peek().is_word()
    }

    /// Require the given operator, or fail with a positioned parse error.
    pub fn expect_operator(&mut self, op: &str) -> Result<Token> {
        if self.peek().is_operator(op) {
            Ok(self.consume())
        } else {
            Err(self.unexpected(&format!("expected '{op}'")))
        }
    }

    /// Require the given keyword. A missing closing keyword at end of
    /// input is reported as incomplete so resumable callers can continue.
    pub fn expect_keyword(&mut self, kw: &str) -> Result<Token> {
        if self.peek().is_keyword(kw) {
            Ok(self.consume())
        } else if self.is_at_end() {
            Err(Error::Incomplete(format!("expected '{kw}'")))
        } else {
            Err(self.unexpected(&format!("expected '{kw}'")))
        }
    }

    /// Require any word token.
    pub fn expect_word(&mut self) -> Result<Token> {
        if self.peek().is_word() {
            Ok(self.consume())
        } else if self.is_at_end() {
            Err(Error::Incomplete("expected a word".into()))
        } else {
            Err(self.unexpected("expected a word"))
        }
    }

    /// Build a parse error describing the current token.
    pub fn unexpected(&self, expected: &str) -> Error {
        let tok = self.peek();
        let found = match tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "newline".to_string(),
            _ => format!("'{}'", tok.lexeme),
        };
        Error::Parse(format!("{} at {}, found {}", expected, tok.position, found))
    }

    /// Skip ahead to the next recovery point: `;`, newline, or a closing
    /// keyword. The recovery token itself is left for the caller.
    pub fn synchronize(&mut self) {
        while !self.is_at_end() {
            let tok = self.peek();
            if tok.is_operator(";") || tok.is_newline() {
                self.consume();
                return;
            }
            if SYNC_KEYWORDS.iter().any(|kw| tok.is_keyword(kw)) {
                return;
            }
            self.consume();
        }
    }

    /// Save the cursor for backtracking.
    pub fn save(&self) -> usize {
        self.current
    }

    /// Restore a previously saved cursor.
    pub fn restore(&mut self, saved: usize) {
        self.current = saved.min(self.tokens.len());
    }
}

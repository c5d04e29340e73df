//! Word expansion
//!
//! Drives the POSIX expansion order over a word: brace expansion, tilde
//! expansion, parameter/command/arithmetic expansion in source order,
//! IFS word splitting, and pathname expansion. Contexts that forbid
//! splitting (assignment values, case subjects, redirection targets)
//! use the single-result entry point.

pub mod arith;
pub mod braces;
pub mod modifiers;
pub mod pattern;
pub mod tokenizer;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::parser::{Quoting, Word};
use arith::ArithEnv;
use modifiers::Modifier;
use tokenizer::{ExpToken, ExpTokenKind};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default field separators when `IFS` is unset.
const DEFAULT_IFS: &str = " \t\n";

/// What the expander needs from its surroundings: variable reads and
/// writes, positional parameters, command substitution, and home
/// directories. The interpreter implements this; tests supply mocks.
#[async_trait]
pub trait ExpansionHost: Send {
    /// Read a variable or special parameter by name.
    fn lookup(&mut self, name: &str) -> Option<String>;

    /// Write a variable (used by `${P:=w}` and arithmetic assignment).
    fn assign(&mut self, name: &str, value: &str);

    /// The positional parameters as separate values.
    fn positional_fields(&mut self) -> Vec<String>;

    /// Run a program and return its captured stdout.
    async fn capture(&mut self, script: &str) -> Result<String>;

    /// Home directory for tilde expansion; `None` leaves the tilde as is.
    fn home_dir(&mut self, user: Option<&str>) -> Option<String>;

    /// Working directory for pathname expansion.
    fn cwd(&mut self) -> PathBuf;

    /// Memoized arithmetic results, keyed by pre-expanded source.
    fn cached_expr(&mut self, expr: &str) -> Option<String> {
        let _ = expr;
        None
    }

    fn store_expr(&mut self, expr: &str, result: &str) {
        let _ = (expr, result);
    }
}

/// One expanded span, before field assembly.
#[derive(Debug, Clone)]
enum Piece {
    Text {
        text: String,
        /// Results of unquoted expansions are subject to word splitting.
        splittable: bool,
    },
    /// Hard field boundary from a quoted `"$@"`.
    Break,
}

impl Piece {
    fn literal(text: impl Into<String>) -> Self {
        Piece::Text { text: text.into(), splittable: false }
    }
}

/// Word expander bound to a host for the duration of one expansion.
pub struct Expander<'h, H: ExpansionHost> {
    host: &'h mut H,
}

impl<'h, H: ExpansionHost> Expander<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self { host }
    }

    /// Full expansion of a word into zero or more fields.
    pub async fn expand_fields(&mut self, word: &Word) -> Result<Vec<String>> {
        if is_fast_path(&word.raw) {
            return Ok(vec![word.raw.clone()]);
        }
        tracing::trace!(word = %word.raw, "expanding word");

        let ifs = self.host.lookup("IFS");
        let mut fields = Vec::new();
        for candidate in self.brace_candidates(word) {
            let candidate = self.tilde(&candidate);
            let pieces = self.expand_text(&candidate).await?;
            let mut split = assemble_fields(&pieces, ifs.as_deref());
            if word.quoting == Quoting::Unquoted {
                let cwd = self.host.cwd();
                split = split
                    .into_iter()
                    .flat_map(|f| pattern::expand_pathnames(&f, &cwd))
                    .collect();
            }
            fields.extend(split);
        }
        Ok(fields)
    }

    /// Expansion without word splitting or pathname expansion, for
    /// assignment values, case subjects and patterns, and redirection
    /// targets. Multiple brace results join with single spaces.
    pub async fn expand_single(&mut self, word: &Word) -> Result<String> {
        if is_fast_path(&word.raw) {
            return Ok(word.raw.clone());
        }

        let mut parts = Vec::new();
        for candidate in self.brace_candidates(word) {
            let candidate = self.tilde(&candidate);
            let pieces = self.expand_text(&candidate).await?;
            parts.push(concat_pieces(&pieces));
        }
        Ok(parts.join(" "))
    }

    fn brace_candidates(&self, word: &Word) -> Vec<String> {
        match word.quoting {
            Quoting::SingleQuoted | Quoting::DoubleQuoted => vec![word.raw.clone()],
            _ => braces::expand_braces(&word.raw),
        }
    }

    /// Leading unquoted `~` or `~user`.
    fn tilde(&mut self, text: &str) -> String {
        if !text.starts_with('~') {
            return text.to_string();
        }
        let end = text.find('/').unwrap_or(text.len());
        let user = &text[1..end];
        let home = if user.is_empty() {
            self.host.home_dir(None)
        } else {
            self.host.home_dir(Some(user))
        };
        match home {
            Some(home) => format!("{home}{}", &text[end..]),
            None => text.to_string(),
        }
    }

    async fn expand_text(&mut self, text: &str) -> Result<Vec<Piece>> {
        let mut pieces = Vec::new();
        for token in tokenizer::tokenize(text) {
            self.expand_token(&token, &mut pieces).await?;
        }
        Ok(pieces)
    }

    async fn expand_token(&mut self, token: &ExpToken, out: &mut Vec<Piece>) -> Result<()> {
        let quoted = token.quoted;
        match token.kind {
            ExpTokenKind::Literal => out.push(Piece::literal(token.text.clone())),

            ExpTokenKind::SingleQuoted => {
                out.push(Piece::literal(strip_delims(&token.text, "'", "'")));
            }

            ExpTokenKind::DoubleQuoted => {
                // Segments may carry an opening or closing quote char. A
                // bare boundary quote contributes nothing; an explicit
                // `""` still produces an (empty) field.
                let inner: String = token.text.chars().filter(|c| *c != '"').collect();
                let quote_count = token.text.chars().filter(|c| *c == '"').count();
                if !inner.is_empty() || quote_count >= 2 {
                    out.push(Piece::literal(inner));
                }
            }

            ExpTokenKind::EscapedChar => {
                let mut chars = token.text.chars();
                chars.next();
                match chars.next() {
                    Some(c) => out.push(Piece::literal(c.to_string())),
                    None => out.push(Piece::literal("\\")),
                }
            }

            ExpTokenKind::Variable => {
                let name = token.text.trim_start_matches('$');
                self.expand_positional_aware(name, quoted, out)?;
            }

            ExpTokenKind::BraceVariable => {
                let content = strip_delims(&token.text, "${", "}");
                if matches!(content.as_str(), "@" | "*") {
                    self.expand_positional_aware(&content, quoted, out)?;
                } else {
                    let value = self.expand_parameter(&content).await?;
                    out.push(Piece::Text { text: value, splittable: !quoted });
                }
            }

            ExpTokenKind::Arithmetic => {
                let body = strip_delims(&token.text, "$((", "))");
                let value = self.eval_arithmetic(&body).await?;
                out.push(Piece::Text { text: value, splittable: !quoted });
            }

            ExpTokenKind::CommandSub => {
                let script = strip_delims(&token.text, "$(", ")");
                let output = self.host.capture(&script).await?;
                out.push(Piece::Text {
                    text: strip_trailing_newlines(output),
                    splittable: !quoted,
                });
            }

            ExpTokenKind::Backtick => {
                let script = unescape_backquoted(&strip_delims(&token.text, "`", "`"));
                let output = self.host.capture(&script).await?;
                out.push(Piece::Text {
                    text: strip_trailing_newlines(output),
                    splittable: !quoted,
                });
            }

            ExpTokenKind::BracePattern => {
                // An unexpanded brace pattern (quoted or non-expandable)
                // passes through literally.
                out.push(Piece::literal(token.text.clone()));
            }
        }
        Ok(())
    }

    /// `$@` and `$*` depend on quoting; everything else reads the scope.
    fn expand_positional_aware(
        &mut self,
        name: &str,
        quoted: bool,
        out: &mut Vec<Piece>,
    ) -> Result<()> {
        match name {
            "@" if quoted => {
                // One field per parameter, regardless of content.
                for (i, param) in self.host.positional_fields().into_iter().enumerate() {
                    if i > 0 {
                        out.push(Piece::Break);
                    }
                    out.push(Piece::literal(param));
                }
            }
            "*" if quoted => {
                let sep = match self.host.lookup("IFS") {
                    None => " ".to_string(),
                    Some(ifs) => ifs.chars().next().map(String::from).unwrap_or_default(),
                };
                out.push(Piece::literal(self.host.positional_fields().join(&sep)));
            }
            "@" | "*" => {
                out.push(Piece::Text {
                    text: self.host.positional_fields().join(" "),
                    splittable: true,
                });
            }
            _ => {
                let value = self.host.lookup(name).unwrap_or_default();
                out.push(Piece::Text { text: value, splittable: !quoted });
            }
        }
        Ok(())
    }

    /// `${...}` with modifier semantics.
    async fn expand_parameter(&mut self, content: &str) -> Result<String> {
        let param = modifiers::parse(content)?;
        let value = self.parameter_value(&param.name);

        match param.modifier {
            Modifier::None => Ok(value.unwrap_or_default()),

            Modifier::Length => {
                Ok(value.unwrap_or_default().chars().count().to_string())
            }

            Modifier::UseDefault(word) => {
                let v = value.unwrap_or_default();
                if v.is_empty() {
                    self.expand_operand(&word).await
                } else {
                    Ok(v)
                }
            }

            Modifier::AssignDefault(word) => {
                if !is_assignable(&param.name) {
                    return Err(Error::Expansion(format!(
                        "{}: cannot assign in this way",
                        param.name
                    )));
                }
                let v = value.unwrap_or_default();
                if v.is_empty() {
                    let default = self.expand_operand(&word).await?;
                    self.host.assign(&param.name, &default);
                    Ok(default)
                } else {
                    Ok(v)
                }
            }

            Modifier::ErrorIfEmpty(word) => {
                let v = value.unwrap_or_default();
                if v.is_empty() {
                    let message = if word.is_empty() {
                        "parameter null or not set".to_string()
                    } else {
                        self.expand_operand(&word).await?
                    };
                    Err(Error::Expansion(format!("{}: {}", param.name, message)))
                } else {
                    Ok(v)
                }
            }

            Modifier::UseAlternate(word) => {
                let v = value.unwrap_or_default();
                if v.is_empty() {
                    Ok(String::new())
                } else {
                    self.expand_operand(&word).await
                }
            }

            Modifier::Substring { offset, length } => {
                Ok(modifiers::substring(&value.unwrap_or_default(), offset, length))
            }

            Modifier::RemovePrefix { pattern, longest } => {
                let pat = self.expand_operand(&pattern).await?;
                Ok(modifiers::remove_pattern(&value.unwrap_or_default(), &pat, true, longest))
            }

            Modifier::RemoveSuffix { pattern, longest } => {
                let pat = self.expand_operand(&pattern).await?;
                Ok(modifiers::remove_pattern(&value.unwrap_or_default(), &pat, false, longest))
            }

            Modifier::Replace { pattern, replacement, all, anchor } => {
                let pat = self.expand_operand(&pattern).await?;
                let repl = self.expand_operand(&replacement).await?;
                Ok(modifiers::substitute(&value.unwrap_or_default(), &pat, &repl, all, anchor))
            }

            Modifier::CaseConvert { upper, all_chars } => {
                Ok(modifiers::case_convert(&value.unwrap_or_default(), upper, all_chars))
            }
        }
    }

    fn parameter_value(&mut self, name: &str) -> Option<String> {
        match name {
            "@" | "*" => Some(self.host.positional_fields().join(" ")),
            _ => self.host.lookup(name),
        }
    }

    /// Modifier operands expand recursively but never split.
    fn expand_operand<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<String>>
    where
        H: 'a,
    {
        Box::pin(async move {
            if is_fast_path(text) {
                return Ok(text.to_string());
            }
            let pieces = self.expand_text(text).await?;
            Ok(concat_pieces(&pieces))
        })
    }

    /// Arithmetic bodies undergo parameter and command expansion first;
    /// results are memoized by the pre-expanded source unless evaluation
    /// has side effects.
    async fn eval_arithmetic(&mut self, body: &str) -> Result<String> {
        let expanded = if body.contains('$') || body.contains('`') {
            self.expand_operand(body).await?
        } else {
            body.to_string()
        };

        let cacheable = !arith::has_side_effects(&expanded);
        if cacheable {
            if let Some(cached) = self.host.cached_expr(&expanded) {
                return Ok(cached);
            }
        }

        let mut env = HostArith { host: &mut *self.host };
        let value = arith::eval(&expanded, &mut env)?.to_string();
        if cacheable {
            self.host.store_expr(&expanded, &value);
        }
        Ok(value)
    }
}

/// Adapter giving the arithmetic evaluator scoped variable access.
struct HostArith<'a, H: ExpansionHost> {
    host: &'a mut H,
}

impl<H: ExpansionHost> ArithEnv for HostArith<'_, H> {
    fn get(&mut self, name: &str) -> Option<String> {
        self.host.lookup(name)
    }

    fn set(&mut self, name: &str, value: i64) {
        self.host.assign(name, &value.to_string());
    }
}

/// Only plain named variables accept `${P:=w}` assignment.
fn is_assignable(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Words without any shell metacharacters skip the machine entirely.
fn is_fast_path(text: &str) -> bool {
    !text.chars().any(|c| {
        matches!(c, '$' | '`' | '\'' | '"' | '\\' | '{' | '}' | '~' | '*' | '?' | '[')
    })
}

fn strip_delims(text: &str, open: &str, close: &str) -> String {
    text.strip_prefix(open)
        .and_then(|t| t.strip_suffix(close))
        .unwrap_or(text)
        .to_string()
}

fn strip_trailing_newlines(mut s: String) -> String {
    while s.ends_with('\n') {
        s.pop();
    }
    s
}

/// Undo the backslash escapes backquotes allow: `` \` ``, `\\`, `\$`.
fn unescape_backquoted(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut chars = script.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('`' | '\\' | '$')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Build fields from expanded pieces, splitting splittable spans on IFS.
fn assemble_fields(pieces: &[Piece], ifs: Option<&str>) -> Vec<String> {
    let ifs = ifs.unwrap_or(DEFAULT_IFS);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut started = false;

    for piece in pieces {
        match piece {
            Piece::Break => {
                fields.push(std::mem::take(&mut current));
                started = false;
            }
            Piece::Text { text, splittable } => {
                if !*splittable || ifs.is_empty() {
                    if !text.is_empty() || !*splittable {
                        started = true;
                    }
                    current.push_str(text);
                } else {
                    for ch in text.chars() {
                        if ifs.contains(ch) {
                            if ch.is_whitespace() {
                                if started {
                                    fields.push(std::mem::take(&mut current));
                                    started = false;
                                }
                            } else {
                                // Non-whitespace separators delimit even
                                // empty fields.
                                fields.push(std::mem::take(&mut current));
                                started = false;
                            }
                        } else {
                            current.push(ch);
                            started = true;
                        }
                    }
                }
            }
        }
    }

    if started {
        fields.push(current);
    }
    fields
}

fn concat_pieces(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Break => out.push(' '),
            Piece::Text { text, .. } => out.push_str(text),
        }
    }
    out
}

//! Parser module for shellkit
//!
//! Implements a recursive descent parser over the token stream, plus a
//! resumable session for interactive multi-line entry: feeding chunks
//! accumulates input until every open construct closes.

mod ast;
mod lexer;
mod stream;
mod tokens;

pub use ast::*;
pub use lexer::{tokenize, Lexer};
pub use stream::TokenStream;
pub use tokens::{Position, Quoting, Token, TokenKind, RESERVED_WORDS};

use std::sync::Arc;

use crate::error::{Error, Result};

/// Keywords that open a compound command.
const COMPOUND_STARTS: &[&str] = &["if", "while", "until", "for", "case", "{", "function"];

/// Where a command sequence may legally stop.
#[derive(Debug, Clone, Copy, Default)]
struct SequenceEnd<'a> {
    keywords: &'a [&'a str],
    operators: &'a [&'a str],
}

/// Recursive descent parser for shell programs.
pub struct Parser {
    stream: TokenStream,
}

impl Parser {
    /// Lex the input and prepare to parse it.
    pub fn new(input: &str) -> Result<Self> {
        Ok(Self { stream: TokenStream::new(tokenize(input)?) })
    }

    /// Parse a complete program.
    ///
    /// Grammar violations are recorded, the stream synchronizes on the
    /// next statement boundary, and parsing continues so one bad line
    /// reports every error it can; the collected errors then fail the
    /// whole parse. Incomplete constructs abort immediately so resumable
    /// callers can ask for more input.
    pub fn parse(mut self) -> Result<Script> {
        let mut commands = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        loop {
            self.stream.skip_newlines();
            if self.stream.is_at_end() {
                break;
            }
            match self.parse_statement() {
                Ok(cmd) => commands.push(cmd),
                Err(e) if e.is_incomplete() => return Err(e),
                Err(e) => {
                    errors.push(e.to_string());
                    self.stream.synchronize();
                }
            }
        }

        if let Some(first) = errors.first() {
            return Err(Error::Parse(if errors.len() == 1 {
                first.clone()
            } else {
                errors.join("; ")
            }));
        }
        tracing::trace!(statements = commands.len(), "parsed program");
        Ok(Script { commands })
    }

    /// One statement: an and-or list plus its trailing `;` or `&`.
    fn parse_statement(&mut self) -> Result<Command> {
        let mut cmd = self.parse_and_or()?;
        if self.stream.match_operator("&") {
            set_background(&mut cmd);
        } else {
            self.stream.match_operator(";");
        }
        Ok(cmd)
    }

    /// A sequence of statements ending at one of the given keywords or
    /// operators. Hitting end of input first is an incomplete parse.
    fn parse_sequence(&mut self, end: SequenceEnd<'_>) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        loop {
            self.stream.skip_newlines();
            if self.at_sequence_end(&end) {
                break;
            }
            if self.stream.is_at_end() {
                // The closing keyword is listed last (`fi` after `elif`).
                let wanted = end
                    .keywords
                    .last()
                    .or_else(|| end.operators.last())
                    .copied()
                    .unwrap_or(";");
                return Err(Error::Incomplete(format!("expected '{wanted}'")));
            }
            commands.push(self.parse_statement()?);
        }
        Ok(commands)
    }

    fn at_sequence_end(&self, end: &SequenceEnd<'_>) -> bool {
        end.keywords.iter().any(|kw| self.stream.at_keyword(kw))
            || end.operators.iter().any(|op| self.stream.at_operator(op))
    }

    /// and_or := pipeline (('&&' | '||') pipeline)*
    fn parse_and_or(&mut self) -> Result<Command> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();

        loop {
            let op = if self.stream.match_operator("&&") {
                ListOperator::And
            } else if self.stream.match_operator("||") {
                ListOperator::Or
            } else {
                break;
            };
            self.stream.skip_newlines();
            if self.stream.is_at_end() {
                return Err(Error::Incomplete("expected a command after '&&' or '||'".into()));
            }
            rest.push((op, self.parse_pipeline()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Command::List(CommandList { first: Box::new(first), rest }))
        }
    }

    /// pipeline := ['!'] command ('|' command)*
    fn parse_pipeline(&mut self) -> Result<Command> {
        let negated = self.stream.match_keyword("!");
        let mut commands = vec![self.parse_command()?];

        loop {
            let stderr_too = if self.stream.match_operator("|&") {
                true
            } else if self.stream.match_operator("|") {
                false
            } else {
                break;
            };
            if stderr_too {
                // `a |& b` is shorthand for `a 2>&1 | b`.
                if let Some(Command::Simple(prev)) = commands.last_mut() {
                    prev.redirects.push(Redirect {
                        fd: Some(2),
                        kind: RedirectKind::DupOutput,
                        target: Word::literal("1"),
                    });
                }
            }
            self.stream.skip_newlines();
            if self.stream.is_at_end() {
                return Err(Error::Incomplete("expected a command after '|'".into()));
            }
            commands.push(self.parse_command()?);
        }

        if !negated && commands.len() == 1 {
            Ok(commands.pop().expect("one command"))
        } else {
            Ok(Command::Pipeline(Pipeline { negated, background: false, commands }))
        }
    }

    /// One pipeline element: a compound command, function definition, or
    /// simple command. Reserved words are promoted to keywords only here,
    /// in command position.
    fn parse_command(&mut self) -> Result<Command> {
        let tok = self.stream.peek();
        if tok.is_keyword("if") {
            return self.parse_if();
        }
        if tok.is_keyword("while") {
            return self.parse_loop(false);
        }
        if tok.is_keyword("until") {
            return self.parse_loop(true);
        }
        if tok.is_keyword("for") {
            return self.parse_for();
        }
        if tok.is_keyword("case") {
            return self.parse_case();
        }
        if tok.is_keyword("{") {
            return self.parse_brace_group();
        }
        if tok.is_keyword("function") {
            return self.parse_function_keyword();
        }
        if tok.is_operator("(") {
            return self.parse_subshell();
        }
        self.parse_simple_command()
    }

    fn parse_if(&mut self) -> Result<Command> {
        self.stream.expect_keyword("if")?;
        let condition = self.parse_clause(SequenceEnd { keywords: &["then"], operators: &[] }, "if")?;
        self.stream.expect_keyword("then")?;
        let then_branch = self.parse_clause(
            SequenceEnd { keywords: &["elif", "else", "fi"], operators: &[] },
            "then",
        )?;

        let mut elif_branches = Vec::new();
        while self.stream.match_keyword("elif") {
            let cond =
                self.parse_clause(SequenceEnd { keywords: &["then"], operators: &[] }, "elif")?;
            self.stream.expect_keyword("then")?;
            let branch = self.parse_clause(
                SequenceEnd { keywords: &["elif", "else", "fi"], operators: &[] },
                "then",
            )?;
            elif_branches.push((cond, branch));
        }

        let else_branch = if self.stream.match_keyword("else") {
            Some(self.parse_clause(SequenceEnd { keywords: &["fi"], operators: &[] }, "else")?)
        } else {
            None
        };

        self.stream.expect_keyword("fi")?;
        Ok(Command::Compound(CompoundCommand::If(IfCommand {
            condition,
            then_branch,
            elif_branches,
            else_branch,
        })))
    }

    fn parse_loop(&mut self, until: bool) -> Result<Command> {
        self.stream.expect_keyword(if until { "until" } else { "while" })?;
        let condition = self.parse_clause(
            SequenceEnd { keywords: &["do"], operators: &[] },
            if until { "until" } else { "while" },
        )?;
        self.stream.expect_keyword("do")?;
        let body = self.parse_clause(SequenceEnd { keywords: &["done"], operators: &[] }, "do")?;
        self.stream.expect_keyword("done")?;

        Ok(Command::Compound(if until {
            CompoundCommand::Until(UntilCommand { condition, body })
        } else {
            CompoundCommand::While(WhileCommand { condition, body })
        }))
    }

    fn parse_for(&mut self) -> Result<Command> {
        self.stream.expect_keyword("for")?;
        let name_tok = self.stream.expect_word()?;
        if !is_identifier(&name_tok.value) {
            return Err(Error::Parse(format!(
                "invalid loop variable '{}' at {}",
                name_tok.value, name_tok.position
            )));
        }

        // After `in`, every token is a plain word until the separator;
        // an absent word list iterates the positional parameters.
        let words = if self.stream.match_keyword("in") {
            let mut words = Vec::new();
            while self.stream.at_word() {
                let tok = self.stream.consume();
                words.push(Word::new(tok.lexeme, tok.quoting));
            }
            Some(words)
        } else {
            None
        };

        self.stream.match_operator(";");
        self.stream.skip_newlines();
        self.stream.expect_keyword("do")?;
        let body = self.parse_clause(SequenceEnd { keywords: &["done"], operators: &[] }, "do")?;
        self.stream.expect_keyword("done")?;

        Ok(Command::Compound(CompoundCommand::For(ForCommand {
            variable: name_tok.value,
            words,
            body,
        })))
    }

    fn parse_case(&mut self) -> Result<Command> {
        self.stream.expect_keyword("case")?;
        let subject_tok = self.stream.expect_word()?;
        let subject = Word::new(subject_tok.lexeme, subject_tok.quoting);
        self.stream.skip_newlines();
        self.stream.expect_keyword("in")?;
        self.stream.skip_newlines();

        let mut items = Vec::new();
        loop {
            if self.stream.is_at_end() {
                return Err(Error::Incomplete("expected 'esac'".into()));
            }
            if self.stream.match_keyword("esac") {
                break;
            }

            self.stream.match_operator("(");
            let mut patterns = Vec::new();
            loop {
                let tok = self.stream.expect_word()?;
                patterns.push(Word::new(tok.lexeme, tok.quoting));
                if !self.stream.match_operator("|") {
                    break;
                }
            }
            self.stream.expect_operator(")")?;
            self.stream.skip_newlines();

            let commands = self.parse_sequence(SequenceEnd {
                keywords: &["esac"],
                operators: &[";;"],
            })?;
            if self.stream.match_operator(";;") {
                self.stream.skip_newlines();
            }
            items.push(CaseItem { patterns, commands });
        }

        Ok(Command::Compound(CompoundCommand::Case(CaseCommand { subject, items })))
    }

    fn parse_brace_group(&mut self) -> Result<Command> {
        self.stream.expect_keyword("{")?;
        let commands =
            self.parse_clause(SequenceEnd { keywords: &["}"], operators: &[] }, "{")?;
        self.stream.expect_keyword("}")?;
        Ok(Command::Compound(CompoundCommand::BraceGroup(commands)))
    }

    fn parse_subshell(&mut self) -> Result<Command> {
        self.stream.expect_operator("(")?;
        let commands =
            self.parse_clause(SequenceEnd { keywords: &[], operators: &[")"] }, "(")?;
        self.stream.expect_operator(")")?;
        Ok(Command::Compound(CompoundCommand::Subshell(commands)))
    }

    /// A sequence that the grammar forbids to be empty.
    fn parse_clause(&mut self, end: SequenceEnd<'_>, context: &str) -> Result<Vec<Command>> {
        let commands = self.parse_sequence(end)?;
        if commands.is_empty() {
            return Err(self.stream.unexpected(&format!("empty body in '{context}'")));
        }
        Ok(commands)
    }

    /// `function name [()] compound_command`
    fn parse_function_keyword(&mut self) -> Result<Command> {
        self.stream.expect_keyword("function")?;
        let name_tok = self.stream.expect_word()?;
        if !is_identifier(&name_tok.value) {
            return Err(Error::Parse(format!(
                "invalid function name '{}' at {}",
                name_tok.value, name_tok.position
            )));
        }
        if self.stream.match_operator("(") {
            self.stream.expect_operator(")")?;
        }
        self.stream.skip_newlines();
        let body = self.parse_function_body()?;
        Ok(Command::Function(FunctionDef { name: name_tok.value, body: Arc::new(body) }))
    }

    fn parse_function_body(&mut self) -> Result<Command> {
        if self.stream.is_at_end() {
            return Err(Error::Incomplete("expected a function body".into()));
        }
        let body = self.parse_command()?;
        match body {
            Command::Compound(_) => Ok(body),
            _ => Err(Error::Parse("a function body must be a compound command".into())),
        }
    }

    /// `name ( )` with a compound body defines a function even without
    /// the `function` keyword.
    fn try_parse_function_def(&mut self) -> Result<Option<Command>> {
        let is_candidate = self.stream.at_word()
            && is_identifier(&self.stream.peek().value)
            && self.stream.peek_at(1).is_some_and(|t| t.is_operator("("))
            && self.stream.peek_at(2).is_some_and(|t| t.is_operator(")"));
        if !is_candidate {
            return Ok(None);
        }

        let saved = self.stream.save();
        let name_tok = self.stream.consume();
        self.stream.consume();
        self.stream.consume();
        self.stream.skip_newlines();

        let starts_compound = self.stream.at_operator("(")
            || COMPOUND_STARTS.iter().any(|kw| self.stream.at_keyword(kw));
        if !starts_compound {
            if self.stream.is_at_end() {
                return Err(Error::Incomplete("expected a function body".into()));
            }
            self.stream.restore(saved);
            return Ok(None);
        }

        let body = self.parse_function_body()?;
        Ok(Some(Command::Function(FunctionDef {
            name: name_tok.value,
            body: Arc::new(body),
        })))
    }

    /// simple_command := assignments? word (word | redirection)* | assignments
    fn parse_simple_command(&mut self) -> Result<Command> {
        if let Some(def) = self.try_parse_function_def()? {
            return Ok(def);
        }

        let mut assignments = Vec::new();
        let mut name: Option<Word> = None;
        let mut args = Vec::new();
        let mut redirects = Vec::new();

        loop {
            if let Some(redirect) = self.parse_redirect()? {
                redirects.push(redirect);
                continue;
            }
            if !self.stream.at_word() {
                break;
            }
            let tok = self.stream.consume();
            if name.is_none() {
                if let Some(assignment) = split_assignment(&tok) {
                    assignments.push(assignment);
                    continue;
                }
            }
            let word = Word::new(tok.lexeme, tok.quoting);
            if name.is_none() {
                name = Some(word);
            } else {
                args.push(word);
            }
        }

        if name.is_none() && assignments.is_empty() && redirects.is_empty() {
            return Err(self.stream.unexpected("expected a command"));
        }

        Ok(Command::Simple(SimpleCommand { name, args, redirects, assignments }))
    }

    /// Recognize a redirection operator and consume its target word.
    fn parse_redirect(&mut self) -> Result<Option<Redirect>> {
        let tok = self.stream.peek();
        if tok.kind != TokenKind::Operator {
            return Ok(None);
        }

        let value = tok.value.clone();
        let (fd, op) = if value.starts_with(|c: char| c.is_ascii_digit()) {
            let fd: i32 = value[..1].parse().expect("single digit fd");
            (Some(fd), &value[1..])
        } else {
            (None, value.as_str())
        };

        let kind = match op {
            ">" => RedirectKind::Output,
            ">>" => RedirectKind::Append,
            "<" => RedirectKind::Input,
            ">&" => RedirectKind::DupOutput,
            "<&" => RedirectKind::DupInput,
            "&>" => RedirectKind::OutputBoth,
            "<<" => {
                return Err(Error::Parse(format!(
                    "here-documents are not supported at {}",
                    tok.position
                )))
            }
            _ => return Ok(None),
        };

        self.stream.consume();
        let target_tok = self.stream.expect_word()?;
        Ok(Some(Redirect {
            fd,
            kind,
            target: Word::new(target_tok.lexeme, target_tok.quoting),
        }))
    }
}

/// Mark a parsed statement as a background job.
fn set_background(cmd: &mut Command) {
    match cmd {
        Command::Pipeline(p) => p.background = true,
        Command::List(l) => {
            // `a && b &` backgrounds the final pipeline of the list.
            if let Some((_, last)) = l.rest.last_mut() {
                set_background(last);
            } else {
                set_background(l.first.as_mut());
            }
        }
        other => {
            let inner = std::mem::replace(
                other,
                Command::Compound(CompoundCommand::BraceGroup(Vec::new())),
            );
            *other = Command::Pipeline(Pipeline {
                negated: false,
                background: true,
                commands: vec![inner],
            });
        }
    }
}

/// `NAME=value` words become assignments when they prefix a command.
fn split_assignment(tok: &Token) -> Option<Assignment> {
    let eq = tok.lexeme.find('=')?;
    let name = &tok.lexeme[..eq];
    if !is_identifier(name) {
        return None;
    }
    Some(Assignment {
        name: name.to_string(),
        value: Word::new(&tok.lexeme[eq + 1..], tok.quoting),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a complete program in single-shot mode.
pub fn parse(input: &str) -> Result<Script> {
    Parser::new(input)?.parse()
}

/// Outcome of feeding one chunk to a resumable parse.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Every construct closed; the accumulated program parsed.
    Complete(Script),
    /// A construct is still open; feed another chunk.
    NeedsMore,
}

/// Resumable parser state for interactive multi-line input.
///
/// Each fed chunk is appended to the accumulated buffer and the whole
/// buffer re-parsed; open constructs (an `if` awaiting `fi`, an
/// unterminated quote, a trailing `&&` or line continuation) report
/// `NeedsMore` and keep the buffer. By construction the accumulated
/// parse equals a single-shot parse of the concatenated chunks.
#[derive(Debug, Default)]
pub struct ParseSession {
    buffer: String,
    pending: Option<String>,
}

impl ParseSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk (typically a line without its newline).
    pub fn feed_line(&mut self, line: &str) -> Result<ParseOutcome> {
        self.buffer.push_str(line);
        self.buffer.push('\n');

        match Parser::new(&self.buffer).and_then(Parser::parse) {
            Ok(script) => {
                self.buffer.clear();
                self.pending = None;
                Ok(ParseOutcome::Complete(script))
            }
            Err(Error::Incomplete(what)) => {
                tracing::debug!(open = %what, "awaiting more input");
                self.pending = Some(what);
                Ok(ParseOutcome::NeedsMore)
            }
            Err(e) => {
                self.buffer.clear();
                self.pending = None;
                Err(e)
            }
        }
    }

    /// What construct is still open, for continuation prompts.
    pub fn pending_construct(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// True when a previous chunk left a construct open.
    pub fn needs_more(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Discard accumulated input (e.g. on interrupt).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending = None;
    }
}

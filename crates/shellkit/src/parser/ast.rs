//! AST types for parsed shell programs
//!
//! Nodes are immutable after construction and may be executed repeatedly
//! (loop bodies, function bodies). Function bodies are shared through
//! reference counting. `Display` renders a canonical source form that
//! re-parses to an isomorphic tree.

use std::fmt;
use std::sync::Arc;

use super::tokens::Quoting;

/// A complete parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub commands: Vec<Command>,
}

/// A word awaiting expansion.
///
/// The raw text keeps its quotes so the expander can apply per-segment
/// rules; the quoting tag decides splitting and globbing context.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub raw: String,
    pub quoting: Quoting,
}

impl Word {
    pub fn new(raw: impl Into<String>, quoting: Quoting) -> Self {
        Self { raw: raw.into(), quoting }
    }

    /// An unquoted literal word.
    pub fn literal(raw: impl Into<String>) -> Self {
        Self::new(raw, Quoting::Unquoted)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A single command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A simple command (`echo hello`)
    Simple(SimpleCommand),
    /// A pipeline (`ls | wc -l`), possibly negated or backgrounded
    Pipeline(Pipeline),
    /// An and-or list (`a && b || c`)
    List(CommandList),
    /// A compound command (if, for, while, until, case, group, subshell)
    Compound(CompoundCommand),
    /// A function definition
    Function(FunctionDef),
}

/// A simple command with arguments, redirections, and assignment prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommand {
    /// Command name; `None` for an assignment-only statement.
    pub name: Option<Word>,
    pub args: Vec<Word>,
    /// Redirections in source order (`>f 2>&1` differs from `2>&1 >f`).
    pub redirects: Vec<Redirect>,
    pub assignments: Vec<Assignment>,
}

/// A pipeline of commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// `!` prefix inverting the final exit status
    pub negated: bool,
    /// `&` suffix releasing the pipeline to the background
    pub background: bool,
    pub commands: Vec<Command>,
}

/// An and-or list: left-associative with short-circuit semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandList {
    pub first: Box<Command>,
    pub rest: Vec<(ListOperator, Command)>,
}

/// Connectors inside an and-or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOperator {
    /// `&&` - run next only if the previous succeeded
    And,
    /// `||` - run next only if the previous failed
    Or,
}

/// Compound commands (control structures).
#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommand {
    If(IfCommand),
    For(ForCommand),
    While(WhileCommand),
    Until(UntilCommand),
    Case(CaseCommand),
    /// Commands run in a forked variable environment
    Subshell(Vec<Command>),
    /// Commands grouped in the current environment
    BraceGroup(Vec<Command>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfCommand {
    pub condition: Vec<Command>,
    pub then_branch: Vec<Command>,
    pub elif_branches: Vec<(Vec<Command>, Vec<Command>)>,
    pub else_branch: Option<Vec<Command>>,
}

/// For loop. `words: None` iterates the positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForCommand {
    pub variable: String,
    pub words: Option<Vec<Word>>,
    pub body: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileCommand {
    pub condition: Vec<Command>,
    pub body: Vec<Command>,
}

/// Until loop: runs while the condition fails.
#[derive(Debug, Clone, PartialEq)]
pub struct UntilCommand {
    pub condition: Vec<Command>,
    pub body: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseCommand {
    pub subject: Word,
    pub items: Vec<CaseItem>,
}

/// One `pattern [| pattern]... ) commands ;;` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub patterns: Vec<Word>,
    pub commands: Vec<Command>,
}

/// Function definition. The body is shared by every invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Arc<Command>,
}

/// I/O redirection.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    /// Explicit fd prefix; the operator supplies the default.
    pub fd: Option<i32>,
    pub kind: RedirectKind,
    pub target: Word,
}

impl Redirect {
    /// File descriptor this redirection applies to.
    pub fn effective_fd(&self) -> i32 {
        self.fd.unwrap_or(match self.kind {
            RedirectKind::Input | RedirectKind::DupInput => 0,
            _ => 1,
        })
    }
}

/// Kinds of redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>` - write
    Output,
    /// `>>` - append
    Append,
    /// `<` - read
    Input,
    /// `>&` - duplicate an output descriptor
    DupOutput,
    /// `<&` - duplicate an input descriptor
    DupInput,
    /// `&>` - write both stdout and stderr
    OutputBoth,
}

impl RedirectKind {
    fn symbol(&self) -> &'static str {
        match self {
            RedirectKind::Output => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Input => "<",
            RedirectKind::DupOutput => ">&",
            RedirectKind::DupInput => "<&",
            RedirectKind::OutputBoth => "&>",
        }
    }
}

/// Variable assignment, either standalone or prefixing a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

fn write_sequence(f: &mut fmt::Formatter<'_>, commands: &[Command]) -> fmt::Result {
    for (i, cmd) in commands.iter().enumerate() {
        if i > 0 {
            if ends_in_background(&commands[i - 1]) {
                f.write_str(" ")?;
            } else {
                f.write_str("; ")?;
            }
        }
        write!(f, "{cmd}")?;
    }
    Ok(())
}

fn ends_in_background(cmd: &Command) -> bool {
    match cmd {
        Command::Pipeline(p) => p.background,
        Command::List(l) => {
            let last = l.rest.last().map(|(_, c)| c).unwrap_or(&l.first);
            ends_in_background(last)
        }
        _ => false,
    }
}

// The canonical form uses `;` separators and single spaces throughout so
// print-then-reparse yields an isomorphic tree.
impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sequence(f, &self.commands)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Simple(c) => write!(f, "{c}"),
            Command::Pipeline(p) => write!(f, "{p}"),
            Command::List(l) => write!(f, "{l}"),
            Command::Compound(c) => write!(f, "{c}"),
            Command::Function(d) => write!(f, "{d}"),
        }
    }
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for a in &self.assignments {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", a.name, a.value)?;
            first = false;
        }
        if let Some(name) = &self.name {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        for arg in &self.args {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{arg}")?;
            first = false;
        }
        for r in &self.redirects {
            if !first {
                f.write_str(" ")?;
            }
            if let Some(fd) = r.fd {
                write!(f, "{fd}")?;
            }
            write!(f, "{}{}", r.kind.symbol(), r.target)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("! ")?;
        }
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{cmd}")?;
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, cmd) in &self.rest {
            let sep = match op {
                ListOperator::And => " && ",
                ListOperator::Or => " || ",
            };
            f.write_str(sep)?;
            write!(f, "{cmd}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CompoundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompoundCommand::If(c) => write!(f, "{c}"),
            CompoundCommand::For(c) => write!(f, "{c}"),
            CompoundCommand::While(c) => write!(f, "{c}"),
            CompoundCommand::Until(c) => write!(f, "{c}"),
            CompoundCommand::Case(c) => write!(f, "{c}"),
            CompoundCommand::Subshell(cmds) => {
                f.write_str("(")?;
                write_sequence(f, cmds)?;
                f.write_str(")")
            }
            CompoundCommand::BraceGroup(cmds) => {
                f.write_str("{ ")?;
                write_sequence(f, cmds)?;
                f.write_str("; }")
            }
        }
    }
}

impl fmt::Display for IfCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("if ")?;
        write_sequence(f, &self.condition)?;
        f.write_str("; then ")?;
        write_sequence(f, &self.then_branch)?;
        for (cond, branch) in &self.elif_branches {
            f.write_str("; elif ")?;
            write_sequence(f, cond)?;
            f.write_str("; then ")?;
            write_sequence(f, branch)?;
        }
        if let Some(els) = &self.else_branch {
            f.write_str("; else ")?;
            write_sequence(f, els)?;
        }
        f.write_str("; fi")
    }
}

impl fmt::Display for ForCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "for {}", self.variable)?;
        if let Some(words) = &self.words {
            f.write_str(" in")?;
            for w in words {
                write!(f, " {w}")?;
            }
        }
        f.write_str("; do ")?;
        write_sequence(f, &self.body)?;
        f.write_str("; done")
    }
}

impl fmt::Display for WhileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("while ")?;
        write_sequence(f, &self.condition)?;
        f.write_str("; do ")?;
        write_sequence(f, &self.body)?;
        f.write_str("; done")
    }
}

impl fmt::Display for UntilCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("until ")?;
        write_sequence(f, &self.condition)?;
        f.write_str("; do ")?;
        write_sequence(f, &self.body)?;
        f.write_str("; done")
    }
}

impl fmt::Display for CaseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case {} in ", self.subject)?;
        for item in &self.items {
            for (i, p) in item.patterns.iter().enumerate() {
                if i > 0 {
                    f.write_str("|")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str(") ")?;
            write_sequence(f, &item.commands)?;
            f.write_str(";; ")?;
        }
        f.write_str("esac")
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}() {}", self.name, self.body)
    }
}

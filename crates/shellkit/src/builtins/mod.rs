//! Built-in shell commands
//!
//! The command bodies are collaborators of the core; the registry and
//! dispatch order (function, builtin, PATH) belong to the interpreter.

mod echo;
mod flow;
mod navigation;
mod test;
mod vars;

pub use echo::Echo;
pub use flow::{Break, Colon, Continue, Exit, False, Return, True};
pub use navigation::{Cd, Pwd};
pub use test::Test;
pub use vars::{Export, Set, Shift, Unset};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::interpreter::{ExecResult, ShellState};

/// Context for builtin command execution.
pub struct Context<'a> {
    /// Arguments, not including the command name.
    pub args: &'a [String],
    /// Session state the builtin may read and mutate.
    pub state: &'a mut ShellState,
    /// Data piped in from an earlier pipeline stage.
    pub stdin: Option<&'a str>,
}

/// Trait for builtin commands.
#[async_trait]
pub trait Builtin: Send + Sync {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult>;
}

/// The standard builtin table.
pub fn registry() -> HashMap<&'static str, Box<dyn Builtin>> {
    let mut table: HashMap<&'static str, Box<dyn Builtin>> = HashMap::new();
    table.insert("echo", Box::new(Echo));
    table.insert("true", Box::new(True));
    table.insert("false", Box::new(False));
    table.insert(":", Box::new(Colon));
    table.insert("exit", Box::new(Exit));
    table.insert("break", Box::new(Break));
    table.insert("continue", Box::new(Continue));
    table.insert("return", Box::new(Return));
    table.insert("cd", Box::new(Cd));
    table.insert("pwd", Box::new(Pwd));
    table.insert("export", Box::new(Export));
    table.insert("unset", Box::new(Unset));
    table.insert("shift", Box::new(Shift));
    table.insert("set", Box::new(Set));
    table.insert("test", Box::new(Test));
    table.insert("[", Box::new(Test));
    table
}

//! shellkit - an embeddable POSIX-style shell core
//!
//! Source text flows through a quote-aware lexer and a resumable
//! recursive descent parser into an AST; the interpreter walks the tree,
//! materializing words through a single-pass expansion state machine and
//! dispatching external commands through a narrow executor interface.
//!
//! # Example
//!
//! ```no_run
//! use shellkit::Shell;
//!
//! #[tokio::main]
//! async fn main() -> shellkit::Result<()> {
//!     let mut shell = Shell::new();
//!     let result = shell.exec("x=world; echo hello $x").await?;
//!     assert_eq!(result.stdout, "hello world\n");
//!     assert_eq!(result.exit_code, 0);
//!     Ok(())
//! }
//! ```

pub mod builtins;
mod error;
pub mod executor;
pub mod expand;
mod interpreter;
mod logging;
pub mod parser;

pub use error::{Error, Result};
pub use executor::{CommandExecutor, ExternalCommand, HostExecutor};
pub use interpreter::{ControlFlow, ExecResult, Interpreter, JobTable, Options, ShellState};
pub use logging::LogConfig;
pub use parser::{ParseOutcome, ParseSession, Parser, Script};

use std::sync::Arc;

/// A complete shell session: interpreter state plus a resumable parse
/// buffer for interactive use.
pub struct Shell {
    interpreter: Interpreter,
    session: ParseSession,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// A shell inheriting the process environment, running external
    /// commands on the host.
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(Arc::new(HostExecutor::new())),
            session: ParseSession::new(),
        }
    }

    /// Start configuring a customized shell.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::default()
    }

    /// Parse and execute a complete program.
    pub async fn exec(&mut self, script: &str) -> Result<ExecResult> {
        let program = parser::parse(script)?;
        self.interpreter.execute(&program).await
    }

    /// Feed one line of interactive input. Returns `None` while a
    /// construct is still open (drive the continuation prompt off this),
    /// or the result once the accumulated program runs.
    pub async fn feed_line(&mut self, line: &str) -> Result<Option<ExecResult>> {
        match self.session.feed_line(line)? {
            ParseOutcome::NeedsMore => Ok(None),
            ParseOutcome::Complete(program) => {
                Ok(Some(self.interpreter.execute(&program).await?))
            }
        }
    }

    /// True when previous input left a construct open.
    pub fn needs_more(&self) -> bool {
        self.session.needs_more()
    }

    /// What is still open, for continuation prompts.
    pub fn pending_construct(&self) -> Option<&str> {
        self.session.pending_construct()
    }

    /// Discard buffered interactive input (e.g. on interrupt).
    pub fn reset_input(&mut self) {
        self.session.reset();
    }

    /// Status of the most recently executed command.
    pub fn last_status(&self) -> i32 {
        self.interpreter.state().last_status
    }

    /// Set a shell variable.
    pub fn set_var(&mut self, name: &str, value: &str) {
        self.interpreter.state_mut().set_var(name, value);
    }

    /// Read a shell variable.
    pub fn var(&mut self, name: &str) -> Option<String> {
        self.interpreter.state_mut().get_var(name)
    }

    /// Wait for outstanding background jobs.
    pub async fn wait_background(&mut self) -> i32 {
        self.interpreter.wait_background().await
    }
}

/// Builder for customized shell configuration.
#[derive(Default)]
pub struct ShellBuilder {
    env: Vec<(String, String)>,
    inherit_env: bool,
    cwd: Option<std::path::PathBuf>,
    script_name: Option<String>,
    args: Vec<String>,
    executor: Option<Arc<dyn CommandExecutor>>,
    log_config: Option<LogConfig>,
}

impl ShellBuilder {
    /// Inherit the parent process environment (off by default; the
    /// builder starts from a clean state).
    pub fn inherit_env(mut self) -> Self {
        self.inherit_env = true;
        self
    }

    /// Set an exported variable.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl Into<std::path::PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set `$0`.
    pub fn script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = Some(name.into());
        self
    }

    /// Set the positional parameters.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Substitute the external-command executor.
    pub fn executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Configure command logging redaction.
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.log_config = Some(config);
        self
    }

    pub fn build(self) -> Shell {
        let mut state = if self.inherit_env { ShellState::new() } else { ShellState::empty() };
        for (name, value) in &self.env {
            state.set_var(name, value);
            state.export_var(name);
        }
        if let Some(cwd) = self.cwd {
            state.cwd = cwd;
        }
        if let Some(name) = self.script_name {
            state.script_name = name;
        }
        state.set_positionals(self.args);

        let executor =
            self.executor.unwrap_or_else(|| Arc::new(HostExecutor::new()) as Arc<dyn CommandExecutor>);
        let mut interpreter = Interpreter::with_state(state, executor);
        if let Some(config) = self.log_config {
            interpreter.set_log_config(config);
        }

        Shell { interpreter, session: ParseSession::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        Shell::builder().build()
    }

    #[tokio::test]
    async fn exec_runs_program() {
        let mut sh = shell();
        let result = sh.exec("echo hello").await.unwrap();
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn empty_input_succeeds() {
        let mut sh = shell();
        let result = sh.exec("").await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "");
    }

    #[tokio::test]
    async fn builder_env_is_visible_and_exported() {
        let mut sh = Shell::builder().env("GREETING", "hi").build();
        let result = sh.exec("echo $GREETING").await.unwrap();
        assert_eq!(result.stdout, "hi\n");
    }

    #[tokio::test]
    async fn builder_args_become_positionals() {
        let mut sh = Shell::builder().script_name("myscript").args(["a", "b"]).build();
        let result = sh.exec("echo $0 $1 $2 $#").await.unwrap();
        assert_eq!(result.stdout, "myscript a b 2\n");
    }

    #[tokio::test]
    async fn state_persists_between_execs() {
        let mut sh = shell();
        sh.exec("x=kept").await.unwrap();
        let result = sh.exec("echo $x").await.unwrap();
        assert_eq!(result.stdout, "kept\n");
        assert_eq!(sh.var("x").as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn feed_line_drives_multi_line_input() {
        let mut sh = shell();
        assert!(sh.feed_line("for i in 1 2; do").await.unwrap().is_none());
        assert!(sh.needs_more());
        assert!(sh.feed_line("echo $i").await.unwrap().is_none());
        let result = sh.feed_line("done").await.unwrap().expect("program should complete");
        assert_eq!(result.stdout, "1\n2\n");
        assert!(!sh.needs_more());
    }

    #[tokio::test]
    async fn reset_discards_open_construct() {
        let mut sh = shell();
        sh.feed_line("if true; then").await.unwrap();
        assert!(sh.needs_more());
        sh.reset_input();
        assert!(!sh.needs_more());
        let result = sh.feed_line("echo fresh").await.unwrap().unwrap();
        assert_eq!(result.stdout, "fresh\n");
    }

    #[tokio::test]
    async fn last_status_tracks_failures() {
        let mut sh = shell();
        sh.exec("false").await.unwrap();
        assert_eq!(sh.last_status(), 1);
        sh.exec("true").await.unwrap();
        assert_eq!(sh.last_status(), 0);
    }
}

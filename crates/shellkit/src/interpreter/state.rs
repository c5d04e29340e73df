//! Interpreter state
//!
//! `ShellState` owns everything mutable in a session: the variable
//! scope stack, the function table, the last exit status, positional
//! parameters, option flags, and the expansion caches. It is owned
//! exclusively by one interpreter; subshells run on a clone.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::parser::Command;

/// Control flow signals from break, continue, return, and exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    #[default]
    None,
    /// Break out of N enclosing loops
    Break(u32),
    /// Continue the Nth enclosing loop
    Continue(u32),
    /// Return from the current function
    Return(i32),
    /// Exit the shell
    Exit(i32),
}

/// Result of executing a command or program.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Pending control flow signal, consumed by the matching construct.
    pub control_flow: ControlFlow,
}

impl ExecResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), ..Default::default() }
    }

    /// A failed result with the given stderr.
    pub fn err(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self { stderr: stderr.into(), exit_code, ..Default::default() }
    }

    /// A result with stdout and an explicit exit code.
    pub fn with_code(stdout: impl Into<String>, exit_code: i32) -> Self {
        Self { stdout: stdout.into(), exit_code, ..Default::default() }
    }

    /// A result carrying a control flow signal.
    pub fn with_control_flow(control_flow: ControlFlow) -> Self {
        Self { control_flow, ..Default::default() }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Fold another result into this one, accumulating output and
    /// taking over its status and control flow.
    pub fn absorb(&mut self, other: ExecResult) {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
        self.exit_code = other.exit_code;
        self.control_flow = other.control_flow;
    }
}

/// A shell variable with its export flag.
#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub value: String,
    pub exported: bool,
}

/// One level of the variable scope stack.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Variable>,
}

/// Option flags toggled by `set`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// `-e`: stop on the first failing command
    pub errexit: bool,
    /// `-o pipefail`: a pipeline fails with its first failing stage
    pub pipefail: bool,
}

/// Mutable session state.
#[derive(Debug, Clone)]
pub struct ShellState {
    scopes: Vec<Scope>,
    functions: HashMap<String, Arc<Command>>,
    positional_stack: Vec<Vec<String>>,
    pub last_status: i32,
    /// `$0`
    pub script_name: String,
    pub options: Options,
    pub cwd: PathBuf,
    /// `$!`
    pub last_bg_pid: Option<u32>,
    var_cache: HashMap<String, String>,
    expr_cache: HashMap<String, String>,
}

impl ShellState {
    /// A state inheriting the process environment as exported globals.
    pub fn new() -> Self {
        let mut state = Self::empty();
        for (name, value) in std::env::vars() {
            state.scopes[0].vars.insert(name, Variable { value, exported: true });
        }
        if let Ok(cwd) = std::env::current_dir() {
            state.cwd = cwd;
        }
        state
    }

    /// A state with no inherited environment, for embedding and tests.
    pub fn empty() -> Self {
        Self {
            scopes: vec![Scope::default()],
            functions: HashMap::new(),
            positional_stack: vec![Vec::new()],
            last_status: 0,
            script_name: "shellkit".to_string(),
            options: Options::default(),
            cwd: PathBuf::from("/"),
            last_bg_pid: None,
            var_cache: HashMap::new(),
            expr_cache: HashMap::new(),
        }
    }

    /// Read a variable through the scope chain, memoizing the resolved
    /// value until the next write.
    pub fn get_var(&mut self, name: &str) -> Option<String> {
        if let Some(value) = self.var_cache.get(name) {
            return Some(value.clone());
        }
        let found = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name).map(|v| v.value.clone()))?;
        self.var_cache.insert(name.to_string(), found.clone());
        Some(found)
    }

    /// Set a variable in the top scope. Every write invalidates the
    /// expansion caches.
    pub fn set_var(&mut self, name: &str, value: &str) {
        self.invalidate_caches();
        let top = self.scopes.last_mut().expect("scope stack is never empty");
        let exported = top.vars.get(name).map(|v| v.exported).unwrap_or(false);
        top.vars.insert(name.to_string(), Variable { value: value.to_string(), exported });
    }

    /// Mark a variable for inheritance by child processes, creating it
    /// empty when absent.
    pub fn export_var(&mut self, name: &str) {
        self.invalidate_caches();
        for scope in self.scopes.iter_mut().rev() {
            if let Some(var) = scope.vars.get_mut(name) {
                var.exported = true;
                return;
            }
        }
        let top = self.scopes.last_mut().expect("scope stack is never empty");
        top.vars.insert(name.to_string(), Variable { value: String::new(), exported: true });
    }

    /// Remove a variable from the nearest scope defining it.
    pub fn unset_var(&mut self, name: &str) {
        self.invalidate_caches();
        for scope in self.scopes.iter_mut().rev() {
            if scope.vars.remove(name).is_some() {
                return;
            }
        }
    }

    /// Exported variables visible to child processes; inner scopes win.
    pub fn env_for_child(&self) -> Vec<(String, String)> {
        let mut env: HashMap<&str, &str> = HashMap::new();
        for scope in &self.scopes {
            for (name, var) in &scope.vars {
                if var.exported {
                    env.insert(name, &var.value);
                }
            }
        }
        env.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    pub fn push_scope(&mut self) {
        self.invalidate_caches();
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.invalidate_caches();
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn define_function(&mut self, name: &str, body: Arc<Command>) {
        self.functions.insert(name.to_string(), body);
    }

    pub fn function(&self, name: &str) -> Option<Arc<Command>> {
        self.functions.get(name).cloned()
    }

    pub fn positionals(&self) -> &[String] {
        self.positional_stack.last().expect("positional stack is never empty")
    }

    pub fn set_positionals(&mut self, args: Vec<String>) {
        *self.positional_stack.last_mut().expect("positional stack is never empty") = args;
    }

    pub fn push_positionals(&mut self, args: Vec<String>) {
        self.positional_stack.push(args);
    }

    pub fn pop_positionals(&mut self) {
        if self.positional_stack.len() > 1 {
            self.positional_stack.pop();
        }
    }

    /// Drop the first `n` positional parameters; false when there are
    /// fewer than `n`.
    pub fn shift_positionals(&mut self, n: usize) -> bool {
        let positionals =
            self.positional_stack.last_mut().expect("positional stack is never empty");
        if n > positionals.len() {
            return false;
        }
        positionals.drain(..n);
        true
    }

    /// `$-` option flag letters.
    pub fn option_flags(&self) -> String {
        let mut flags = String::new();
        if self.options.errexit {
            flags.push('e');
        }
        flags
    }

    pub fn cached_expr(&self, expr: &str) -> Option<String> {
        self.expr_cache.get(expr).cloned()
    }

    pub fn store_expr(&mut self, expr: &str, result: &str) {
        self.expr_cache.insert(expr.to_string(), result.to_string());
    }

    fn invalidate_caches(&mut self) {
        self.var_cache.clear();
        self.expr_cache.clear();
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

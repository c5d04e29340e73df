//! Interpreter for executing parsed programs
//!
//! Walks the AST dispatching on node kind. Every visit yields an
//! `ExecResult`; `$?` is updated after each executed node. Words are
//! materialized through the expander at the moment a node needs argv
//! strings, loop iterands, case subjects, or redirection targets.

mod jobs;
mod state;

pub use jobs::JobTable;
pub use state::{ControlFlow, ExecResult, Options, Scope, ShellState, Variable};

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::builtins::{self, Builtin};
use crate::error::{Error, Result};
use crate::executor::{self, CommandExecutor, ExternalCommand, ResolvedRedirect};
use crate::expand::{Expander, ExpansionHost};
use crate::logging::LogConfig;
use crate::parser::{
    self, CaseCommand, Command, CommandList, CompoundCommand, ForCommand, IfCommand,
    ListOperator, Pipeline, Redirect, Script, SimpleCommand, Word,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Tree-walking executor for one shell session.
pub struct Interpreter {
    state: ShellState,
    builtins: HashMap<&'static str, Box<dyn Builtin>>,
    executor: Arc<dyn CommandExecutor>,
    jobs: JobTable,
    log_config: LogConfig,
}

impl Interpreter {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self::with_state(ShellState::new(), executor)
    }

    pub fn with_state(state: ShellState, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            state,
            builtins: builtins::registry(),
            executor,
            jobs: JobTable::new(),
            log_config: LogConfig::default(),
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ShellState {
        &mut self.state
    }

    pub fn set_log_config(&mut self, config: LogConfig) {
        self.log_config = config;
    }

    /// Wait for all background jobs; returns the last collected status.
    pub async fn wait_background(&mut self) -> i32 {
        self.jobs.wait_all().await
    }

    /// Execute a whole program. Runtime failures (expansion errors,
    /// unknown commands) abort the failing top-level command but not the
    /// program, unless `-e` is in effect.
    pub async fn execute(&mut self, script: &Script) -> Result<ExecResult> {
        let mut total = ExecResult::default();

        for command in &script.commands {
            match self.execute_command(command).await {
                Ok(result) => {
                    self.state.last_status = result.exit_code;
                    total.absorb(result);
                    match total.control_flow {
                        ControlFlow::Exit(code) => {
                            total.exit_code = code;
                            self.state.last_status = code;
                            return Ok(total);
                        }
                        ControlFlow::None => {}
                        _ => {
                            // A stray break/continue/return outside its
                            // construct is consumed at top level.
                            total.control_flow = ControlFlow::None;
                        }
                    }
                }
                Err(e) if is_recoverable(&e) => {
                    total.stderr.push_str(&format!("shellkit: {e}\n"));
                    total.exit_code = e.exit_status();
                    self.state.last_status = total.exit_code;
                }
                Err(e) => return Err(e),
            }

            if self.state.options.errexit && total.exit_code != 0 {
                return Ok(total);
            }
        }

        Ok(total)
    }

    fn execute_command<'a>(&'a mut self, command: &'a Command) -> BoxFuture<'a, Result<ExecResult>> {
        Box::pin(async move {
            match command {
                Command::Simple(simple) => self.execute_simple(simple, None).await,
                Command::Pipeline(pipeline) => self.execute_pipeline(pipeline).await,
                Command::List(list) => self.execute_list(list).await,
                Command::Compound(compound) => self.execute_compound(compound).await,
                Command::Function(def) => {
                    self.state.define_function(&def.name, Arc::clone(&def.body));
                    Ok(ExecResult::ok(""))
                }
            }
        })
    }

    /// Run a statement sequence, stopping at the first control flow
    /// signal.
    async fn execute_sequence(&mut self, commands: &[Command]) -> Result<ExecResult> {
        let mut total = ExecResult::default();
        for command in commands {
            let result = self.execute_command(command).await?;
            self.state.last_status = result.exit_code;
            total.absorb(result);
            if total.control_flow != ControlFlow::None {
                break;
            }
        }
        Ok(total)
    }

    /// And-or list with left-associative short-circuit.
    async fn execute_list(&mut self, list: &CommandList) -> Result<ExecResult> {
        let mut total = self.execute_command(&list.first).await?;
        self.state.last_status = total.exit_code;
        if total.control_flow != ControlFlow::None {
            return Ok(total);
        }

        for (op, command) in &list.rest {
            let run = match op {
                ListOperator::And => total.exit_code == 0,
                ListOperator::Or => total.exit_code != 0,
            };
            if !run {
                continue;
            }
            let result = self.execute_command(command).await?;
            self.state.last_status = result.exit_code;
            total.absorb(result);
            if total.control_flow != ControlFlow::None {
                break;
            }
        }
        Ok(total)
    }

    /// Run pipeline stages, feeding each stage's stdout to the next
    /// stage's stdin. The pipeline status is the last stage's status
    /// (or the first failure under `pipefail`); `!` inverts it.
    async fn execute_pipeline(&mut self, pipeline: &Pipeline) -> Result<ExecResult> {
        if pipeline.background {
            return self.launch_background(pipeline).await;
        }

        let last = pipeline.commands.len() - 1;
        let mut stdin: Option<String> = None;
        let mut statuses = Vec::with_capacity(pipeline.commands.len());
        let mut result = ExecResult::default();

        for (i, stage) in pipeline.commands.iter().enumerate() {
            let stage_result = match stage {
                Command::Simple(simple) => self.execute_simple(simple, stdin.take()).await?,
                other => self.execute_command(other).await?,
            };
            statuses.push(stage_result.exit_code);
            result.stderr.push_str(&stage_result.stderr);

            if i == last {
                result.stdout.push_str(&stage_result.stdout);
                result.exit_code = stage_result.exit_code;
                result.control_flow = stage_result.control_flow;
            } else {
                stdin = Some(stage_result.stdout);
            }
        }

        if self.state.options.pipefail {
            if let Some(failed) = statuses.iter().find(|s| **s != 0) {
                result.exit_code = *failed;
            }
        }
        if pipeline.negated {
            result.exit_code = if result.exit_code == 0 { 1 } else { 0 };
        }
        self.state.last_status = result.exit_code;
        Ok(result)
    }

    /// `&`: a single external command detaches as a real OS job; builtin
    /// and compound pipelines complete before control returns. Either
    /// way the foreground status is 0.
    async fn launch_background(&mut self, pipeline: &Pipeline) -> Result<ExecResult> {
        if let [Command::Simple(simple)] = pipeline.commands.as_slice() {
            if let Some(argv) = self.external_argv(simple).await? {
                let redirects = self.resolve_redirects(&simple.redirects).await?;
                let env = self.child_env(&simple.assignments).await?;
                let job = self
                    .executor
                    .spawn_background(ExternalCommand {
                        argv,
                        env,
                        redirects,
                        stdin: None,
                        cwd: self.state.cwd.clone(),
                    })
                    .await?;
                tracing::debug!(pid = job.pid, "launched background job");
                self.state.last_bg_pid = Some(job.pid);
                self.jobs.register(job.pid, job.status);
                self.state.last_status = 0;
                return Ok(ExecResult::ok(""));
            }
        }

        let inline = Command::Pipeline(Pipeline {
            negated: pipeline.negated,
            background: false,
            commands: pipeline.commands.clone(),
        });
        let mut result = self.execute_command(&inline).await?;
        result.exit_code = 0;
        result.control_flow = ControlFlow::None;
        self.state.last_status = 0;
        Ok(result)
    }

    /// Expanded argv when the command resolves to an external program.
    async fn external_argv(&mut self, simple: &SimpleCommand) -> Result<Option<Vec<String>>> {
        let Some(name_word) = &simple.name else {
            return Ok(None);
        };
        let mut argv = self.expand_fields_of(name_word).await?;
        for arg in &simple.args {
            argv.extend(self.expand_fields_of(arg).await?);
        }
        match argv.first() {
            Some(name)
                if self.state.function(name).is_none()
                    && !self.builtins.contains_key(name.as_str()) =>
            {
                Ok(Some(argv))
            }
            _ => Ok(None),
        }
    }

    async fn execute_compound(&mut self, compound: &CompoundCommand) -> Result<ExecResult> {
        match compound {
            CompoundCommand::If(if_cmd) => self.execute_if(if_cmd).await,
            CompoundCommand::While(w) => self.execute_loop(&w.condition, &w.body, false).await,
            CompoundCommand::Until(u) => self.execute_loop(&u.condition, &u.body, true).await,
            CompoundCommand::For(for_cmd) => self.execute_for(for_cmd).await,
            CompoundCommand::Case(case_cmd) => self.execute_case(case_cmd).await,
            CompoundCommand::BraceGroup(commands) => self.execute_sequence(commands).await,
            CompoundCommand::Subshell(commands) => self.execute_subshell(commands).await,
        }
    }

    async fn execute_if(&mut self, if_cmd: &IfCommand) -> Result<ExecResult> {
        let mut total = ExecResult::default();

        let cond = self.execute_sequence(&if_cmd.condition).await?;
        let cond_code = cond.exit_code;
        total.absorb(cond);
        if total.control_flow != ControlFlow::None {
            return Ok(total);
        }
        if cond_code == 0 {
            let branch = self.execute_sequence(&if_cmd.then_branch).await?;
            total.absorb(branch);
            return Ok(total);
        }

        for (elif_cond, elif_branch) in &if_cmd.elif_branches {
            let cond = self.execute_sequence(elif_cond).await?;
            let cond_code = cond.exit_code;
            total.absorb(cond);
            if total.control_flow != ControlFlow::None {
                return Ok(total);
            }
            if cond_code == 0 {
                let branch = self.execute_sequence(elif_branch).await?;
                total.absorb(branch);
                return Ok(total);
            }
        }

        if let Some(else_branch) = &if_cmd.else_branch {
            let branch = self.execute_sequence(else_branch).await?;
            total.absorb(branch);
            return Ok(total);
        }

        // No branch taken.
        total.exit_code = 0;
        Ok(total)
    }

    /// Shared body of while (`until = false`) and until loops.
    async fn execute_loop(
        &mut self,
        condition: &[Command],
        body: &[Command],
        until: bool,
    ) -> Result<ExecResult> {
        let mut total = ExecResult::default();
        let mut last_body_code = 0;

        loop {
            let cond = self.execute_sequence(condition).await?;
            let cond_code = cond.exit_code;
            total.stdout.push_str(&cond.stdout);
            total.stderr.push_str(&cond.stderr);
            if let Some(stop) = consume_loop_flow(cond.control_flow, &mut total) {
                if stop {
                    break;
                }
                continue;
            }

            let keep_going = if until { cond_code != 0 } else { cond_code == 0 };
            if !keep_going {
                break;
            }

            let body_result = self.execute_sequence(body).await?;
            last_body_code = body_result.exit_code;
            total.stdout.push_str(&body_result.stdout);
            total.stderr.push_str(&body_result.stderr);
            if let Some(stop) = consume_loop_flow(body_result.control_flow, &mut total) {
                if stop {
                    break;
                }
            }
        }

        total.exit_code = last_body_code;
        self.state.last_status = total.exit_code;
        Ok(total)
    }

    async fn execute_for(&mut self, for_cmd: &ForCommand) -> Result<ExecResult> {
        let values = match &for_cmd.words {
            Some(words) => {
                let mut values = Vec::new();
                for word in words {
                    values.extend(self.expand_fields_of(word).await?);
                }
                values
            }
            None => self.state.positionals().to_vec(),
        };

        let mut total = ExecResult::default();
        let mut last_code = 0;

        'iterations: for value in values {
            self.state.set_var(&for_cmd.variable, &value);
            let body_result = self.execute_sequence(&for_cmd.body).await?;
            last_code = body_result.exit_code;
            total.stdout.push_str(&body_result.stdout);
            total.stderr.push_str(&body_result.stderr);
            if let Some(stop) = consume_loop_flow(body_result.control_flow, &mut total) {
                if stop {
                    break 'iterations;
                }
            }
        }

        total.exit_code = last_code;
        self.state.last_status = total.exit_code;
        Ok(total)
    }

    /// First matching pattern wins; an unmatched subject succeeds.
    async fn execute_case(&mut self, case_cmd: &CaseCommand) -> Result<ExecResult> {
        let subject = self.expand_single_of(&case_cmd.subject).await?;

        for item in &case_cmd.items {
            for pattern_word in &item.patterns {
                let mut pattern = self.expand_single_of(pattern_word).await?;
                // Fully quoted patterns match literally.
                if matches!(
                    pattern_word.quoting,
                    parser::Quoting::SingleQuoted | parser::Quoting::DoubleQuoted
                ) {
                    pattern = crate::expand::pattern::escape(&pattern);
                }
                if crate::expand::pattern::matches(&subject, &pattern) {
                    let result = self.execute_sequence(&item.commands).await?;
                    self.state.last_status = result.exit_code;
                    return Ok(result);
                }
            }
        }
        Ok(ExecResult::ok(""))
    }

    /// Subshell: run against a cloned state so mutations stay inside.
    async fn execute_subshell(&mut self, commands: &[Command]) -> Result<ExecResult> {
        let mut sub = self.fork();
        let mut result = sub.execute_sequence(commands).await?;
        if let ControlFlow::Exit(code) = result.control_flow {
            result.exit_code = code;
        }
        result.control_flow = ControlFlow::None;
        self.state.last_status = result.exit_code;
        Ok(result)
    }

    fn fork(&self) -> Interpreter {
        Interpreter {
            state: self.state.clone(),
            builtins: builtins::registry(),
            executor: Arc::clone(&self.executor),
            jobs: JobTable::new(),
            log_config: self.log_config.clone(),
        }
    }

    async fn execute_simple(
        &mut self,
        simple: &SimpleCommand,
        stdin: Option<String>,
    ) -> Result<ExecResult> {
        let mut argv = Vec::new();
        if let Some(name_word) = &simple.name {
            argv.extend(self.expand_fields_of(name_word).await?);
            for arg in &simple.args {
                argv.extend(self.expand_fields_of(arg).await?);
            }
        }

        // Assignment-only statement (or a name that expanded away).
        if argv.is_empty() {
            for assignment in &simple.assignments {
                let value = self.expand_single_of(&assignment.value).await?;
                self.state.set_var(&assignment.name, &value);
            }
            if !simple.redirects.is_empty() {
                let resolved = self.resolve_redirects(&simple.redirects).await?;
                let plan = executor::plan_output(&resolved);
                return Ok(executor::deliver_output(
                    String::new(),
                    String::new(),
                    plan,
                    0,
                    &self.state.cwd,
                )
                .await);
            }
            return Ok(ExecResult::ok(""));
        }

        let name = argv[0].clone();
        tracing::debug!(
            command = %self.log_config.format_argv(&argv),
            "executing command"
        );

        if let Some(body) = self.state.function(&name) {
            return self.call_function(body, &argv[1..], simple, stdin).await;
        }
        if self.builtins.contains_key(name.as_str()) {
            return self.run_builtin(&name, &argv[1..], simple, stdin).await;
        }
        self.run_external(argv, simple, stdin).await
    }

    /// Function call: new scope, rebound positionals, `return` consumed
    /// here.
    async fn call_function(
        &mut self,
        body: Arc<Command>,
        args: &[String],
        simple: &SimpleCommand,
        stdin: Option<String>,
    ) -> Result<ExecResult> {
        let assignments = self.expand_assignments(&simple.assignments).await?;
        let redirects = self.resolve_redirects(&simple.redirects).await?;

        self.state.push_scope();
        self.state.push_positionals(args.to_vec());
        for (name, value) in assignments {
            self.state.set_var(&name, &value);
        }

        let outcome = self.execute_command(&body).await;

        self.state.pop_positionals();
        self.state.pop_scope();

        let mut result = outcome?;
        if let ControlFlow::Return(code) = result.control_flow {
            result.exit_code = code;
            result.control_flow = ControlFlow::None;
        }
        self.route_output(result, &redirects, stdin).await
    }

    async fn run_builtin(
        &mut self,
        name: &str,
        args: &[String],
        simple: &SimpleCommand,
        stdin: Option<String>,
    ) -> Result<ExecResult> {
        let assignments = self.expand_assignments(&simple.assignments).await?;
        let redirects = self.resolve_redirects(&simple.redirects).await?;

        let stdin = match executor::gather_stdin(stdin, &redirects, &self.state.cwd).await {
            Ok(stdin) => stdin,
            Err(result) => return Ok(result),
        };

        // Prefix assignments are visible to this command only.
        let scoped = !assignments.is_empty();
        if scoped {
            self.state.push_scope();
            for (name, value) in &assignments {
                self.state.set_var(name, value);
            }
        }

        let builtin = self.builtins.get(name).expect("builtin presence checked by caller");
        let ctx = builtins::Context {
            args,
            state: &mut self.state,
            stdin: stdin.as_deref(),
        };
        let outcome = builtin.execute(ctx).await;

        if scoped {
            self.state.pop_scope();
        }

        let result = outcome?;
        let control_flow = result.control_flow;
        let plan = executor::plan_output(&redirects);
        let mut routed = executor::deliver_output(
            result.stdout,
            result.stderr,
            plan,
            result.exit_code,
            &self.state.cwd,
        )
        .await;
        routed.control_flow = control_flow;
        Ok(routed)
    }

    async fn run_external(
        &mut self,
        argv: Vec<String>,
        simple: &SimpleCommand,
        stdin: Option<String>,
    ) -> Result<ExecResult> {
        let redirects = self.resolve_redirects(&simple.redirects).await?;
        let env = self.child_env(&simple.assignments).await?;
        self.executor
            .run(ExternalCommand {
                argv,
                env,
                redirects,
                stdin,
                cwd: self.state.cwd.clone(),
            })
            .await
    }

    /// Exported variables plus this command's assignment prefix.
    async fn child_env(
        &mut self,
        assignments: &[parser::Assignment],
    ) -> Result<Vec<(String, String)>> {
        let mut env = self.state.env_for_child();
        for (name, value) in self.expand_assignments(assignments).await? {
            env.retain(|(k, _)| *k != name);
            env.push((name, value));
        }
        Ok(env)
    }

    async fn expand_assignments(
        &mut self,
        assignments: &[parser::Assignment],
    ) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for assignment in assignments {
            let value = self.expand_single_of(&assignment.value).await?;
            out.push((assignment.name.clone(), value));
        }
        Ok(out)
    }

    async fn resolve_redirects(&mut self, redirects: &[Redirect]) -> Result<Vec<ResolvedRedirect>> {
        let mut out = Vec::new();
        for redirect in redirects {
            let target = self.expand_single_of(&redirect.target).await?;
            if target.is_empty() {
                return Err(Error::Redirection(format!(
                    "{}: ambiguous redirect",
                    redirect.target.raw
                )));
            }
            out.push(ResolvedRedirect { fd: redirect.effective_fd(), kind: redirect.kind, target });
        }
        Ok(out)
    }

    /// Apply output redirections to an in-process result.
    async fn route_output(
        &mut self,
        result: ExecResult,
        redirects: &[ResolvedRedirect],
        _stdin: Option<String>,
    ) -> Result<ExecResult> {
        if redirects.is_empty() {
            return Ok(result);
        }
        let control_flow = result.control_flow;
        let plan = executor::plan_output(redirects);
        let mut routed = executor::deliver_output(
            result.stdout,
            result.stderr,
            plan,
            result.exit_code,
            &self.state.cwd,
        )
        .await;
        routed.control_flow = control_flow;
        Ok(routed)
    }

    async fn expand_fields_of(&mut self, word: &Word) -> Result<Vec<String>> {
        Expander::new(self).expand_fields(word).await
    }

    async fn expand_single_of(&mut self, word: &Word) -> Result<String> {
        Expander::new(self).expand_single(word).await
    }

    /// Command substitution: parse and run the inner program against a
    /// forked state, returning its captured stdout. `$?` reflects the
    /// inner program's status.
    async fn capture_output(&mut self, script: &str) -> Result<String> {
        let program = parser::parse(script)?;
        let mut sub = self.fork();
        let result = sub.execute(&program).await?;
        self.state.last_status = result.exit_code;
        if !result.stderr.is_empty() {
            tracing::debug!(stderr = %result.stderr.trim_end(), "command substitution stderr");
        }
        Ok(result.stdout)
    }
}

/// Interpret a loop-level control flow signal. Returns `Some(true)` to
/// break the loop, `Some(false)` to continue it, `None` when the signal
/// does not concern this loop.
fn consume_loop_flow(flow: ControlFlow, total: &mut ExecResult) -> Option<bool> {
    match flow {
        ControlFlow::None => None,
        ControlFlow::Break(1) => Some(true),
        ControlFlow::Break(n) => {
            total.control_flow = ControlFlow::Break(n - 1);
            Some(true)
        }
        ControlFlow::Continue(1) => Some(false),
        ControlFlow::Continue(n) => {
            total.control_flow = ControlFlow::Continue(n - 1);
            Some(true)
        }
        other => {
            total.control_flow = other;
            Some(true)
        }
    }
}

fn is_recoverable(error: &Error) -> bool {
    matches!(
        error,
        Error::Expansion(_) | Error::Arith(_) | Error::Redirection(_) | Error::CommandNotFound(_)
    )
}

/// The interpreter is the expander's window onto session state.
#[async_trait]
impl ExpansionHost for Interpreter {
    fn lookup(&mut self, name: &str) -> Option<String> {
        match name {
            "?" => Some(self.state.last_status.to_string()),
            "$" => Some(std::process::id().to_string()),
            "!" => self.state.last_bg_pid.map(|pid| pid.to_string()),
            "#" => Some(self.state.positionals().len().to_string()),
            "0" => Some(self.state.script_name.clone()),
            "-" => Some(self.state.option_flags()),
            "@" | "*" => Some(self.state.positionals().join(" ")),
            _ if name.chars().all(|c| c.is_ascii_digit()) => {
                let index: usize = name.parse().ok()?;
                self.state.positionals().get(index.checked_sub(1)?).cloned()
            }
            _ => self.state.get_var(name),
        }
    }

    fn assign(&mut self, name: &str, value: &str) {
        self.state.set_var(name, value);
    }

    fn positional_fields(&mut self) -> Vec<String> {
        self.state.positionals().to_vec()
    }

    async fn capture(&mut self, script: &str) -> Result<String> {
        self.capture_output(script).await
    }

    fn home_dir(&mut self, user: Option<&str>) -> Option<String> {
        match user {
            None => self.state.get_var("HOME"),
            Some(user) => {
                // Only the current user's home is known without NSS.
                if self.state.get_var("USER").as_deref() == Some(user) {
                    self.state.get_var("HOME")
                } else {
                    None
                }
            }
        }
    }

    fn cwd(&mut self) -> PathBuf {
        self.state.cwd.clone()
    }

    fn cached_expr(&mut self, expr: &str) -> Option<String> {
        self.state.cached_expr(expr)
    }

    fn store_expr(&mut self, expr: &str, result: &str) {
        self.state.store_expr(expr, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::HostExecutor;

    async fn run(script: &str) -> ExecResult {
        let mut interp =
            Interpreter::with_state(ShellState::empty(), Arc::new(HostExecutor::new()));
        let program = parser::parse(script).unwrap();
        interp.execute(&program).await.unwrap()
    }

    #[tokio::test]
    async fn assignment_then_expansion() {
        let r = run("a=1 b=2; echo $a$b").await;
        assert_eq!(r.stdout, "12\n");
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test]
    async fn prefix_assignment_scoped_to_command() {
        let r = run("x=global; x=local echo scoped; echo $x").await;
        assert_eq!(r.stdout, "scoped\nglobal\n");
    }

    #[tokio::test]
    async fn if_branches() {
        assert_eq!(run("if true; then echo yes; else echo no; fi").await.stdout, "yes\n");
        assert_eq!(run("if false; then echo yes; else echo no; fi").await.stdout, "no\n");
        assert_eq!(
            run("if false; then echo a; elif true; then echo b; fi").await.stdout,
            "b\n"
        );
        // Failed condition without else still succeeds.
        assert_eq!(run("if false; then echo a; fi").await.exit_code, 0);
    }

    #[tokio::test]
    async fn for_loop_with_break_and_continue() {
        let r = run("for i in 1 2 3 4; do if test $i = 3; then break; fi; echo $i; done").await;
        assert_eq!(r.stdout, "1\n2\n");

        let r = run("for i in 1 2 3; do if test $i = 2; then continue; fi; echo $i; done").await;
        assert_eq!(r.stdout, "1\n3\n");
    }

    #[tokio::test]
    async fn nested_break_levels() {
        let r = run(
            "for a in 1 2; do for b in x y; do echo $a$b; break 2; done; done; echo after",
        )
        .await;
        assert_eq!(r.stdout, "1x\nafter\n");
    }

    #[tokio::test]
    async fn while_loop_counts() {
        let r = run("i=0; while test $i -lt 3; do echo $i; i=$((i + 1)); done").await;
        assert_eq!(r.stdout, "0\n1\n2\n");
    }

    #[tokio::test]
    async fn until_loop_runs_until_success() {
        let r = run("i=0; until test $i -ge 2; do echo $i; i=$((i + 1)); done").await;
        assert_eq!(r.stdout, "0\n1\n");
    }

    #[tokio::test]
    async fn and_or_short_circuit() {
        let r = run("false && echo no || echo yes && echo fin").await;
        assert_eq!(r.stdout, "yes\nfin\n");
        assert_eq!(r.exit_code, 0);
    }

    #[tokio::test]
    async fn pipeline_negation() {
        assert_eq!(run("! false").await.exit_code, 0);
        assert_eq!(run("! true").await.exit_code, 1);
    }

    #[tokio::test]
    async fn case_first_match_wins() {
        let r =
            run("case dog in cat) echo meow;; dog|wolf) echo bark;; *) echo other;; esac").await;
        assert_eq!(r.stdout, "bark\n");
        assert_eq!(run("case zzz in a) echo a;; esac").await.exit_code, 0);
    }

    #[tokio::test]
    async fn quoted_case_pattern_matches_literally() {
        let r = run("case '*' in '*') echo star;; *) echo other;; esac").await;
        assert_eq!(r.stdout, "star\n");
        let r = run("case abc in '*') echo star;; *) echo any;; esac").await;
        assert_eq!(r.stdout, "any\n");
    }

    #[tokio::test]
    async fn functions_bind_positionals() {
        let r = run("greet() { echo hello $1; }; greet world; echo $#").await;
        assert_eq!(r.stdout, "hello world\n0\n");
    }

    #[tokio::test]
    async fn function_return_status() {
        let r = run("f() { return 3; }; f; echo $?").await;
        assert_eq!(r.stdout, "3\n");
    }

    #[tokio::test]
    async fn subshell_isolates_state() {
        let r = run("x=outer; (x=inner; echo $x); echo $x").await;
        assert_eq!(r.stdout, "inner\nouter\n");
    }

    #[tokio::test]
    async fn exit_stops_program() {
        let r = run("echo one; exit 4; echo two").await;
        assert_eq!(r.stdout, "one\n");
        assert_eq!(r.exit_code, 4);
        assert_eq!(r.control_flow, ControlFlow::Exit(4));
    }

    #[tokio::test]
    async fn unknown_command_reports_127_and_continues() {
        let r = run("definitely-not-installed-zzz; echo still here").await;
        assert_eq!(r.stdout, "still here\n");
        assert!(r.stderr.contains("command not found"));
    }

    #[tokio::test]
    async fn expansion_error_aborts_only_that_command() {
        let r = run("echo ${missing:?is required}; echo next").await;
        assert_eq!(r.stdout, "next\n");
        assert!(r.stderr.contains("is required"));
    }

    #[tokio::test]
    async fn empty_redirect_target_is_ambiguous() {
        let r = run("echo hi > $unset; echo next").await;
        assert_eq!(r.stdout, "next\n");
        assert!(r.stderr.contains("ambiguous redirect"));
    }

    #[tokio::test]
    async fn errexit_stops_after_failure() {
        let r = run("set -e; false; echo unreachable").await;
        assert_eq!(r.stdout, "");
        assert_eq!(r.exit_code, 1);
    }

    #[tokio::test]
    async fn last_status_parameter() {
        let r = run("false; echo $?; true; echo $?").await;
        assert_eq!(r.stdout, "1\n0\n");
    }
}

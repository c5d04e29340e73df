//! Flow control builtins (true, false, :, exit, break, continue, return)

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::{ControlFlow, ExecResult};

/// The true builtin - always succeeds.
pub struct True;

#[async_trait]
impl Builtin for True {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(""))
    }
}

/// The false builtin - always fails.
pub struct False;

#[async_trait]
impl Builtin for False {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::with_code("", 1))
    }
}

/// The `:` builtin - does nothing, successfully.
pub struct Colon;

#[async_trait]
impl Builtin for Colon {
    async fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(""))
    }
}

/// The exit builtin - leave the shell with a status code.
pub struct Exit;

#[async_trait]
impl Builtin for Exit {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let code = match ctx.args.first() {
            Some(arg) => match arg.parse::<i32>() {
                Ok(code) => code,
                Err(_) => {
                    return Ok(ExecResult::err(
                        format!("exit: {arg}: numeric argument required\n"),
                        2,
                    ))
                }
            },
            None => ctx.state.last_status,
        };
        Ok(ExecResult::with_control_flow(ControlFlow::Exit(code)))
    }
}

fn parse_level(ctx: &Context<'_>, what: &str) -> std::result::Result<u32, ExecResult> {
    match ctx.args.first() {
        None => Ok(1),
        Some(arg) => match arg.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ExecResult::err(format!("{what}: {arg}: bad loop count\n"), 1)),
        },
    }
}

/// The break builtin - leave N enclosing loops.
pub struct Break;

#[async_trait]
impl Builtin for Break {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        match parse_level(&ctx, "break") {
            Ok(n) => Ok(ExecResult::with_control_flow(ControlFlow::Break(n))),
            Err(result) => Ok(result),
        }
    }
}

/// The continue builtin - resume the Nth enclosing loop.
pub struct Continue;

#[async_trait]
impl Builtin for Continue {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        match parse_level(&ctx, "continue") {
            Ok(n) => Ok(ExecResult::with_control_flow(ControlFlow::Continue(n))),
            Err(result) => Ok(result),
        }
    }
}

/// The return builtin - leave the current function.
pub struct Return;

#[async_trait]
impl Builtin for Return {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let code = ctx
            .args
            .first()
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(ctx.state.last_status);
        Ok(ExecResult::with_control_flow(ControlFlow::Return(code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ShellState;

    async fn run(builtin: &dyn Builtin, args: &[&str], state: &mut ShellState) -> ExecResult {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        builtin.execute(Context { args: &args, state, stdin: None }).await.unwrap()
    }

    #[tokio::test]
    async fn true_and_false() {
        let mut state = ShellState::empty();
        assert_eq!(run(&True, &[], &mut state).await.exit_code, 0);
        assert_eq!(run(&False, &[], &mut state).await.exit_code, 1);
        assert_eq!(run(&Colon, &["ignored"], &mut state).await.exit_code, 0);
    }

    #[tokio::test]
    async fn exit_uses_last_status_by_default() {
        let mut state = ShellState::empty();
        state.last_status = 3;
        let r = run(&Exit, &[], &mut state).await;
        assert_eq!(r.control_flow, ControlFlow::Exit(3));

        let r = run(&Exit, &["7"], &mut state).await;
        assert_eq!(r.control_flow, ControlFlow::Exit(7));

        let r = run(&Exit, &["nope"], &mut state).await;
        assert_eq!(r.exit_code, 2);
    }

    #[tokio::test]
    async fn break_and_continue_levels() {
        let mut state = ShellState::empty();
        assert_eq!(run(&Break, &[], &mut state).await.control_flow, ControlFlow::Break(1));
        assert_eq!(run(&Break, &["2"], &mut state).await.control_flow, ControlFlow::Break(2));
        assert_eq!(
            run(&Continue, &["3"], &mut state).await.control_flow,
            ControlFlow::Continue(3)
        );
        assert_eq!(run(&Break, &["0"], &mut state).await.exit_code, 1);
    }
}

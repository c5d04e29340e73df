//! Variable and option builtins (export, unset, shift, set)

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The export builtin - mark variables for child inheritance.
pub struct Export;

#[async_trait]
impl Builtin for Export {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        if ctx.args.is_empty() {
            let mut lines: Vec<String> = ctx
                .state
                .env_for_child()
                .into_iter()
                .map(|(name, value)| format!("export {name}={value}\n"))
                .collect();
            lines.sort();
            return Ok(ExecResult::ok(lines.concat()));
        }

        for arg in ctx.args {
            match arg.split_once('=') {
                Some((name, value)) => {
                    ctx.state.set_var(name, value);
                    ctx.state.export_var(name);
                }
                None => ctx.state.export_var(arg),
            }
        }
        Ok(ExecResult::ok(""))
    }
}

/// The unset builtin - remove variables.
pub struct Unset;

#[async_trait]
impl Builtin for Unset {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        for arg in ctx.args {
            ctx.state.unset_var(arg);
        }
        Ok(ExecResult::ok(""))
    }
}

/// The shift builtin - drop leading positional parameters.
pub struct Shift;

#[async_trait]
impl Builtin for Shift {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let n = match ctx.args.first() {
            None => 1,
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    return Ok(ExecResult::err(format!("shift: {arg}: numeric argument required\n"), 1))
                }
            },
        };
        if ctx.state.shift_positionals(n) {
            Ok(ExecResult::ok(""))
        } else {
            Ok(ExecResult::err("shift: shift count out of range\n", 1))
        }
    }
}

/// The set builtin - positional parameters and option flags.
pub struct Set;

#[async_trait]
impl Builtin for Set {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut args = ctx.args.iter().peekable();

        while let Some(arg) = args.peek() {
            match arg.as_str() {
                "--" => {
                    args.next();
                    let rest: Vec<String> = args.map(|s| s.to_string()).collect();
                    ctx.state.set_positionals(rest);
                    return Ok(ExecResult::ok(""));
                }
                "-e" => {
                    ctx.state.options.errexit = true;
                    args.next();
                }
                "+e" => {
                    ctx.state.options.errexit = false;
                    args.next();
                }
                "-o" | "+o" => {
                    let enable = arg.as_str() == "-o";
                    args.next();
                    match args.next().map(|s| s.as_str()) {
                        Some("pipefail") => ctx.state.options.pipefail = enable,
                        Some("errexit") => ctx.state.options.errexit = enable,
                        Some(option) => {
                            return Ok(ExecResult::err(
                                format!("set: {option}: unknown option\n"),
                                2,
                            ))
                        }
                        None => return Ok(ExecResult::err("set: -o: missing option name\n", 2)),
                    }
                }
                other if other.starts_with('-') || other.starts_with('+') => {
                    return Ok(ExecResult::err(format!("set: {other}: unknown option\n"), 2));
                }
                _ => {
                    let rest: Vec<String> = args.map(|s| s.to_string()).collect();
                    ctx.state.set_positionals(rest);
                    return Ok(ExecResult::ok(""));
                }
            }
        }
        Ok(ExecResult::ok(""))
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
    async fn export_with_assignment() {
        let mut state = ShellState::empty();
        run(&Export, &["GREETING=hello"], &mut state).await;
        assert_eq!(state.get_var("GREETING").as_deref(), Some("hello"));
        assert!(state.env_for_child().iter().any(|(k, _)| k == "GREETING"));
    }

    #[tokio::test]
    async fn export_existing_variable() {
        let mut state = ShellState::empty();
        state.set_var("x", "1");
        run(&Export, &["x"], &mut state).await;
        assert!(state.env_for_child().iter().any(|(k, v)| k == "x" && v == "1"));
    }

    #[tokio::test]
    async fn export_listing_is_sorted() {
        let mut state = ShellState::empty();
        run(&Export, &["b=2", "a=1"], &mut state).await;
        let out = run(&Export, &[], &mut state).await.stdout;
        assert_eq!(out, "export a=1\nexport b=2\n");
    }

    #[tokio::test]
    async fn unset_removes_variable() {
        let mut state = ShellState::empty();
        state.set_var("gone", "soon");
        run(&Unset, &["gone"], &mut state).await;
        assert_eq!(state.get_var("gone"), None);
    }

    #[tokio::test]
    async fn shift_and_overflow() {
        let mut state = ShellState::empty();
        state.set_positionals(vec!["a".into(), "b".into()]);
        assert!(run(&Shift, &[], &mut state).await.is_success());
        assert_eq!(state.positionals(), ["b"]);
        let r = run(&Shift, &["5"], &mut state).await;
        assert_eq!(r.exit_code, 1);
    }

    #[tokio::test]
    async fn set_positionals_and_options() {
        let mut state = ShellState::empty();
        run(&Set, &["--", "one", "two"], &mut state).await;
        assert_eq!(state.positionals(), ["one", "two"]);

        run(&Set, &["-e"], &mut state).await;
        assert!(state.options.errexit);
        run(&Set, &["+e"], &mut state).await;
        assert!(!state.options.errexit);

        run(&Set, &["-o", "pipefail"], &mut state).await;
        assert!(state.options.pipefail);
        run(&Set, &["+o", "pipefail"], &mut state).await;
        assert!(!state.options.pipefail);

        let r = run(&Set, &["-o", "bogus"], &mut state).await;
        assert_eq!(r.exit_code, 2);
    }
}

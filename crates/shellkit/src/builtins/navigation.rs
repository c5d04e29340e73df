//! Navigation builtins (cd, pwd)

use std::path::PathBuf;

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The cd builtin - change the shell's working directory.
pub struct Cd;

#[async_trait]
impl Builtin for Cd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut print_target = false;
        let target = match ctx.args.first().map(|s| s.as_str()) {
            None => match ctx.state.get_var("HOME") {
                Some(home) => home,
                None => return Ok(ExecResult::err("cd: HOME not set\n", 1)),
            },
            Some("-") => match ctx.state.get_var("OLDPWD") {
                Some(oldpwd) => {
                    print_target = true;
                    oldpwd
                }
                None => return Ok(ExecResult::err("cd: OLDPWD not set\n", 1)),
            },
            Some(dir) => dir.to_string(),
        };

        let resolved = if target.starts_with('/') {
            PathBuf::from(&target)
        } else {
            ctx.state.cwd.join(&target)
        };

        let resolved = match resolved.canonicalize() {
            Ok(path) if path.is_dir() => path,
            Ok(_) => return Ok(ExecResult::err(format!("cd: {target}: not a directory\n"), 1)),
            Err(e) => return Ok(ExecResult::err(format!("cd: {target}: {e}\n"), 1)),
        };

        let previous = ctx.state.cwd.display().to_string();
        ctx.state.set_var("OLDPWD", &previous);
        ctx.state.set_var("PWD", &resolved.display().to_string());
        ctx.state.cwd = resolved.clone();

        let stdout =
            if print_target { format!("{}\n", resolved.display()) } else { String::new() };
        Ok(ExecResult::ok(stdout))
    }
}

/// The pwd builtin - print the working directory.
pub struct Pwd;

#[async_trait]
impl Builtin for Pwd {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(format!("{}\n", ctx.state.cwd.display())))
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
    async fn cd_updates_cwd_and_pwd_vars() {
        let mut state = ShellState::empty();
        let temp = std::env::temp_dir().canonicalize().unwrap();

        let r = run(&Cd, &[temp.to_str().unwrap()], &mut state).await;
        assert!(r.is_success());
        assert_eq!(state.cwd, temp);
        assert_eq!(state.get_var("PWD").as_deref(), Some(temp.to_str().unwrap()));
        assert_eq!(state.get_var("OLDPWD").as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn cd_dash_returns_to_previous() {
        let mut state = ShellState::empty();
        let temp = std::env::temp_dir().canonicalize().unwrap();
        run(&Cd, &[temp.to_str().unwrap()], &mut state).await;

        let r = run(&Cd, &["-"], &mut state).await;
        assert!(r.is_success());
        assert_eq!(state.cwd, PathBuf::from("/"));
        assert_eq!(r.stdout, "/\n");
    }

    #[tokio::test]
    async fn cd_to_missing_directory_fails() {
        let mut state = ShellState::empty();
        let r = run(&Cd, &["/definitely/not/a/dir"], &mut state).await;
        assert_eq!(r.exit_code, 1);
        assert!(r.stderr.contains("cd:"));
    }

    #[tokio::test]
    async fn pwd_prints_cwd() {
        let mut state = ShellState::empty();
        assert_eq!(run(&Pwd, &[], &mut state).await.stdout, "/\n");
    }
}

//! test / [ builtin

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::executor::resolve_path;
use crate::interpreter::{ExecResult, ShellState};

/// The test builtin, also reachable as `[`.
pub struct Test;

#[async_trait]
impl Builtin for Test {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut args: &[String] = ctx.args;

        // `[` requires a closing `]`.
        if let Some(last) = args.last() {
            if last == "]" {
                args = &args[..args.len() - 1];
            }
        }

        let code = if evaluate(args, ctx.state) { 0 } else { 1 };
        Ok(ExecResult::with_code("", code))
    }
}

fn evaluate(args: &[String], state: &ShellState) -> bool {
    match args {
        [] => false,
        [bang, rest @ ..] if bang == "!" => !evaluate(rest, state),
        [single] => !single.is_empty(),
        [op, operand] => unary(op, operand, state),
        [left, op, right] => binary(left, op, right),
        _ => false,
    }
}

fn unary(op: &str, operand: &str, state: &ShellState) -> bool {
    match op {
        "-z" => operand.is_empty(),
        "-n" => !operand.is_empty(),
        "-e" => resolve_path(&state.cwd, operand).exists(),
        "-f" => resolve_path(&state.cwd, operand).is_file(),
        "-d" => resolve_path(&state.cwd, operand).is_dir(),
        "-s" => resolve_path(&state.cwd, operand)
            .metadata()
            .map(|m| m.len() > 0)
            .unwrap_or(false),
        _ => false,
    }
}

fn binary(left: &str, op: &str, right: &str) -> bool {
    match op {
        "=" | "==" => left == right,
        "!=" => left != right,
        "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
            let (Ok(a), Ok(b)) = (left.parse::<i64>(), right.parse::<i64>()) else {
                return false;
            };
            match op {
                "-eq" => a == b,
                "-ne" => a != b,
                "-lt" => a < b,
                "-le" => a <= b,
                "-gt" => a > b,
                "-ge" => a >= b,
                _ => unreachable!(),
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(args: &[&str]) -> bool {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        evaluate(&args, &ShellState::empty())
    }

    #[test]
    fn empty_test_is_false() {
        assert!(!check(&[]));
    }

    #[test]
    fn single_argument_tests_nonempty() {
        assert!(check(&["text"]));
        assert!(!check(&[""]));
    }

    #[test]
    fn string_length_operators() {
        assert!(check(&["-z", ""]));
        assert!(!check(&["-z", "x"]));
        assert!(check(&["-n", "x"]));
    }

    #[test]
    fn string_comparison() {
        assert!(check(&["abc", "=", "abc"]));
        assert!(check(&["abc", "!=", "abd"]));
        assert!(!check(&["abc", "=", "abd"]));
    }

    #[test]
    fn numeric_comparison() {
        assert!(check(&["3", "-eq", "3"]));
        assert!(check(&["2", "-lt", "10"]));
        assert!(check(&["10", "-ge", "10"]));
        assert!(!check(&["abc", "-eq", "3"]));
    }

    #[test]
    fn negation() {
        assert!(check(&["!", ""]));
        assert!(!check(&["!", "x"]));
        assert!(check(&["!", "a", "=", "b"]));
    }

    #[test]
    fn file_tests() {
        let dir = std::env::temp_dir();
        let dir_str = dir.to_str().unwrap();
        let file = dir.join(format!("shellkit_test_builtin_{}", std::process::id()));
        std::fs::write(&file, b"content").unwrap();
        let file_str = file.to_str().unwrap();

        assert!(check(&["-e", file_str]));
        assert!(check(&["-f", file_str]));
        assert!(check(&["-s", file_str]));
        assert!(check(&["-d", dir_str]));
        assert!(!check(&["-f", dir_str]));
        assert!(!check(&["-e", "/no/such/path"]));

        std::fs::remove_file(&file).unwrap();
    }
}

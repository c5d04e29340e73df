//! echo builtin command

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The echo builtin command.
pub struct Echo;

#[async_trait]
impl Builtin for Echo {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut add_newline = true;
        let mut interpret_escapes = false;
        let mut args = ctx.args.iter().peekable();

        while let Some(arg) = args.peek() {
            match arg.as_str() {
                "-n" => {
                    add_newline = false;
                    args.next();
                }
                "-e" => {
                    interpret_escapes = true;
                    args.next();
                }
                "-E" => {
                    interpret_escapes = false;
                    args.next();
                }
                _ => break,
            }
        }

        let mut output = String::new();
        for (i, arg) in args.enumerate() {
            if i > 0 {
                output.push(' ');
            }
            if interpret_escapes {
                output.push_str(&interpret_escape_sequences(arg));
            } else {
                output.push_str(arg);
            }
        }
        if add_newline {
            output.push('\n');
        }

        Ok(ExecResult::ok(output))
    }
}

fn interpret_escape_sequences(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('a') => result.push('\x07'),
            Some('b') => result.push('\x08'),
            Some('f') => result.push('\x0c'),
            Some('v') => result.push('\x0b'),
            Some('0') => {
                let mut value = 0u8;
                for _ in 0..3 {
                    match chars.peek() {
                        Some(&d) if ('0'..='7').contains(&d) => {
                            value = value * 8 + (d as u8 - b'0');
                            chars.next();
                        }
                        _ => break,
                    }
                }
                result.push(value as char);
            }
            Some('c') => break,
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ShellState;

    async fn run(args: &[&str]) -> ExecResult {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut state = ShellState::empty();
        Echo.execute(Context { args: &args, state: &mut state, stdin: None }).await.unwrap()
    }

    #[tokio::test]
    async fn joins_args_with_spaces() {
        assert_eq!(run(&["hello", "world"]).await.stdout, "hello world\n");
    }

    #[tokio::test]
    async fn n_flag_suppresses_newline() {
        assert_eq!(run(&["-n", "hi"]).await.stdout, "hi");
    }

    #[tokio::test]
    async fn e_flag_interprets_escapes() {
        assert_eq!(run(&["-e", "a\\tb\\n"]).await.stdout, "a\tb\n\n");
        assert_eq!(run(&["-e", "stop\\chere"]).await.stdout, "stop\n");
    }

    #[test]
    fn escape_sequences() {
        assert_eq!(interpret_escape_sequences("hello\\nworld"), "hello\nworld");
        assert_eq!(interpret_escape_sequences("\\\\slash"), "\\slash");
        assert_eq!(interpret_escape_sequences("\\012"), "\n");
    }
}

//! shellkit CLI - command line front end for the shell core
//!
//! Usage:
//!   shellkit -c 'echo hello'       # Execute a command string
//!   shellkit script.sh [args...]   # Execute a script file
//!   shellkit                       # Interactive REPL

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use shellkit::{ControlFlow, ExecResult, Shell};

/// shellkit - a POSIX-style shell
#[derive(Parser, Debug)]
#[command(name = "shellkit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Execute the given command string
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// Script file to execute
    #[arg()]
    script: Option<PathBuf>,

    /// Arguments to pass to the script
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SHELLKIT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(command) = args.command {
        let mut shell = Shell::builder()
            .inherit_env()
            .script_name("shellkit")
            .args(args.args)
            .build();
        let status = run_program(&mut shell, &command).await;
        return Ok(ExitCode::from(status as u8));
    }

    if let Some(script_path) = args.script {
        let source = std::fs::read_to_string(&script_path)
            .with_context(|| format!("failed to read {}", script_path.display()))?;
        let mut shell = Shell::builder()
            .inherit_env()
            .script_name(script_path.display().to_string())
            .args(args.args)
            .build();
        let status = run_program(&mut shell, &source).await;
        return Ok(ExitCode::from(status as u8));
    }

    let status = repl().await?;
    Ok(ExitCode::from(status as u8))
}

/// Run a whole program, printing its output and reporting its status.
async fn run_program(shell: &mut Shell, source: &str) -> i32 {
    match shell.exec(source).await {
        Ok(result) => {
            emit(&result);
            result.exit_code
        }
        Err(e) => {
            eprintln!("shellkit: {e}");
            e.exit_status()
        }
    }
}

/// Interactive read-eval-print loop. `PS2` is driven by the resumable
/// parser's needs-more signal.
async fn repl() -> Result<i32> {
    let mut shell = Shell::builder().inherit_env().script_name("shellkit").build();
    let mut editor = DefaultEditor::new().context("failed to initialize line editor")?;

    loop {
        let prompt = if shell.needs_more() {
            shell.var("PS2").unwrap_or_else(|| "> ".to_string())
        } else {
            shell.var("PS1").unwrap_or_else(|| "$ ".to_string())
        };

        match editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(&line);
                }
                match shell.feed_line(&line).await {
                    Ok(Some(result)) => {
                        emit(&result);
                        if let ControlFlow::Exit(code) = result.control_flow {
                            return Ok(code);
                        }
                    }
                    Ok(None) => {} // construct still open, prompt with PS2
                    Err(e) => eprintln!("shellkit: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // ^C abandons the current multi-line construct.
                shell.reset_input();
            }
            Err(ReadlineError::Eof) => return Ok(shell.last_status()),
            Err(e) => return Err(e).context("read error"),
        }
    }
}

fn emit(result: &ExecResult) {
    print!("{}", result.stdout);
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
}

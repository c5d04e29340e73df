//! External command execution
//!
//! The narrow interface the interpreter requires of its process-running
//! collaborator: it receives a fully resolved argv, environment, and
//! redirection list, and never forks or opens files itself beyond that
//! contract. `HostExecutor` implements it on the host OS via tokio's
//! process facilities; embedders may substitute their own.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::interpreter::ExecResult;
use crate::parser::RedirectKind;

/// A redirection with its target word already expanded.
#[derive(Debug, Clone)]
pub struct ResolvedRedirect {
    pub fd: i32,
    pub kind: RedirectKind,
    pub target: String,
}

/// Everything needed to run one external command.
#[derive(Debug, Clone, Default)]
pub struct ExternalCommand {
    pub argv: Vec<String>,
    /// Complete child environment (exported variables plus prefix
    /// assignments).
    pub env: Vec<(String, String)>,
    /// Redirections in source order.
    pub redirects: Vec<ResolvedRedirect>,
    /// Data piped into stdin from an earlier pipeline stage.
    pub stdin: Option<String>,
    pub cwd: PathBuf,
}

/// A job released to the background: its pid and a task resolving to
/// its exit status.
#[derive(Debug)]
pub struct BackgroundJob {
    pub pid: u32,
    pub status: JoinHandle<i32>,
}

/// Process-running collaborator interface.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion, capturing its output.
    async fn run(&self, cmd: ExternalCommand) -> Result<ExecResult>;

    /// Launch a command without waiting.
    async fn spawn_background(&self, cmd: ExternalCommand) -> Result<BackgroundJob>;
}

/// Where output written to a descriptor ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutDest {
    Stdout,
    Stderr,
    File { path: String, append: bool },
}

/// Resolve the output redirections in source order into destinations
/// for fd 1 and fd 2. Order matters: `>f 2>&1` sends stderr to the
/// file, `2>&1 >f` sends stderr to the original stdout.
pub(crate) fn plan_output(redirects: &[ResolvedRedirect]) -> (OutDest, OutDest) {
    let mut dest1 = OutDest::Stdout;
    let mut dest2 = OutDest::Stderr;

    for r in redirects {
        match r.kind {
            RedirectKind::Output | RedirectKind::Append => {
                let dest = OutDest::File {
                    path: r.target.clone(),
                    append: r.kind == RedirectKind::Append,
                };
                match r.fd {
                    1 => dest1 = dest,
                    2 => dest2 = dest,
                    _ => {}
                }
            }
            RedirectKind::DupOutput => {
                let source = match r.target.as_str() {
                    "1" => dest1.clone(),
                    "2" => dest2.clone(),
                    // `>&file` writes both streams to the file.
                    path => OutDest::File { path: path.to_string(), append: false },
                };
                match r.fd {
                    1 => dest1 = source,
                    2 => dest2 = source,
                    _ => {}
                }
            }
            RedirectKind::OutputBoth => {
                let dest = OutDest::File { path: r.target.clone(), append: false };
                dest1 = dest.clone();
                dest2 = dest;
            }
            RedirectKind::Input | RedirectKind::DupInput => {}
        }
    }
    (dest1, dest2)
}

/// Collect stdin content: input redirections override pipeline data.
/// A failing open is reported as the command's result, not a shell
/// error.
pub(crate) async fn gather_stdin(
    existing: Option<String>,
    redirects: &[ResolvedRedirect],
    cwd: &Path,
) -> std::result::Result<Option<String>, ExecResult> {
    let mut stdin = existing;
    for r in redirects {
        if r.kind == RedirectKind::Input {
            let path = resolve_path(cwd, &r.target);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => stdin = Some(content),
                Err(e) => {
                    return Err(ExecResult::err(format!("shellkit: {}: {e}\n", r.target), 1))
                }
            }
        }
    }
    Ok(stdin)
}

/// Route captured output to its planned destinations, writing files as
/// needed. Returns the result visible to the parent shell.
pub(crate) async fn deliver_output(
    stdout: String,
    stderr: String,
    plan: (OutDest, OutDest),
    exit_code: i32,
    cwd: &Path,
) -> ExecResult {
    let mut result = ExecResult { exit_code, ..Default::default() };

    for (data, dest) in [(stdout, plan.0), (stderr, plan.1)] {
        match dest {
            OutDest::Stdout => result.stdout.push_str(&data),
            OutDest::Stderr => result.stderr.push_str(&data),
            OutDest::File { path, append } => {
                if let Err(e) = write_file(cwd, &path, &data, append).await {
                    result.stderr.push_str(&format!("shellkit: {path}: {e}\n"));
                    result.exit_code = 1;
                }
            }
        }
    }
    result
}

async fn write_file(cwd: &Path, target: &str, data: &str, append: bool) -> std::io::Result<()> {
    let path = resolve_path(cwd, target);
    let mut options = tokio::fs::OpenOptions::new();
    options.create(true).write(true);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    let mut file = options.open(&path).await?;
    file.write_all(data.as_bytes()).await?;
    file.flush().await
}

pub(crate) fn resolve_path(cwd: &Path, target: &str) -> PathBuf {
    let p = Path::new(target);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

/// Executor backed by the host operating system.
#[derive(Debug, Default)]
pub struct HostExecutor;

impl HostExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(&self, cmd: &ExternalCommand) -> tokio::process::Command {
        let mut os_cmd = tokio::process::Command::new(&cmd.argv[0]);
        os_cmd
            .args(&cmd.argv[1..])
            .env_clear()
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&cmd.cwd);
        os_cmd
    }
}

#[async_trait]
impl CommandExecutor for HostExecutor {
    async fn run(&self, cmd: ExternalCommand) -> Result<ExecResult> {
        if cmd.argv.is_empty() {
            return Err(Error::CommandNotFound(String::new()));
        }

        let stdin = match gather_stdin(cmd.stdin.clone(), &cmd.redirects, &cmd.cwd).await {
            Ok(stdin) => stdin,
            Err(result) => return Ok(result),
        };
        let plan = plan_output(&cmd.redirects);

        let mut os_cmd = self.command(&cmd);
        os_cmd
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(argv0 = %cmd.argv[0], "spawning external command");
        let mut child = match os_cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ExecResult::err(
                    format!("shellkit: {}: command not found\n", cmd.argv[0]),
                    127,
                ));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(ExecResult::err(
                    format!("shellkit: {}: permission denied\n", cmd.argv[0]),
                    126,
                ));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        // Feed stdin concurrently so a child filling its output pipe
        // cannot deadlock against our write.
        if let (Some(data), Some(mut handle)) = (stdin, child.stdin.take()) {
            tokio::spawn(async move {
                let _ = handle.write_all(data.as_bytes()).await;
            });
        }

        let output = child.wait_with_output().await?;
        let exit_code = exit_status_code(&output.status);

        Ok(deliver_output(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            plan,
            exit_code,
            &cmd.cwd,
        )
        .await)
    }

    async fn spawn_background(&self, cmd: ExternalCommand) -> Result<BackgroundJob> {
        if cmd.argv.is_empty() {
            return Err(Error::CommandNotFound(String::new()));
        }

        let mut os_cmd = self.command(&cmd);
        os_cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        let mut child = os_cmd.spawn().map_err(Error::Io)?;
        let pid = child.id().unwrap_or(0);
        let status = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => exit_status_code(&status),
                Err(_) => 1,
            }
        });

        Ok(BackgroundJob { pid, status })
    }
}

/// Map a process exit status to a shell status, including 128+signal
/// for signal deaths.
fn exit_status_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

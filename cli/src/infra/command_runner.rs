//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` runs backend tools with tokio. Commands have no
//! timeout unless one is asked for; when it fires the child is killed.

use std::path::PathBuf;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::application::ports::CommandRunner;

/// Production `CommandRunner`, optionally pinned to a working directory.
///
/// Uses `tokio::select!` with an explicit `child.kill()` on timeout so the
/// process is terminated on every platform, not just abandoned.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    cwd: Option<PathBuf>,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir`.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(dir.into()),
        }
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        tracing::debug!(program, ?args, "running command");
        cmd
    }

    async fn collect(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> Result<Output> {
        let mut child = self
            .command(program, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        match timeout {
            None => wait_output(program, &mut child).await,
            Some(timeout) => tokio::select! {
                result = wait_output(program, &mut child) => result,
                () = tokio::time::sleep(timeout) => {
                    let _ = child.kill().await;
                    anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
                }
            },
        }
    }
}

/// Drain both pipes concurrently and wait for exit.
async fn wait_output(program: &str, child: &mut Child) -> Result<Output> {
    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();
    let (status, stdout, stderr) = tokio::join!(
        child.wait(),
        async {
            let mut buf = Vec::new();
            if let Some(ref mut h) = stdout_handle {
                let _ = h.read_to_end(&mut buf).await;
            }
            buf
        },
        async {
            let mut buf = Vec::new();
            if let Some(ref mut h) = stderr_handle {
                let _ = h.read_to_end(&mut buf).await;
            }
            buf
        },
    );
    Ok(Output {
        status: status.with_context(|| format!("waiting for {program}"))?,
        stdout,
        stderr,
    })
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.collect(program, args, None).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        self.collect(program, args, Some(timeout)).await
    }

    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        let mut child = self
            .command(program, args)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }

    async fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        let mut child = self
            .command(program, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout = child.stdout.take().context("stdout not captured")?;
        let stderr = child.stderr.take().context("stderr not captured")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_done, mut err_done) = (false, false);

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => {
                    match line.with_context(|| format!("reading {program} stdout"))? {
                        Some(line) => on_line(&line),
                        None => out_done = true,
                    }
                }
                line = err_lines.next_line(), if !err_done => {
                    match line.with_context(|| format!("reading {program} stderr"))? {
                        Some(line) => on_line(&line),
                        None => err_done = true,
                    }
                }
            }
        }

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}

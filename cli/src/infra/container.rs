//! Container backend driven by the `podman` or `docker` CLI.

use std::fmt;
use std::io::IsTerminal;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{
    CommandRunner, FileTransfer, InstanceAddress, InstanceInspector, InstanceLifecycle,
    ShellExecutor,
};
use crate::domain::config::NetworkMode;
use crate::domain::{InfraSettings, InfrastructureState, InstanceHandle};

/// Command that keeps an otherwise idle container alive.
const KEEPALIVE: [&str; 3] = ["/bin/sh", "-c", "tail -f /dev/null"];

/// Supported container runtimes, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Podman,
    Docker,
}

impl ContainerRuntime {
    pub const ALL: [Self; 2] = [Self::Podman, Self::Docker];

    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }

    /// Match a configured `backend_name`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rt| rt.program().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Pick the first runtime whose `--version` succeeds.
pub async fn detect_runtime(runner: &impl CommandRunner) -> Option<ContainerRuntime> {
    for rt in ContainerRuntime::ALL {
        if let Ok(output) = runner.run(rt.program(), &["--version"]).await
            && output.status.success()
        {
            tracing::debug!(runtime = %rt, "detected container runtime");
            return Some(rt);
        }
    }
    None
}

/// Container instance managed through a runtime CLI.
pub struct ContainerBackend<R> {
    runner: R,
    handle: InstanceHandle,
    runtime: ContainerRuntime,
}

impl<R: CommandRunner> ContainerBackend<R> {
    pub fn new(runner: R, handle: InstanceHandle, runtime: ContainerRuntime) -> Self {
        Self {
            runner,
            handle,
            runtime,
        }
    }

    #[must_use]
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    async fn rt(&self, args: &[&str]) -> Result<Output> {
        self.runner.run(self.runtime.program(), args).await
    }
}

impl<R: CommandRunner> InstanceInspector for ContainerBackend<R> {
    fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    fn backend_label(&self) -> String {
        self.runtime.program().to_string()
    }

    async fn is_available(&self) -> Result<bool> {
        Ok(self
            .rt(&["--version"])
            .await
            .is_ok_and(|o| o.status.success()))
    }

    async fn query_state(&self) -> Result<InfrastructureState> {
        let filter = format!("name=^{}$", self.handle.id());
        let output = self
            .rt(&[
                "ps",
                "-a",
                "--filter",
                &filter,
                "--format",
                "{{.Names}}\t{{.Status}}",
            ])
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "{} ps failed: {}",
            self.runtime,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(parse_ps_state(
            &String::from_utf8_lossy(&output.stdout),
            self.handle.id(),
        ))
    }

    async fn address(&self) -> Result<InstanceAddress> {
        let output = self
            .rt(&[
                "inspect",
                self.handle.id(),
                "--format",
                "{{.NetworkSettings.IPAddress}}",
            ])
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "{} inspect failed: {}",
            self.runtime,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        let ip = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let host = if ip.is_empty() {
            self.handle.id().to_string()
        } else {
            ip
        };
        Ok(InstanceAddress::host_only(host))
    }
}

impl<R: CommandRunner> InstanceLifecycle for ContainerBackend<R> {
    async fn launch(&self, settings: &InfraSettings) -> Result<Output> {
        let args = run_args(&self.handle, settings);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.rt(&args).await
    }

    async fn start(&self) -> Result<Output> {
        self.rt(&["start", self.handle.id()]).await
    }

    async fn halt(&self, force: bool) -> Result<Output> {
        let verb = if force { "kill" } else { "stop" };
        self.rt(&[verb, self.handle.id()]).await
    }

    async fn destroy(&self) -> Result<Output> {
        self.rt(&["rm", self.handle.id()]).await
    }
}

impl<R: CommandRunner> ShellExecutor for ContainerBackend<R> {
    async fn exec(&self, command: &str) -> Result<Output> {
        self.rt(&["exec", self.handle.id(), "/bin/sh", "-c", command])
            .await
    }

    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<Output> {
        self.runner
            .run_with_timeout(
                self.runtime.program(),
                &["exec", self.handle.id(), "/bin/sh", "-c", command],
                timeout,
            )
            .await
    }

    async fn exec_streaming(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        self.runner
            .run_streaming(
                self.runtime.program(),
                &["exec", self.handle.id(), "/bin/sh", "-c", command],
                on_line,
            )
            .await
    }

    async fn exec_interactive(&self, command: Option<&str>) -> Result<ExitStatus> {
        let tty = if std::io::stdin().is_terminal() { "-it" } else { "-i" };
        let mut args = vec!["exec", tty, self.handle.id(), "/bin/sh"];
        if let Some(cmd) = command {
            args.extend(["-c", cmd]);
        }
        self.runner.run_status(self.runtime.program(), &args).await
    }
}

impl<R: CommandRunner> FileTransfer for ContainerBackend<R> {
    async fn copy_into(&self, local: &Path, remote: &str) -> Result<Output> {
        let local = local.to_string_lossy();
        let dest = format!("{}:{remote}", self.handle.id());
        self.rt(&["cp", &local, &dest])
            .await
            .with_context(|| format!("copying {local} into {dest}"))
    }
}

// ── Parsing and argument construction ────────────────────────────────────────

/// Map `ps --format '{{.Names}}\t{{.Status}}'` output to a lifecycle state.
///
/// `Up ...` is running; stopped, exited and created containers are stopped;
/// an absent or unrecognized entry is `NotCreated`.
#[must_use]
pub fn parse_ps_state(stdout: &str, id: &str) -> InfrastructureState {
    let status = stdout.lines().find_map(|line| {
        let (name, status) = line.split_once('\t')?;
        (name.trim() == id).then(|| status.trim().to_ascii_lowercase())
    });
    match status {
        Some(s) if s.starts_with("up") => InfrastructureState::Running,
        Some(s) if ["stopped", "exited", "created"].iter().any(|m| s.contains(m)) => {
            InfrastructureState::Stopped
        }
        _ => InfrastructureState::NotCreated,
    }
}

/// Arguments for `<runtime> run` creating the instance.
#[must_use]
pub fn run_args(handle: &InstanceHandle, settings: &InfraSettings) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "-d".into(),
        "--name".into(),
        handle.id().into(),
        "--hostname".into(),
        handle.id().into(),
        "--memory".into(),
        format!("{}m", settings.memory_mb),
        "--cpus".into(),
        settings.cpu_count.to_string(),
    ];
    if settings.network_mode == NetworkMode::Bridge {
        args.extend(["--network".into(), "bridge".into()]);
    }
    if let Some(ip) = settings.static_ip {
        args.extend(["--ip".into(), ip.to_string()]);
    }
    for port in &settings.port_mappings {
        let publish = if port.auto {
            port.guest.to_string()
        } else {
            format!("{}:{}", port.host, port.guest)
        };
        args.extend(["-p".into(), publish]);
    }
    args.push(settings.image.clone());
    args.extend(KEEPALIVE.iter().map(|s| (*s).to_string()));
    args
}

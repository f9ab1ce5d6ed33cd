//! VM backend driven by the `vagrant` CLI.
//!
//! The instance id is the Vagrant machine name, so every command targets
//! exactly one machine defined in the generated `Vagrantfile`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{
    CommandRunner, FileTransfer, InstanceAddress, InstanceInspector, InstanceLifecycle,
    ShellExecutor,
};
use crate::domain::config::NetworkMode;
use crate::domain::{InfraSettings, InfrastructureState, InstanceHandle};

const VAGRANT: &str = "vagrant";

/// Oldest Vagrant release with the commands used here (`upload`, machine-readable status).
pub const MIN_VAGRANT_VERSION: semver::Version = semver::Version::new(2, 2, 0);

/// First line of every generated `Vagrantfile`.
pub const GENERATED_MARKER: &str = "# Generated by vagrantp.";

/// Vagrant-backed VM.
pub struct VagrantBackend<R> {
    runner: R,
    handle: InstanceHandle,
    project_dir: PathBuf,
    provider: String,
}

impl<R: CommandRunner> VagrantBackend<R> {
    /// `runner` must execute commands from `project_dir`.
    pub fn new(
        runner: R,
        handle: InstanceHandle,
        project_dir: impl Into<PathBuf>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            handle,
            project_dir: project_dir.into(),
            provider: provider.into(),
        }
    }

    fn vagrantfile(&self) -> PathBuf {
        self.project_dir.join("Vagrantfile")
    }

    /// Write the `Vagrantfile`, refusing to replace one we did not generate.
    fn write_vagrantfile(&self, settings: &InfraSettings) -> Result<()> {
        let path = self.vagrantfile();
        if path.exists() {
            let existing = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            anyhow::ensure!(
                existing.starts_with(GENERATED_MARKER),
                "{} exists and was not generated by vagrantp; move it aside first",
                path.display()
            );
        }
        let content = render_vagrantfile(&self.handle, &self.provider, settings);
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
    }
}

impl<R: CommandRunner> InstanceInspector for VagrantBackend<R> {
    fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    fn backend_label(&self) -> String {
        format!("vagrant ({})", self.provider)
    }

    async fn is_available(&self) -> Result<bool> {
        let output = match self.runner.run(VAGRANT, &["--version"]).await {
            Ok(o) if o.status.success() => o,
            _ => return Ok(false),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_version(&stdout) {
            Some(v) if v >= MIN_VAGRANT_VERSION => Ok(true),
            Some(v) => {
                tracing::warn!(version = %v, minimum = %MIN_VAGRANT_VERSION, "vagrant is too old");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn query_state(&self) -> Result<InfrastructureState> {
        if !self.vagrantfile().exists() {
            return Ok(InfrastructureState::NotCreated);
        }
        let output = self
            .runner
            .run(VAGRANT, &["status", self.handle.id(), "--machine-readable"])
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "vagrant status failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(parse_machine_state(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn address(&self) -> Result<InstanceAddress> {
        let output = self
            .runner
            .run(VAGRANT, &["ssh-config", self.handle.id()])
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "vagrant ssh-config failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        parse_ssh_config(&String::from_utf8_lossy(&output.stdout))
            .context("no HostName in vagrant ssh-config output")
    }
}

impl<R: CommandRunner> InstanceLifecycle for VagrantBackend<R> {
    async fn launch(&self, settings: &InfraSettings) -> Result<Output> {
        self.write_vagrantfile(settings)?;
        self.runner
            .run(
                VAGRANT,
                &["up", self.handle.id(), "--provider", &self.provider],
            )
            .await
    }

    async fn start(&self) -> Result<Output> {
        self.runner
            .run(VAGRANT, &["up", self.handle.id(), "--no-provision"])
            .await
    }

    async fn halt(&self, force: bool) -> Result<Output> {
        let id = self.handle.id();
        if force {
            self.runner.run(VAGRANT, &["halt", id, "--force"]).await
        } else {
            self.runner.run(VAGRANT, &["halt", id]).await
        }
    }

    async fn destroy(&self) -> Result<Output> {
        self.runner
            .run(VAGRANT, &["destroy", self.handle.id(), "--force"])
            .await
    }
}

impl<R: CommandRunner> ShellExecutor for VagrantBackend<R> {
    async fn exec(&self, command: &str) -> Result<Output> {
        self.runner
            .run(VAGRANT, &["ssh", self.handle.id(), "-c", command])
            .await
    }

    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<Output> {
        self.runner
            .run_with_timeout(VAGRANT, &["ssh", self.handle.id(), "-c", command], timeout)
            .await
    }

    async fn exec_streaming(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        self.runner
            .run_streaming(VAGRANT, &["ssh", self.handle.id(), "-c", command], on_line)
            .await
    }

    async fn exec_interactive(&self, command: Option<&str>) -> Result<ExitStatus> {
        let id = self.handle.id();
        match command {
            Some(cmd) => self.runner.run_status(VAGRANT, &["ssh", id, "-c", cmd]).await,
            None => self.runner.run_status(VAGRANT, &["ssh", id]).await,
        }
    }
}

impl<R: CommandRunner> FileTransfer for VagrantBackend<R> {
    async fn copy_into(&self, local: &Path, remote: &str) -> Result<Output> {
        let local = local.to_string_lossy();
        self.runner
            .run(VAGRANT, &["upload", &local, remote, self.handle.id()])
            .await
            .with_context(|| format!("uploading {local} to {remote}"))
    }
}

// ── Parsing and rendering ────────────────────────────────────────────────────

/// Extract the version from `Vagrant 2.4.1`.
#[must_use]
pub fn parse_version(stdout: &str) -> Option<semver::Version> {
    let token = stdout.split_whitespace().last()?;
    semver::Version::parse(token.trim_start_matches('v')).ok()
}

/// Map `vagrant status --machine-readable` output to a lifecycle state.
///
/// Lines look like `1700000000,web,state,running`. Halted, aborted and
/// saved machines are `Stopped`; anything unrecognized is `NotCreated`.
#[must_use]
pub fn parse_machine_state(stdout: &str) -> InfrastructureState {
    let value = stdout.lines().find_map(|line| {
        let mut fields = line.splitn(4, ',');
        let _timestamp = fields.next()?;
        let _target = fields.next()?;
        (fields.next()? == "state").then(|| fields.next())?
    });
    match value.map(str::trim) {
        Some("running") => InfrastructureState::Running,
        Some("poweroff" | "aborted" | "saved" | "halted" | "stopped" | "shutoff" | "gracefulshutdown") => {
            InfrastructureState::Stopped
        }
        _ => InfrastructureState::NotCreated,
    }
}

/// Parse `vagrant ssh-config` output into an address.
#[must_use]
pub fn parse_ssh_config(stdout: &str) -> Option<InstanceAddress> {
    let mut address = InstanceAddress::host_only(String::new());
    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once(char::is_whitespace) else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key {
            "HostName" => value.clone_into(&mut address.host),
            "Port" => address.port = value.parse().ok(),
            "User" => address.user = Some(value.to_string()),
            "IdentityFile" if address.identity_file.is_none() => {
                address.identity_file = Some(PathBuf::from(value));
            }
            _ => {}
        }
    }
    (!address.host.is_empty()).then_some(address)
}

/// Render the `Vagrantfile` defining one machine named after the instance.
#[must_use]
pub fn render_vagrantfile(handle: &InstanceHandle, provider: &str, settings: &InfraSettings) -> String {
    let id = handle.id();
    let mut out = String::new();
    let _ = writeln!(out, "{GENERATED_MARKER} Changes are overwritten by `vagrantp up`.");
    let _ = writeln!(out, "# -*- mode: ruby -*-");
    let _ = writeln!(out, "# vi: set ft=ruby :");
    let _ = writeln!(out);
    let _ = writeln!(out, "Vagrant.configure(\"2\") do |config|");
    let _ = writeln!(out, "  config.vm.define \"{id}\" do |node|");
    let _ = writeln!(out, "    node.vm.box = \"{}\"", settings.base_box);
    let _ = writeln!(out, "    node.vm.hostname = \"{id}\"");
    if let Some(disk_gb) = settings.disk_gb {
        let _ = writeln!(out, "    node.vm.disk :disk, size: \"{disk_gb}GB\", primary: true");
    }
    let _ = writeln!(out);

    match (settings.network_mode, settings.static_ip) {
        (NetworkMode::Bridge, _) => {
            let _ = writeln!(out, "    node.vm.network \"public_network\"");
        }
        (NetworkMode::Default, Some(ip)) => {
            let _ = writeln!(out, "    node.vm.network \"public_network\", ip: \"{ip}\"");
        }
        (NetworkMode::Default, None) => {
            let _ = writeln!(out, "    node.vm.network \"private_network\", type: \"dhcp\"");
        }
    }
    for port in &settings.port_mappings {
        if port.auto {
            let _ = writeln!(
                out,
                "    node.vm.network \"forwarded_port\", guest: {}, host: 0, auto_correct: true",
                port.guest
            );
        } else {
            let _ = writeln!(
                out,
                "    node.vm.network \"forwarded_port\", guest: {}, host: {}",
                port.guest, port.host
            );
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "    node.vm.provider \"{provider}\" do |p|");
    let _ = writeln!(out, "      p.memory = {}", settings.memory_mb);
    let _ = writeln!(out, "      p.cpus = {}", settings.cpu_count);
    let _ = writeln!(out, "    end");
    let _ = writeln!(out);
    let _ = writeln!(out, "    node.ssh.forward_agent = true");
    let _ = writeln!(out, "  end");
    let _ = writeln!(out, "end");
    out
}

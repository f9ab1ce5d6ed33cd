//! Ansible implementations of the `ConfigManagement` port.
//!
//! `HostAnsible` runs `ansible-playbook` on the host against a VM over SSH.
//! `ContainerAnsible` copies the playbook into a container and runs it there
//! with a local connection.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::application::ports::{
    CommandRunner, ConfigManagement, FileTransfer, InstanceAddress, PlaybookRun, ShellExecutor,
    ToolStatus,
};

const ANSIBLE: &str = "ansible";
const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";

/// Staging directory for playbooks inside a container.
pub const CONTAINER_STAGING_DIR: &str = "/tmp/vagrantp-provision";

/// Installs python and ansible with the first package manager present.
const BOOTSTRAP_SCRIPT: &str = "\
if command -v apk >/dev/null 2>&1; then apk add --no-cache python3 ansible-core; \
elif command -v apt-get >/dev/null 2>&1; then apt-get update && DEBIAN_FRONTEND=noninteractive apt-get install -y python3 ansible; \
elif command -v dnf >/dev/null 2>&1; then dnf install -y python3 ansible-core; \
elif command -v pacman >/dev/null 2>&1; then pacman -Sy --noconfirm python ansible; \
else echo 'no supported package manager found' >&2; exit 127; fi";

// ── Host ─────────────────────────────────────────────────────────────────────

/// `ansible-playbook` on the host, targeting a VM over SSH.
pub struct HostAnsible<R> {
    runner: R,
    ssh_user: Option<String>,
    ssh_key: Option<PathBuf>,
}

impl<R: CommandRunner> HostAnsible<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            ssh_user: None,
            ssh_key: None,
        }
    }

    /// Override the user and key reported by the backend.
    #[must_use]
    pub fn with_credentials(mut self, user: Option<String>, key: Option<PathBuf>) -> Self {
        self.ssh_user = user;
        self.ssh_key = key;
        self
    }

    fn inventory(&self, target: &InstanceAddress) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("vagrantp-inventory-")
            .suffix(".ini")
            .tempfile()
            .context("creating inventory file")?;
        let content = render_inventory(target, self.ssh_user.as_deref(), self.ssh_key.as_deref());
        file.write_all(content.as_bytes())
            .context("writing inventory file")?;
        file.flush().context("writing inventory file")?;
        Ok(file)
    }
}

impl<R: CommandRunner> ConfigManagement for HostAnsible<R> {
    async fn ensure_tool(&self, _auto_install: bool) -> Result<ToolStatus> {
        let present = self
            .runner
            .run(ANSIBLE_PLAYBOOK, &["--version"])
            .await
            .is_ok_and(|o| o.status.success());
        Ok(if present {
            ToolStatus::Present
        } else {
            ToolStatus::Missing
        })
    }

    async fn verify_reachable(&self, target: &InstanceAddress, timeout: Duration) -> Result<bool> {
        let inventory = self.inventory(target)?;
        let inventory_path = inventory.path().to_string_lossy().into_owned();
        let secs = timeout.as_secs().to_string();
        let output = self
            .runner
            .run_with_timeout(
                ANSIBLE,
                &["all", "-i", &inventory_path, "-m", "ping", "--timeout", &secs],
                timeout + Duration::from_secs(5),
            )
            .await?;
        Ok(output.status.success())
    }

    async fn run_playbook(
        &self,
        run: &PlaybookRun<'_>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        let inventory = self.inventory(run.target)?;
        let inventory_path = inventory.path().to_string_lossy().into_owned();
        let playbook = run.playbook.to_string_lossy().into_owned();
        let vars = run.vars.map(|v| format!("@{}", v.display()));
        let args = playbook_args(&playbook, Some(&inventory_path), vars.as_deref(), run.check_only, false);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run_streaming(ANSIBLE_PLAYBOOK, &args, on_line)
            .await
        // `inventory` is deleted when dropped here.
    }
}

/// Single-host INI inventory for an SSH target.
#[must_use]
pub fn render_inventory(target: &InstanceAddress, user: Option<&str>, key: Option<&Path>) -> String {
    let mut line = format!("target ansible_host={}", target.host);
    if let Some(port) = target.port {
        let _ = write!(line, " ansible_port={port}");
    }
    if let Some(user) = user.or(target.user.as_deref()) {
        let _ = write!(line, " ansible_user={user}");
    }
    if let Some(key) = key.or(target.identity_file.as_deref()) {
        let _ = write!(line, " ansible_ssh_private_key_file={}", key.display());
    }
    line.push_str(" ansible_ssh_common_args='-o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null'");
    format!("[vagrantp]\n{line}\n")
}

/// `ansible-playbook` arguments after the program name.
#[must_use]
pub fn playbook_args(
    playbook: &str,
    inventory: Option<&str>,
    vars: Option<&str>,
    check_only: bool,
    local: bool,
) -> Vec<String> {
    let mut args = vec![playbook.to_string()];
    match (inventory, local) {
        (Some(inv), _) => args.extend(["-i".to_string(), inv.to_string()]),
        (None, true) => args.extend(["-i".to_string(), "localhost,".to_string()]),
        (None, false) => {}
    }
    if local {
        args.extend(["-c".to_string(), "local".to_string()]);
    }
    if let Some(vars) = vars {
        args.extend(["-e".to_string(), vars.to_string()]);
    }
    if check_only {
        args.push("--check".to_string());
    }
    args
}

// ── Container ────────────────────────────────────────────────────────────────

/// `ansible-playbook` inside the container, via the runtime's exec.
pub struct ContainerAnsible<'a, B> {
    backend: &'a B,
}

impl<'a, B: ShellExecutor + FileTransfer> ContainerAnsible<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    async fn has_ansible(&self) -> bool {
        self.backend
            .exec(&format!("command -v {ANSIBLE_PLAYBOOK}"))
            .await
            .is_ok_and(|o| o.status.success())
    }

    /// Copy `local` into the staging directory, returning its in-container path.
    async fn stage(&self, local: &Path) -> Result<String> {
        let name = local
            .file_name()
            .with_context(|| format!("{} has no file name", local.display()))?
            .to_string_lossy();
        let remote = format!("{CONTAINER_STAGING_DIR}/{name}");
        let output = self.backend.copy_into(local, &remote).await?;
        anyhow::ensure!(
            output.status.success(),
            "copying {} into the container failed: {}",
            local.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(remote)
    }
}

impl<B: ShellExecutor + FileTransfer> ConfigManagement for ContainerAnsible<'_, B> {
    async fn ensure_tool(&self, auto_install: bool) -> Result<ToolStatus> {
        if self.has_ansible().await {
            return Ok(ToolStatus::Present);
        }
        if !auto_install {
            return Ok(ToolStatus::Missing);
        }
        tracing::info!("installing ansible in container");
        let output = self.backend.exec(BOOTSTRAP_SCRIPT).await?;
        anyhow::ensure!(
            output.status.success(),
            "installing ansible failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        anyhow::ensure!(
            self.has_ansible().await,
            "installation finished but {ANSIBLE_PLAYBOOK} is still missing"
        );
        Ok(ToolStatus::Installed)
    }

    async fn verify_reachable(&self, _target: &InstanceAddress, timeout: Duration) -> Result<bool> {
        let output = self.backend.exec_with_timeout("true", timeout).await?;
        Ok(output.status.success())
    }

    async fn run_playbook(
        &self,
        run: &PlaybookRun<'_>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        let output = self
            .backend
            .exec(&format!("mkdir -p {CONTAINER_STAGING_DIR}"))
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "creating {CONTAINER_STAGING_DIR} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );

        let playbook = self.stage(run.playbook).await?;
        let vars = match run.vars {
            Some(v) => Some(format!("@{}", self.stage(v).await?)),
            None => None,
        };
        let args = playbook_args(&playbook, None, vars.as_deref(), run.check_only, true);
        let command = format!(
            "cd {CONTAINER_STAGING_DIR} && {ANSIBLE_PLAYBOOK} {}",
            args.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
        );
        self.backend.exec_streaming(&command, on_line).await
    }
}

/// Single-quote `arg` for `/bin/sh` when it contains anything unusual.
fn shell_quote(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./@,:=".contains(c));
    if plain && !arg.is_empty() {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Configuration, InfraSettings, InfrastructureState, InstanceHandle, ProvisioningRecord,
};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Upper bound for reachability probes.
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(10);

// ── Value Types ───────────────────────────────────────────────────────────────

/// Where and how to reach a running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceAddress {
    /// Host name or IP. For containers without an IP this is the container name.
    pub host: String,
    /// SSH port; `None` when the target is reached through the runtime.
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
}

impl InstanceAddress {
    #[must_use]
    pub fn host_only(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: None,
            identity_file: None,
        }
    }
}

/// One configuration-management run.
pub struct PlaybookRun<'a> {
    pub playbook: &'a Path,
    pub vars: Option<&'a Path>,
    /// Check-only (dry run) semantics.
    pub check_only: bool,
    pub target: &'a InstanceAddress,
}

/// Result of making sure the configuration-management tool is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Present,
    Installed,
    Missing,
}

/// Last state written to the advisory cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedState {
    pub state: InfrastructureState,
    pub recorded_at: DateTime<Utc>,
}

// ── Backend Port Traits ───────────────────────────────────────────────────────

/// Backend state inspection.
#[allow(async_fn_in_trait)]
pub trait InstanceInspector {
    /// The instance this backend is bound to.
    fn handle(&self) -> &InstanceHandle;
    /// Short label used in messages, e.g. `vagrant (virtualbox)`.
    fn backend_label(&self) -> String;
    /// Whether the backend tooling is installed and usable.
    async fn is_available(&self) -> Result<bool>;
    /// Ask the backend for the instance state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query could not be performed. Callers
    /// normally go through `services::probe::current_state`, which maps
    /// failures to `NotCreated`.
    async fn query_state(&self) -> Result<InfrastructureState>;
    /// Resolve the network address of the instance.
    async fn address(&self) -> Result<InstanceAddress>;
}

/// Backend lifecycle primitives.
#[allow(async_fn_in_trait)]
pub trait InstanceLifecycle {
    /// Create and boot the instance from typed settings.
    async fn launch(&self, settings: &InfraSettings) -> Result<Output>;
    /// Boot a stopped instance.
    async fn start(&self) -> Result<Output>;
    /// Halt the instance. `force` selects the abrupt kill path.
    async fn halt(&self, force: bool) -> Result<Output>;
    /// Delete the instance.
    async fn destroy(&self) -> Result<Output>;
}

/// Command execution inside the instance.
#[allow(async_fn_in_trait)]
pub trait ShellExecutor {
    /// Run a shell command inside the instance and capture output.
    async fn exec(&self, command: &str) -> Result<Output>;
    /// Same as `exec`, killed after `timeout`.
    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<Output>;
    /// Run a shell command and hand each output line to `on_line` as it arrives.
    async fn exec_streaming(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus>;
    /// Open an interactive session, or run `command` with inherited stdio.
    async fn exec_interactive(&self, command: Option<&str>) -> Result<ExitStatus>;
}

/// Host-to-instance file transfer.
#[allow(async_fn_in_trait)]
pub trait FileTransfer {
    /// Copy a local file to `remote` inside the instance.
    async fn copy_into(&self, local: &Path, remote: &str) -> Result<Output>;
}

/// Composite trait: everything a lifecycle or provisioning service needs.
pub trait InstanceBackend:
    InstanceInspector + InstanceLifecycle + ShellExecutor + FileTransfer
{
}

/// Blanket implementation: any type implementing all four sub-traits is an
/// `InstanceBackend`.
impl<T> InstanceBackend for T where
    T: InstanceInspector + InstanceLifecycle + ShellExecutor + FileTransfer
{
}

// ── Configuration Management Port ─────────────────────────────────────────────

/// Playbook engine.
#[allow(async_fn_in_trait)]
pub trait ConfigManagement {
    /// Make sure the engine is usable, installing it if `auto_install` allows.
    async fn ensure_tool(&self, auto_install: bool) -> Result<ToolStatus>;
    /// Lightweight no-op against the target, bounded by `timeout`.
    async fn verify_reachable(&self, target: &InstanceAddress, timeout: Duration)
    -> Result<bool>;
    /// Run the playbook, streaming output lines to `on_line`.
    async fn run_playbook(
        &self,
        run: &PlaybookRun<'_>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program to completion and capture its output. No timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with inherited stdio and return only its exit status.
    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus>;
    /// Run a program, forwarding stdout and stderr lines to `on_line` as they arrive.
    async fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit an informational message.
    fn info(&self, message: &str);
    /// Forward one line of streamed tool output.
    fn output_line(&self, line: &str);
}

// ── Persistence Ports ─────────────────────────────────────────────────────────

/// Provisioning record persistence, scoped per instance.
pub trait ProvisioningStore {
    /// Load the raw record, if any file exists.
    fn load(&self, handle: &InstanceHandle) -> Result<Option<ProvisioningRecord>>;
    /// Persist a record.
    fn save(&self, record: &ProvisioningRecord) -> Result<()>;
    /// Delete the record. Absent records are not an error.
    fn clear(&self, handle: &InstanceHandle) -> Result<()>;

    /// `true` only when a record exists and belongs to `handle`.
    fn is_provisioned(&self, handle: &InstanceHandle) -> Result<bool> {
        Ok(self
            .load(handle)?
            .is_some_and(|record| record.is_valid_for(handle)))
    }
}

/// Advisory, display-only record of the last observed state.
pub trait StateCache {
    fn record(&self, handle: &InstanceHandle, state: InfrastructureState) -> Result<()>;
    fn last_known(&self, handle: &InstanceHandle) -> Result<Option<CachedState>>;
}

/// Declarative configuration source.
pub trait ConfigSource {
    /// Path the configuration is read from.
    fn location(&self) -> &Path;
    /// Read and parse the source.
    ///
    /// # Errors
    ///
    /// Returns `VagrantpError::ConfigNotFound` if the source is absent.
    fn load(&self) -> Result<Configuration>;
}

// ── Host Port ─────────────────────────────────────────────────────────────────

/// Host capacity facts used by preflight checks.
pub trait HostProbe {
    /// Logical CPUs available to this process, if known.
    fn available_cpus(&self) -> Option<u32>;
    /// Whether `port` is already bound on the host.
    fn port_in_use(&self, port: u16) -> bool;
}

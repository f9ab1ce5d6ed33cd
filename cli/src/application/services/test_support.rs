//! Shared test doubles for service tests.
//!
//! `FakeBackend` keeps an in-memory instance state and logs every mutating
//! call so tests can assert on backend invocations.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{
    CachedState, ConfigManagement, FileTransfer, InstanceAddress, InstanceInspector,
    InstanceLifecycle, PlaybookRun, ProgressReporter, ProvisioningStore, ShellExecutor,
    StateCache, ToolStatus,
};
use crate::domain::{
    InfraKind, InfraSettings, InfrastructureState, InstanceHandle, ProvisioningRecord,
};

/// Build an `ExitStatus` from a logical exit code (cross-platform).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn fail_output(stderr: &[u8]) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

pub fn settings(kind: InfraKind) -> InfraSettings {
    let kind_str = kind.as_str();
    let config = crate::domain::Configuration::from_pairs([
        ("infra_kind", kind_str),
        ("backend_name", "virtualbox"),
    ]);
    InfraSettings::from_config(&config).expect("test settings")
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// How `launch` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchBehavior {
    Succeed,
    /// Backend exits non-zero, instance left stopped.
    FailStopped,
    /// Backend exits non-zero but the instance came up anyway.
    FailRunning,
    /// The backend process could not be spawned.
    SpawnError,
}

pub struct FakeBackend {
    pub handle: InstanceHandle,
    pub state: Cell<InfrastructureState>,
    pub available: bool,
    pub query_fails: bool,
    pub launch: LaunchBehavior,
    pub connect_code: i32,
    /// `halt` exits non-zero and leaves the state alone.
    pub halt_fails: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeBackend {
    pub fn new(kind: InfraKind, state: InfrastructureState) -> Self {
        Self {
            handle: InstanceHandle::new("demo", kind),
            state: Cell::new(state),
            available: true,
            query_fails: false,
            launch: LaunchBehavior::Succeed,
            connect_code: 0,
            halt_fails: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn log(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }
}

impl InstanceInspector for FakeBackend {
    fn handle(&self) -> &InstanceHandle {
        &self.handle
    }
    fn backend_label(&self) -> String {
        "fake".to_string()
    }
    async fn is_available(&self) -> Result<bool> {
        Ok(self.available)
    }
    async fn query_state(&self) -> Result<InfrastructureState> {
        if self.query_fails {
            anyhow::bail!("backend unreachable");
        }
        Ok(self.state.get())
    }
    async fn address(&self) -> Result<InstanceAddress> {
        Ok(InstanceAddress::host_only("10.0.0.5"))
    }
}

impl InstanceLifecycle for FakeBackend {
    async fn launch(&self, _: &InfraSettings) -> Result<Output> {
        self.log("launch");
        match self.launch {
            LaunchBehavior::Succeed => {
                self.state.set(InfrastructureState::Running);
                Ok(ok_output(b""))
            }
            LaunchBehavior::FailStopped => {
                self.state.set(InfrastructureState::Stopped);
                Ok(fail_output(b"provider error"))
            }
            LaunchBehavior::FailRunning => {
                self.state.set(InfrastructureState::Running);
                Ok(fail_output(b"guest additions failed"))
            }
            LaunchBehavior::SpawnError => anyhow::bail!("failed to spawn backend"),
        }
    }
    async fn start(&self) -> Result<Output> {
        self.log("start");
        self.state.set(InfrastructureState::Running);
        Ok(ok_output(b""))
    }
    async fn halt(&self, force: bool) -> Result<Output> {
        self.log(if force { "halt --force" } else { "halt" });
        if self.halt_fails {
            return Ok(fail_output(b"halt refused"));
        }
        self.state.set(InfrastructureState::Stopped);
        Ok(ok_output(b""))
    }
    async fn destroy(&self) -> Result<Output> {
        self.log("destroy");
        self.state.set(InfrastructureState::NotCreated);
        Ok(ok_output(b""))
    }
}

impl ShellExecutor for FakeBackend {
    async fn exec(&self, _: &str) -> Result<Output> {
        anyhow::bail!("not expected")
    }
    async fn exec_with_timeout(&self, _: &str, _: Duration) -> Result<Output> {
        anyhow::bail!("not expected")
    }
    async fn exec_streaming(&self, _: &str, _: &mut dyn FnMut(&str)) -> Result<ExitStatus> {
        anyhow::bail!("not expected")
    }
    async fn exec_interactive(&self, command: Option<&str>) -> Result<ExitStatus> {
        match command {
            Some(cmd) => self.log(&format!("connect {cmd}")),
            None => self.log("connect"),
        }
        Ok(exit_status(self.connect_code))
    }
}

impl FileTransfer for FakeBackend {
    async fn copy_into(&self, _: &Path, _: &str) -> Result<Output> {
        anyhow::bail!("not expected")
    }
}

// ── Stores ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    pub record: RefCell<Option<ProvisioningRecord>>,
}

impl MemoryStore {
    pub fn provisioned(handle: &InstanceHandle) -> Self {
        Self {
            record: RefCell::new(Some(ProvisioningRecord::new(handle, None))),
        }
    }
}

impl ProvisioningStore for MemoryStore {
    fn load(&self, _: &InstanceHandle) -> Result<Option<ProvisioningRecord>> {
        Ok(self.record.borrow().clone())
    }
    fn save(&self, record: &ProvisioningRecord) -> Result<()> {
        *self.record.borrow_mut() = Some(record.clone());
        Ok(())
    }
    fn clear(&self, _: &InstanceHandle) -> Result<()> {
        *self.record.borrow_mut() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub history: RefCell<Vec<InfrastructureState>>,
}

impl StateCache for MemoryCache {
    fn record(&self, _: &InstanceHandle, state: InfrastructureState) -> Result<()> {
        self.history.borrow_mut().push(state);
        Ok(())
    }
    fn last_known(&self, _: &InstanceHandle) -> Result<Option<CachedState>> {
        Ok(self.history.borrow().last().map(|state| CachedState {
            state: *state,
            recorded_at: chrono::Utc::now(),
        }))
    }
}

// ── Reporter ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub messages: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.messages.borrow_mut().push(format!("step: {message}"));
    }
    fn success(&self, message: &str) {
        self.messages.borrow_mut().push(format!("success: {message}"));
    }
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(format!("warn: {message}"));
    }
    fn info(&self, message: &str) {
        self.messages.borrow_mut().push(format!("info: {message}"));
    }
    fn output_line(&self, line: &str) {
        self.messages.borrow_mut().push(format!("out: {line}"));
    }
}

// ── Config management ────────────────────────────────────────────────────────

pub struct FakeEngine {
    pub tool: ToolStatus,
    pub reachable: bool,
    pub exit_code: i32,
    pub runs: Cell<u32>,
    pub check_only_seen: Cell<bool>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            tool: ToolStatus::Present,
            reachable: true,
            exit_code: 0,
            runs: Cell::new(0),
            check_only_seen: Cell::new(false),
        }
    }
}

impl ConfigManagement for FakeEngine {
    async fn ensure_tool(&self, auto_install: bool) -> Result<ToolStatus> {
        Ok(match self.tool {
            ToolStatus::Missing if auto_install => ToolStatus::Installed,
            other => other,
        })
    }
    async fn verify_reachable(&self, _: &InstanceAddress, _: Duration) -> Result<bool> {
        Ok(self.reachable)
    }
    async fn run_playbook(
        &self,
        run: &PlaybookRun<'_>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        self.runs.set(self.runs.get() + 1);
        self.check_only_seen.set(run.check_only);
        on_line("PLAY [all]");
        Ok(exit_status(self.exit_code))
    }
}

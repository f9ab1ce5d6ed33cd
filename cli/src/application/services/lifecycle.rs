//! Instance lifecycle: create, start, stop, remove, connect, resolve address.
//!
//! Every operation probes the backend immediately before acting. The
//! advisory cache is written along the way but never read here.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::process::{ExitStatus, Output};

use anyhow::Result;

use crate::application::ports::{
    InstanceAddress, InstanceBackend, ProgressReporter, ProvisioningStore, StateCache,
};
use crate::application::services::probe;
use crate::domain::{InfraSettings, InfrastructureState, InstanceHandle, VagrantpError};

/// Outcome of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Outcome of `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
    NotCreated,
}

/// Outcome of `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotCreated,
}

/// State-aware lifecycle operations over one backend.
pub struct Lifecycle<'a, B, S, C, R> {
    backend: &'a B,
    store: &'a S,
    cache: &'a C,
    reporter: &'a R,
}

impl<'a, B, S, C, R> Lifecycle<'a, B, S, C, R>
where
    B: InstanceBackend,
    S: ProvisioningStore,
    C: StateCache,
    R: ProgressReporter,
{
    pub fn new(backend: &'a B, store: &'a S, cache: &'a C, reporter: &'a R) -> Self {
        Self {
            backend,
            store,
            cache,
            reporter,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &InstanceHandle {
        self.backend.handle()
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        self.backend
    }

    #[must_use]
    pub fn store(&self) -> &S {
        self.store
    }

    #[must_use]
    pub fn reporter(&self) -> &R {
        self.reporter
    }

    /// Live backend state, recorded in the advisory cache.
    pub async fn current_state(&self) -> InfrastructureState {
        let state = probe::current_state(self.backend).await;
        self.note(state);
        state
    }

    /// Create the instance from `settings`.
    ///
    /// If the backend reports `Running` after a failed create, the instance is
    /// force-halted. When that halt fails too, the error says so.
    ///
    /// # Errors
    ///
    /// `InfrastructureExists` if the instance is present, `BackendNotAvailable`
    /// if the backend tooling is missing, `General` if the backend fails.
    pub async fn create(&self, settings: &InfraSettings) -> Result<()> {
        let handle = self.handle();
        let state = probe::current_state(self.backend).await;
        if state != InfrastructureState::NotCreated {
            return Err(VagrantpError::InfrastructureExists {
                id: handle.id().to_string(),
                state,
            }
            .into());
        }
        if !self.backend.is_available().await.unwrap_or(false) {
            return Err(VagrantpError::BackendNotAvailable {
                backend: self.backend.backend_label(),
            }
            .into());
        }

        // A new instance starts a new provisioning epoch.
        self.store.clear(handle)?;
        self.note(InfrastructureState::Creating);
        self.reporter.step(&format!(
            "Creating {} '{}'...",
            handle.kind().noun(),
            handle.id()
        ));
        tracing::info!(instance = handle.id(), kind = %handle.kind(), "creating instance");

        let launched = match self.backend.launch(settings).await {
            Ok(output) => check_output(&output, "launch"),
            Err(e) => Err(e.to_string()),
        };
        let after = probe::current_state(self.backend).await;

        match launched {
            Ok(()) if after == InfrastructureState::Running => {
                self.note(after);
                self.reporter
                    .success(&format!("{} '{}' is running", handle.kind().noun(), handle.id()));
                Ok(())
            }
            Ok(()) => {
                self.note(after);
                Err(VagrantpError::general_with(
                    format!(
                        "Backend reported success but '{}' is {after}",
                        handle.id()
                    ),
                    "Run 'vagrantp status' and retry with 'vagrantp up'",
                )
                .into())
            }
            Err(detail) if after != InfrastructureState::Running => {
                self.note(after);
                Err(VagrantpError::general_with(
                    format!("Failed to create '{}': {detail}", handle.id()),
                    "Fix the problem above, then run 'vagrantp up' again",
                )
                .into())
            }
            Err(detail) => {
                tracing::warn!(instance = handle.id(), "create failed but instance is running, halting");
                let halted = match self.backend.halt(true).await {
                    Ok(output) => check_output(&output, "halt"),
                    Err(e) => Err(e.to_string()),
                };
                match halted {
                    Ok(()) => {
                        self.note(InfrastructureState::Stopped);
                        Err(VagrantpError::general_with(
                            format!("Failed to create '{}': {detail}", handle.id()),
                            "Fix the problem above, then run 'vagrantp up' again",
                        )
                        .into())
                    }
                    Err(halt_detail) => {
                        tracing::error!(instance = handle.id(), error = %halt_detail, "halt after failed create failed");
                        self.note(probe::current_state(self.backend).await);
                        Err(VagrantpError::general_with(
                            format!(
                                "Failed to create '{}': {detail}. Halting it also failed and it may still be running: {halt_detail}",
                                handle.id()
                            ),
                            "Run 'vagrantp stop --force', then 'vagrantp up' again",
                        )
                        .into())
                    }
                }
            }
        }
    }

    /// Boot a stopped instance.
    ///
    /// # Errors
    ///
    /// `General` if the instance does not exist or the backend fails.
    pub async fn start(&self) -> Result<StartOutcome> {
        let handle = self.handle();
        match probe::current_state(self.backend).await {
            InfrastructureState::Running => {
                self.note(InfrastructureState::Running);
                return Ok(StartOutcome::AlreadyRunning);
            }
            InfrastructureState::Stopped => {}
            other => {
                return Err(VagrantpError::general_with(
                    format!("Infrastructure '{}' does not exist (state: {other})", handle.id()),
                    "Run 'vagrantp up' to create it",
                )
                .into());
            }
        }

        self.reporter
            .step(&format!("Starting {} '{}'...", handle.kind().noun(), handle.id()));
        tracing::info!(instance = handle.id(), "starting instance");
        let output = self.backend.start().await?;
        check_output(&output, "start").map_err(|detail| {
            VagrantpError::general(format!("Failed to start '{}': {detail}", handle.id()))
        })?;
        self.note(InfrastructureState::Running);
        Ok(StartOutcome::Started)
    }

    /// Halt the instance. `force` uses the abrupt kill path.
    ///
    /// # Errors
    ///
    /// `General` if the backend fails to halt the instance.
    pub async fn stop(&self, force: bool) -> Result<StopOutcome> {
        let handle = self.handle();
        match probe::current_state(self.backend).await {
            InfrastructureState::NotCreated => return Ok(StopOutcome::NotCreated),
            InfrastructureState::Stopped => {
                self.note(InfrastructureState::Stopped);
                return Ok(StopOutcome::AlreadyStopped);
            }
            _ => {}
        }

        self.reporter
            .step(&format!("Stopping {} '{}'...", handle.kind().noun(), handle.id()));
        tracing::info!(instance = handle.id(), force, "stopping instance");
        self.halt(force).await?;
        Ok(StopOutcome::Stopped)
    }

    /// Delete the instance and its provisioning record.
    ///
    /// A running instance is halted first, gracefully unless `force`.
    ///
    /// # Errors
    ///
    /// `General` if halting or destroying fails.
    pub async fn remove(&self, force: bool) -> Result<RemoveOutcome> {
        let handle = self.handle();
        let state = probe::current_state(self.backend).await;
        if state == InfrastructureState::NotCreated {
            self.store.clear(handle)?;
            self.note(InfrastructureState::NotCreated);
            return Ok(RemoveOutcome::NotCreated);
        }

        self.reporter
            .step(&format!("Removing {} '{}'...", handle.kind().noun(), handle.id()));
        tracing::info!(instance = handle.id(), force, %state, "removing instance");
        if state == InfrastructureState::Running {
            self.halt(force).await?;
        }

        self.note(InfrastructureState::Removing);
        let output = self.backend.destroy().await?;
        check_output(&output, "destroy").map_err(|detail| {
            VagrantpError::general(format!("Failed to remove '{}': {detail}", handle.id()))
        })?;
        self.store.clear(handle)?;
        self.note(InfrastructureState::NotCreated);
        Ok(RemoveOutcome::Removed)
    }

    /// Open an interactive session, or run a single command.
    ///
    /// # Errors
    ///
    /// `General` unless the instance is running.
    pub async fn connect(&self, command: Option<&str>) -> Result<ExitStatus> {
        self.require_running().await?;
        tracing::debug!(instance = self.handle().id(), ?command, "connecting");
        self.backend.exec_interactive(command).await
    }

    /// Address used to reach the running instance.
    ///
    /// # Errors
    ///
    /// `General` unless the instance is running or if the backend cannot
    /// resolve an address.
    pub async fn resolve_address(&self) -> Result<InstanceAddress> {
        self.require_running().await?;
        self.backend.address().await
    }

    async fn require_running(&self) -> Result<()> {
        let handle = self.handle();
        let state = probe::current_state(self.backend).await;
        if state != InfrastructureState::Running {
            return Err(VagrantpError::general_with(
                format!("Infrastructure '{}' is not running (state: {state})", handle.id()),
                "Run 'vagrantp up' first",
            )
            .into());
        }
        Ok(())
    }

    async fn halt(&self, force: bool) -> Result<()> {
        let handle = self.handle();
        let output = self.backend.halt(force).await?;
        check_output(&output, "halt").map_err(|detail| {
            VagrantpError::general_with(
                format!("Failed to stop '{}': {detail}", handle.id()),
                "Retry with --force",
            )
        })?;
        self.note(InfrastructureState::Stopped);
        Ok(())
    }

    fn note(&self, state: InfrastructureState) {
        if let Err(e) = self.cache.record(self.handle(), state) {
            tracing::debug!(error = %e, "failed to update state cache");
        }
    }
}

/// `Ok` for a zero exit, otherwise the trimmed stderr (or a generic message).
fn check_output(output: &Output, action: &str) -> Result<(), String> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(match output.status.code() {
            Some(code) => format!("{action} exited with code {code}"),
            None => format!("{action} was terminated by a signal"),
        })
    } else {
        Err(stderr.to_string())
    }
}

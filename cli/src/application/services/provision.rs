//! Provisioning use-case: run a playbook against the live instance at most
//! once per instance lifetime.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::application::ports::{
    ConfigManagement, InstanceBackend, PlaybookRun, ProgressReporter, ProvisioningStore,
    REACHABILITY_TIMEOUT, StateCache, ToolStatus,
};
use crate::application::services::lifecycle::Lifecycle;
use crate::domain::{InfraKind, ProvisioningRecord, VagrantpError};

/// Inputs for one provisioning attempt.
pub struct ProvisionRequest<'a> {
    pub playbook: &'a Path,
    pub vars: Option<&'a Path>,
    /// Check-only run; no record is written.
    pub dry_run: bool,
    pub auto_bootstrap: bool,
    /// SHA-256 of the playbook file, if it could be read.
    pub playbook_sha256: Option<String>,
}

/// What `execute` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A record for this instance already exists; nothing ran.
    AlreadyProvisioned,
    /// Prerequisites are missing and may not be installed.
    Skipped { reason: String },
    /// The playbook ran to a zero exit.
    Completed { dry_run: bool, elapsed: Duration },
}

/// Run the provisioning protocol.
///
/// The record check comes first so a provisioned instance sees no remote
/// side effects at all.
///
/// # Errors
///
/// `ProvisioningFailed` when the instance is not running, a container is
/// unreachable, or the playbook exits non-zero. `BackendNotAvailable` when
/// the host playbook tool is missing for a VM target.
pub async fn execute<B, S, C, R>(
    lifecycle: &Lifecycle<'_, B, S, C, R>,
    engine: &impl ConfigManagement,
    request: &ProvisionRequest<'_>,
) -> Result<ProvisionOutcome>
where
    B: InstanceBackend,
    S: ProvisioningStore,
    C: StateCache,
    R: ProgressReporter,
{
    let handle = lifecycle.handle();
    let store = lifecycle.store();
    let reporter = lifecycle.reporter();

    // 1. Idempotency.
    if store.is_provisioned(handle)? {
        if let Some(record) = store.load(handle)?
            && record.playbook_changed(request.playbook_sha256.as_deref())
        {
            reporter.warn(
                "Playbook changed since the last provisioning run; \
                 run 'vagrantp rm' and 'vagrantp up' to re-provision",
            );
        }
        tracing::debug!(instance = handle.id(), "already provisioned, skipping");
        return Ok(ProvisionOutcome::AlreadyProvisioned);
    }

    // 2. Target.
    let target = lifecycle
        .resolve_address()
        .await
        .map_err(|e| VagrantpError::ProvisioningFailed {
            details: e.to_string(),
            exit_code: None,
        })?;
    tracing::debug!(instance = handle.id(), host = %target.host, "provisioning target");

    // 3. Tooling.
    match (handle.kind(), engine.ensure_tool(request.auto_bootstrap).await) {
        (_, Ok(ToolStatus::Present)) => {}
        (_, Ok(ToolStatus::Installed)) => reporter.success("Installed ansible in the container"),
        (InfraKind::Container, Ok(ToolStatus::Missing)) => {
            return Ok(ProvisionOutcome::Skipped {
                reason: "ansible is not installed in the container and \
                         auto_bootstrap_config_mgmt is disabled"
                    .to_string(),
            });
        }
        (InfraKind::Vm, Ok(ToolStatus::Missing)) => {
            return Err(VagrantpError::BackendNotAvailable {
                backend: "ansible-playbook".to_string(),
            }
            .into());
        }
        (_, Err(e)) => reporter.warn(&format!("Could not prepare ansible: {e}")),
    }

    // 4. Reachability.
    let reachable = engine
        .verify_reachable(&target, REACHABILITY_TIMEOUT)
        .await
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, "reachability probe failed");
            false
        });
    if !reachable {
        match handle.kind() {
            InfraKind::Vm => reporter.warn(&format!(
                "{} is not answering yet; attempting provisioning anyway",
                target.host
            )),
            InfraKind::Container => {
                return Err(VagrantpError::ProvisioningFailed {
                    details: format!("container '{}' is not reachable", handle.id()),
                    exit_code: None,
                }
                .into());
            }
        }
    }

    // 5. Run.
    reporter.step(&format!(
        "Running playbook {}{}...",
        request.playbook.display(),
        if request.dry_run { " (check mode)" } else { "" }
    ));
    let started = Instant::now();
    let run = PlaybookRun {
        playbook: request.playbook,
        vars: request.vars,
        check_only: request.dry_run,
        target: &target,
    };
    let status = engine
        .run_playbook(&run, &mut |line: &str| reporter.output_line(line))
        .await
        .map_err(|e| VagrantpError::ProvisioningFailed {
            details: e.to_string(),
            exit_code: None,
        })?;
    if !status.success() {
        let details = match status.code() {
            Some(code) => format!("playbook exited with code {code}"),
            None => "playbook was terminated by a signal".to_string(),
        };
        return Err(VagrantpError::ProvisioningFailed {
            details,
            exit_code: status.code(),
        }
        .into());
    }

    // 6. Record.
    if !request.dry_run {
        store.save(&ProvisioningRecord::new(
            handle,
            request.playbook_sha256.clone(),
        ))?;
    }
    Ok(ProvisionOutcome::Completed {
        dry_run: request.dry_run,
        elapsed: started.elapsed(),
    })
}

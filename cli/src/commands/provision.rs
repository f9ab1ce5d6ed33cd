//! `vagrantp provision [--check]` — run the configured playbook.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::{AppContext, Project};
use crate::application::ports::ProgressReporter;
use crate::application::services::config::{ValidatedConfig, resolve_path};
use crate::application::services::lifecycle::Lifecycle;
use crate::application::services::provision::{self, ProvisionOutcome, ProvisionRequest};
use crate::domain::InfraKind;
use crate::domain::provisioning::sha256_hex;
use crate::infra::ansible::{ContainerAnsible, HostAnsible};
use crate::infra::backend::Backend;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::state::StateCacheFile;
use crate::infra::store::ProvisioningFileStore;
use crate::output::TerminalReporter;

/// Arguments for the provision command.
#[derive(Args)]
pub struct ProvisionArgs {
    /// Check mode: report what would change without changing it
    #[arg(long)]
    pub check: bool,
}

/// Run `vagrantp provision`.
///
/// # Errors
///
/// Configuration errors, or any provisioning failure.
pub async fn run(app: &AppContext, args: &ProvisionArgs) -> Result<ExitCode> {
    let reporter = TerminalReporter::new(&app.output);
    let (validated, project) = app.open_project(&reporter).await?;
    if validated.settings.provisioning.playbook.is_none() {
        app.output
            .info("No playbook configured. Set playbook_path in .env to enable provisioning.");
        return Ok(ExitCode::SUCCESS);
    }
    let lifecycle = project.lifecycle(&reporter);
    provision_instance(app, &validated, &project, &lifecycle, args.check).await?;
    Ok(ExitCode::SUCCESS)
}

/// Lifecycle over the production backend and stores.
pub type ProjectLifecycle<'a, R> =
    Lifecycle<'a, Backend<TokioCommandRunner>, ProvisioningFileStore, StateCacheFile, R>;

/// Provision the project's instance with the engine matching its kind.
///
/// Does nothing when no playbook is configured.
///
/// # Errors
///
/// `ProvisioningFailed`, or `BackendNotAvailable` when the host has no
/// `ansible-playbook` for a VM.
pub async fn provision_instance<R: ProgressReporter>(
    app: &AppContext,
    validated: &ValidatedConfig,
    project: &Project,
    lifecycle: &ProjectLifecycle<'_, R>,
    dry_run: bool,
) -> Result<()> {
    let settings = &validated.settings.provisioning;
    let Some(playbook) = settings.playbook.as_deref() else {
        return Ok(());
    };
    let request = ProvisionRequest {
        playbook,
        vars: settings.vars.as_deref(),
        dry_run,
        auto_bootstrap: settings.auto_bootstrap,
        playbook_sha256: std::fs::read(playbook).ok().map(|b| sha256_hex(&b)),
    };

    let outcome = match project.handle.kind() {
        InfraKind::Vm => {
            let key = settings
                .ssh_key
                .as_deref()
                .map(|k| resolve_path(&app.project_dir, k));
            let engine = HostAnsible::new(TokioCommandRunner::in_dir(&app.project_dir))
                .with_credentials(settings.ssh_user.clone(), key);
            provision::execute(lifecycle, &engine, &request).await?
        }
        InfraKind::Container => {
            let engine = ContainerAnsible::new(&project.backend);
            provision::execute(lifecycle, &engine, &request).await?
        }
    };

    let ctx = &app.output;
    match outcome {
        ProvisionOutcome::AlreadyProvisioned => {
            ctx.info("Already provisioned. Run 'vagrantp rm' then 'vagrantp up' to start over.");
        }
        ProvisionOutcome::Skipped { reason } => {
            ctx.info(&format!("Provisioning skipped: {reason}"));
        }
        ProvisionOutcome::Completed { dry_run: true, elapsed } => {
            ctx.success(&format!(
                "Check run finished in {}s (no record written)",
                elapsed.as_secs()
            ));
        }
        ProvisionOutcome::Completed { elapsed, .. } => {
            ctx.success(&format!("Provisioned in {}s", elapsed.as_secs()));
        }
    }
    Ok(())
}

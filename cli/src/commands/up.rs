//! `vagrantp up [--dry-run] [--no-provision]` — create or start the
//! instance, then provision it.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::config::ValidatedConfig;
use crate::application::services::lifecycle::StartOutcome;
use crate::application::services::preflight;
use crate::commands::provision::provision_instance;
use crate::domain::config::NetworkMode;
use crate::domain::{InfraKind, InfrastructureState, VagrantpError};
use crate::infra::network::SystemHostProbe;
use crate::output::{OutputContext, TerminalReporter};

/// Arguments for the up command.
#[derive(Args)]
pub struct UpArgs {
    /// Validate the configuration and show what would be created
    #[arg(long)]
    pub dry_run: bool,

    /// Skip provisioning even when a playbook is configured
    #[arg(long)]
    pub no_provision: bool,
}

/// Run `vagrantp up`.
///
/// # Errors
///
/// Configuration errors, `InfrastructureExists` when the instance is already
/// running, preflight failures, and lifecycle or provisioning failures.
pub async fn run(app: &AppContext, args: &UpArgs) -> Result<ExitCode> {
    let ctx = &app.output;
    let reporter = TerminalReporter::new(ctx);

    if args.dry_run {
        let validated = app.load_config(&reporter)?;
        print_summary(ctx, &validated);
        ctx.success("Configuration is valid. Dry run: nothing was created.");
        return Ok(ExitCode::SUCCESS);
    }

    let (validated, project) = app.open_project(&reporter).await?;
    let lifecycle = project.lifecycle(&reporter);
    let handle = &project.handle;
    let settings = &validated.settings;

    match lifecycle.current_state().await {
        InfrastructureState::Running => {
            return Err(VagrantpError::InfrastructureExists {
                id: handle.id().to_string(),
                state: InfrastructureState::Running,
            }
            .into());
        }
        InfrastructureState::Stopped => {
            if lifecycle.start().await? == StartOutcome::Started {
                ctx.success(&format!("{} '{}' started", handle.kind().noun(), handle.id()));
            }
        }
        _ => {
            preflight::check(settings, &SystemHostProbe)?;
            lifecycle.create(settings).await?;
        }
    }

    if args.no_provision {
        if settings.provisioning.playbook.is_some() {
            ctx.info("Provisioning skipped (--no-provision)");
        }
    } else {
        provision_instance(app, &validated, &project, &lifecycle, false).await?;
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(ctx: &OutputContext, validated: &ValidatedConfig) {
    let settings = &validated.settings;
    let handle = &validated.handle;
    ctx.header(&format!("{} '{}'", handle.kind().noun(), handle.id()));
    ctx.kv("kind", handle.kind().as_str());
    if let Some(backend) = &settings.backend_name {
        ctx.kv("backend", backend);
    }
    ctx.kv("memory", &format!("{} MB", settings.memory_mb));
    ctx.kv("cpus", &settings.cpu_count.to_string());
    if let Some(disk) = settings.disk_gb {
        ctx.kv("disk", &format!("{disk} GB"));
    }
    match handle.kind() {
        InfraKind::Vm => ctx.kv("box", &settings.base_box),
        InfraKind::Container => ctx.kv("image", &settings.image),
    }
    if settings.network_mode == NetworkMode::Bridge {
        ctx.kv("network", "bridge");
    }
    if let Some(ip) = settings.static_ip {
        ctx.kv("ip", &ip.to_string());
    }
    for port in &settings.port_mappings {
        let host = if port.auto {
            "auto".to_string()
        } else {
            port.host.to_string()
        };
        ctx.kv("port", &format!("{host} → {}", port.guest));
    }
    if let Some(playbook) = &settings.provisioning.playbook {
        ctx.kv("playbook", &playbook.display().to_string());
    }
}

//! `vagrantp stop [--force]` — halt the instance, keeping its disk.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::lifecycle::StopOutcome;
use crate::output::TerminalReporter;

/// Arguments for the stop command.
#[derive(Args)]
pub struct StopArgs {
    /// Kill instead of shutting down gracefully
    #[arg(short, long)]
    pub force: bool,
}

/// Run `vagrantp stop`.
///
/// # Errors
///
/// Returns an error if the instance cannot be stopped.
pub async fn run(app: &AppContext, args: &StopArgs) -> Result<ExitCode> {
    let ctx = &app.output;
    let reporter = TerminalReporter::new(ctx);
    let project = app.open_instance().await?;
    let handle = &project.handle;

    match project.lifecycle(&reporter).stop(args.force).await? {
        StopOutcome::NotCreated => {
            ctx.info(&format!("No {} '{}' to stop.", handle.kind().noun(), handle.id()));
            ctx.info("Create one: vagrantp up");
        }
        StopOutcome::AlreadyStopped => {
            ctx.info(&format!("'{}' is already stopped.", handle.id()));
        }
        StopOutcome::Stopped => {
            ctx.success(&format!("'{}' stopped.", handle.id()));
            ctx.info("Resume: vagrantp up");
        }
    }
    Ok(ExitCode::SUCCESS)
}

//! `vagrantp rm [--force]` — remove the instance and its provisioning record.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::lifecycle::RemoveOutcome;
use crate::domain::InfrastructureState;
use crate::output::TerminalReporter;

/// Arguments for the rm command.
#[derive(Args)]
pub struct RmArgs {
    /// Kill a running instance instead of shutting it down, and do not ask
    #[arg(short, long)]
    pub force: bool,
}

/// Run `vagrantp rm`.
///
/// # Errors
///
/// Returns an error if the instance cannot be removed or the prompt fails.
pub async fn run(app: &AppContext, args: &RmArgs) -> Result<ExitCode> {
    let ctx = &app.output;
    let reporter = TerminalReporter::new(ctx);
    let project = app.open_instance().await?;
    let lifecycle = project.lifecycle(&reporter);
    let handle = &project.handle;

    if !args.force && lifecycle.current_state().await != InfrastructureState::NotCreated {
        let prompt = format!(
            "Remove {} '{}'? Its data will be lost.",
            handle.kind().noun(),
            handle.id()
        );
        if !app.confirm(&prompt, true)? {
            ctx.info("Cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    match lifecycle.remove(args.force).await? {
        RemoveOutcome::NotCreated => {
            ctx.info(&format!("No {} '{}' to remove.", handle.kind().noun(), handle.id()));
        }
        RemoveOutcome::Removed => {
            ctx.success(&format!("'{}' removed.", handle.id()));
            ctx.info("Create new: vagrantp up");
        }
    }
    Ok(ExitCode::SUCCESS)
}

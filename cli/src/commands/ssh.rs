//! `vagrantp ssh [--command=STR]` — shell into the instance.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::output::TerminalReporter;

/// Arguments for the ssh command.
#[derive(Args)]
pub struct SshArgs {
    /// Run this command instead of an interactive shell
    #[arg(short, long, value_name = "STR")]
    pub command: Option<String>,
}

/// Run `vagrantp ssh`. The remote exit code becomes ours.
///
/// # Errors
///
/// `General` unless the instance is running.
pub async fn run(app: &AppContext, args: &SshArgs) -> Result<ExitCode> {
    let reporter = TerminalReporter::new(&app.output);
    let project = app.open_instance().await?;
    let status = project
        .lifecycle(&reporter)
        .connect(args.command.as_deref())
        .await?;
    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}

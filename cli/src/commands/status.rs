//! `vagrantp status` — live state, last recorded state, provisioning record.

use std::process::ExitCode;

use anyhow::Result;
use owo_colors::OwoColorize as _;

use crate::app::AppContext;
use crate::application::ports::{InstanceInspector, ProvisioningStore, StateCache};
use crate::output::{TerminalReporter, progress};

/// Run `vagrantp status`.
///
/// # Errors
///
/// Configuration errors. Probe failures are shown as `not_created`.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let ctx = &app.output;
    let reporter = TerminalReporter::new(ctx);
    let project = app.open_instance().await?;
    let handle = &project.handle;

    // Read before probing: the probe refreshes the cache.
    let cached = project.cache.last_known(handle).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "state cache unreadable");
        None
    });

    let pb = progress::spinner_if(ctx.show_progress(), "Querying backend...");
    let state = project.lifecycle(&reporter).current_state().await;
    progress::finish_clear(&pb);

    ctx.header(&format!("{} '{}'", handle.kind().noun(), handle.id()));
    ctx.kv("backend", &project.backend.backend_label());
    ctx.kv("state", &state.style(ctx.styles.state(state)).to_string());
    if let Some(cached) = cached {
        ctx.kv(
            "last recorded",
            &format!(
                "{} at {}",
                cached.state,
                cached.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        );
    }

    let provisioned = match project.store.load(handle)? {
        Some(record) if record.is_valid_for(handle) => match record.provisioned_at {
            Some(at) => format!("yes ({})", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => "yes".to_string(),
        },
        _ => "no".to_string(),
    };
    ctx.kv("provisioned", &provisioned);
    Ok(ExitCode::SUCCESS)
}

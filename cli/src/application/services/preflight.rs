//! Host checks run before creating an instance.

use crate::application::ports::HostProbe;
use crate::domain::{InfraSettings, VagrantpError};

/// Verify the host can satisfy the requested CPUs and fixed host ports.
///
/// # Errors
///
/// `InsufficientResources` when more CPUs are requested than the host has,
/// `PortConflict` for the first fixed host port already bound.
pub fn check(settings: &InfraSettings, host: &impl HostProbe) -> Result<(), VagrantpError> {
    if let Some(available) = host.available_cpus()
        && settings.cpu_count > available
    {
        return Err(VagrantpError::InsufficientResources {
            resource: "CPUs".to_string(),
            needed: settings.cpu_count.to_string(),
            available: available.to_string(),
        });
    }

    for mapping in settings.port_mappings.iter().filter(|m| !m.auto) {
        if host.port_in_use(mapping.host) {
            return Err(VagrantpError::PortConflict { port: mapping.host });
        }
    }
    Ok(())
}

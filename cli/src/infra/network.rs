//! Host facts for preflight checks.

use std::io;
use std::net::{Ipv4Addr, TcpListener};

use crate::application::ports::HostProbe;

/// Production `HostProbe` backed by std.
pub struct SystemHostProbe;

impl HostProbe for SystemHostProbe {
    fn available_cpus(&self) -> Option<u32> {
        std::thread::available_parallelism()
            .ok()
            .and_then(|n| u32::try_from(n.get()).ok())
    }

    fn port_in_use(&self, port: u16) -> bool {
        // Port 0 would bind an ephemeral port and always succeed.
        port != 0
            && match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
                Ok(_) => false,
                Err(e) => {
                    tracing::debug!(port, error = %e, "test bind failed");
                    is_conflict(&e)
                }
            }
    }
}

/// Only an occupied port is a conflict. A privileged port the user may not
/// bind is still free for the backend's own forwarder.
fn is_conflict(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::AddrInUse
}

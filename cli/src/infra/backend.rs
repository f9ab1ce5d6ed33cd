//! Backend selection: one variant per infrastructure kind, chosen once from
//! the instance kind and the optional `backend_name`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{
    CommandRunner, FileTransfer, InstanceAddress, InstanceInspector, InstanceLifecycle,
    ShellExecutor,
};
use crate::domain::{InfraKind, InfraSettings, InfrastructureState, InstanceHandle, VagrantpError};
use crate::infra::container::{ContainerBackend, ContainerRuntime, detect_runtime};
use crate::infra::vagrant::VagrantBackend;

/// Provider used when a VM configuration names none.
pub const DEFAULT_VM_PROVIDER: &str = "virtualbox";

/// The concrete backend for this invocation.
pub enum Backend<R> {
    Vm(VagrantBackend<R>),
    Container(ContainerBackend<R>),
}

impl<R: CommandRunner> Backend<R> {
    /// Build the backend for `handle.kind()`.
    ///
    /// Containers use the runtime named by `backend_name`, otherwise the
    /// first of podman or docker that is installed.
    ///
    /// # Errors
    ///
    /// `BackendNotAvailable` when no usable container runtime is found or
    /// `backend_name` names an unsupported one.
    pub async fn select(
        runner: R,
        handle: InstanceHandle,
        backend_name: Option<&str>,
        project_dir: &Path,
    ) -> Result<Self> {
        match handle.kind() {
            InfraKind::Vm => {
                let provider = backend_name.unwrap_or(DEFAULT_VM_PROVIDER).to_string();
                Ok(Self::Vm(VagrantBackend::new(
                    runner,
                    handle,
                    PathBuf::from(project_dir),
                    provider,
                )))
            }
            InfraKind::Container => {
                let runtime = match backend_name {
                    Some(name) => ContainerRuntime::from_name(name).ok_or_else(|| {
                        VagrantpError::BackendNotAvailable {
                            backend: name.to_string(),
                        }
                    })?,
                    None => detect_runtime(&runner).await.ok_or_else(|| {
                        VagrantpError::BackendNotAvailable {
                            backend: "podman or docker".to_string(),
                        }
                    })?,
                };
                Ok(Self::Container(ContainerBackend::new(runner, handle, runtime)))
            }
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {
        match $self {
            Self::Vm(b) => b.$method($($arg),*).await,
            Self::Container(b) => b.$method($($arg),*).await,
        }
    };
}

impl<R: CommandRunner> InstanceInspector for Backend<R> {
    fn handle(&self) -> &InstanceHandle {
        match self {
            Self::Vm(b) => b.handle(),
            Self::Container(b) => b.handle(),
        }
    }

    fn backend_label(&self) -> String {
        match self {
            Self::Vm(b) => b.backend_label(),
            Self::Container(b) => b.backend_label(),
        }
    }

    async fn is_available(&self) -> Result<bool> {
        dispatch!(self, is_available())
    }

    async fn query_state(&self) -> Result<InfrastructureState> {
        dispatch!(self, query_state())
    }

    async fn address(&self) -> Result<InstanceAddress> {
        dispatch!(self, address())
    }
}

impl<R: CommandRunner> InstanceLifecycle for Backend<R> {
    async fn launch(&self, settings: &InfraSettings) -> Result<Output> {
        dispatch!(self, launch(settings))
    }

    async fn start(&self) -> Result<Output> {
        dispatch!(self, start())
    }

    async fn halt(&self, force: bool) -> Result<Output> {
        dispatch!(self, halt(force))
    }

    async fn destroy(&self) -> Result<Output> {
        dispatch!(self, destroy())
    }
}

impl<R: CommandRunner> ShellExecutor for Backend<R> {
    async fn exec(&self, command: &str) -> Result<Output> {
        dispatch!(self, exec(command))
    }

    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<Output> {
        dispatch!(self, exec_with_timeout(command, timeout))
    }

    async fn exec_streaming(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitStatus> {
        dispatch!(self, exec_streaming(command, on_line))
    }

    async fn exec_interactive(&self, command: Option<&str>) -> Result<ExitStatus> {
        dispatch!(self, exec_interactive(command))
    }
}

impl<R: CommandRunner> FileTransfer for Backend<R> {
    async fn copy_into(&self, local: &Path, remote: &str) -> Result<Output> {
        dispatch!(self, copy_into(local, remote))
    }
}

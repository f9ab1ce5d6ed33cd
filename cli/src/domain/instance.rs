//! Instance identity and lifecycle state.
//!
//! Pure types only. The authoritative state is always obtained from the
//! backend by the probe service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which kind of backend owns the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfraKind {
    Vm,
    Container,
}

impl InfraKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Container => "container",
        }
    }

    /// Human noun used in progress messages.
    #[must_use]
    pub fn noun(self) -> &'static str {
        match self {
            Self::Vm => "VM",
            Self::Container => "Container",
        }
    }
}

impl fmt::Display for InfraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfraKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vm" => Ok(Self::Vm),
            "container" => Ok(Self::Container),
            other => Err(format!(
                "infra_kind must be 'vm' or 'container', got: {other}"
            )),
        }
    }
}

/// Lifecycle state of an instance.
///
/// Backends only ever report `NotCreated`, `Running` or `Stopped`.
/// `Creating` and `Removing` are written to the advisory cache by the
/// lifecycle orchestrator while an operation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfrastructureState {
    NotCreated,
    Creating,
    Running,
    Stopped,
    Removing,
}

impl InfrastructureState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotCreated => "not_created",
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Removing => "removing",
        }
    }

    /// `true` for the in-flight markers that a backend never reports.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Creating | Self::Removing)
    }
}

impl fmt::Display for InfrastructureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier plus backend kind of the single managed instance.
///
/// Built once per invocation from the project configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    id: String,
    kind: InfraKind,
}

impl InstanceHandle {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: InfraKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Derive the handle from an explicit `infra_id` or the project directory name.
    #[must_use]
    pub fn resolve(explicit_id: Option<&str>, project_dir_name: Option<&str>, kind: InfraKind) -> Self {
        let raw = explicit_id
            .filter(|s| !s.trim().is_empty())
            .or(project_dir_name)
            .unwrap_or("default");
        Self::new(sanitize_instance_id(raw), kind)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> InfraKind {
        self.kind
    }
}

/// Make a string usable as both a container name and a Vagrant machine name.
///
/// Allowed: `[a-zA-Z0-9][a-zA-Z0-9_.-]*`. Anything else becomes `-`; a
/// leading non-alphanumeric gets an `i` prefix.
#[must_use]
pub fn sanitize_instance_id(raw: &str) -> String {
    let mut id: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if id.is_empty() {
        return "default".to_string();
    }
    if !id.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        id.insert(0, 'i');
    }
    id
}

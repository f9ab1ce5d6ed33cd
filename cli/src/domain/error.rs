//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::instance::InfrastructureState;

// ── Exit codes ────────────────────────────────────────────────────────────────

pub const EXIT_GENERAL_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_INFRA_EXISTS: u8 = 3;
pub const EXIT_INSUFFICIENT_RESOURCES: u8 = 4;
pub const EXIT_BACKEND_NOT_AVAILABLE: u8 = 5;
pub const EXIT_PORT_CONFLICT: u8 = 6;
pub const EXIT_PROVISIONING_FAILED: u8 = 7;

// ── Vagrantp errors ───────────────────────────────────────────────────────────

/// Errors surfaced to the operator, each mapped to a process exit code.
#[derive(Debug, Error)]
pub enum VagrantpError {
    #[error("Configuration file {} not found", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration validation failed:\n{}", bullet_list(errors))]
    ConfigInvalid { errors: Vec<String> },

    #[error("Infrastructure '{id}' already exists (state: {state})")]
    InfrastructureExists {
        id: String,
        state: InfrastructureState,
    },

    #[error("Insufficient {resource}: need {needed}, {available} available")]
    InsufficientResources {
        resource: String,
        needed: String,
        available: String,
    },

    #[error("Backend '{backend}' is not installed or not configured")]
    BackendNotAvailable { backend: String },

    #[error("Port {port} is already in use on this host")]
    PortConflict { port: u16 },

    #[error("Provisioning failed: {details}")]
    ProvisioningFailed {
        details: String,
        exit_code: Option<i32>,
    },

    #[error("{message}")]
    General {
        message: String,
        suggestion: Option<String>,
    },
}

impl VagrantpError {
    /// Shorthand for a `General` error without a suggestion.
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
            suggestion: None,
        }
    }

    /// Shorthand for a `General` error with a remediation hint.
    pub fn general_with(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } => EXIT_CONFIG_ERROR,
            Self::InfrastructureExists { .. } => EXIT_INFRA_EXISTS,
            Self::InsufficientResources { .. } => EXIT_INSUFFICIENT_RESOURCES,
            Self::BackendNotAvailable { .. } => EXIT_BACKEND_NOT_AVAILABLE,
            Self::PortConflict { .. } => EXIT_PORT_CONFLICT,
            Self::ProvisioningFailed { .. } => EXIT_PROVISIONING_FAILED,
            Self::General { .. } => EXIT_GENERAL_ERROR,
        }
    }

    /// Remediation hint printed under the error message, if any.
    #[must_use]
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Create a .env file with the required infra_kind field".to_string())
            }
            Self::ConfigInvalid { .. } => Some("Fix the fields listed above in .env".to_string()),
            Self::InfrastructureExists { .. } => Some(
                "Run 'vagrantp ssh' to connect, or 'vagrantp rm' then 'vagrantp up' to recreate"
                    .to_string(),
            ),
            Self::InsufficientResources { .. } => Some(
                "Stop other running projects, or reduce resource requirements in .env".to_string(),
            ),
            Self::BackendNotAvailable { backend } => {
                Some(format!("Install {backend} and verify it is on PATH"))
            }
            Self::PortConflict { .. } => Some(
                "Use a different host port in .env, or stop the process holding it".to_string(),
            ),
            Self::ProvisioningFailed { .. } => {
                Some("Check playbook syntax and the output above".to_string())
            }
            Self::General { suggestion, .. } => suggestion.clone(),
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Structural parse failures for a single configuration value.
///
/// `field` is the upper-case field label used in diagnostics (`MEMORY`,
/// `DISK_SIZE`, `PORTS`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid {field} format: {value}")]
    InvalidFormat { field: &'static str, value: String },

    #[error("Invalid PORTS mapping: {mapping}")]
    InvalidPortMapping { mapping: String },
}

impl ConfigError {
    /// The field this error refers to.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidFormat { field, .. } => field,
            Self::InvalidPortMapping { .. } => "PORTS",
        }
    }
}

//! Domain layer: pure types, parsing and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`
//! sockets. All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod instance;
pub mod provisioning;

pub use config::{Configuration, InfraSettings, PortMapping, ValidationReport};
pub use error::{ConfigError, VagrantpError};
pub use instance::{InfraKind, InfrastructureState, InstanceHandle};
pub use provisioning::ProvisioningRecord;

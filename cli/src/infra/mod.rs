//! Infrastructure layer — concrete implementations of application port traits.
//!
//! Process execution, the Vagrant and container backends, Ansible runners,
//! and the per-project files under `.vagrantp/`.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod ansible;
pub mod backend;
pub mod command_runner;
pub mod config;
pub mod container;
pub mod fs;
pub mod network;
pub mod state;
pub mod store;
pub mod vagrant;

//! Command implementations

pub mod provision;
pub mod rm;
pub mod ssh;
pub mod status;
pub mod stop;
pub mod up;
pub mod version;

//! Infrastructure implementation of the `ConfigSource` port.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ConfigSource;
use crate::domain::{Configuration, VagrantpError};

/// Default configuration file name inside the project directory.
pub const DEFAULT_CONFIG_FILE: &str = ".env";

/// A `KEY=VALUE` file on disk.
pub struct EnvFileSource {
    path: PathBuf,
}

impl EnvFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `explicit` when given (relative paths resolve against `project_dir`),
    /// otherwise `<project_dir>/.env`.
    #[must_use]
    pub fn locate(explicit: Option<&Path>, project_dir: &Path) -> Self {
        match explicit {
            Some(p) if p.is_absolute() => Self::new(p),
            Some(p) => Self::new(project_dir.join(p)),
            None => Self::new(project_dir.join(DEFAULT_CONFIG_FILE)),
        }
    }
}

impl ConfigSource for EnvFileSource {
    fn location(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Configuration> {
        if !self.path.is_file() {
            return Err(VagrantpError::ConfigNotFound {
                path: self.path.clone(),
            }
            .into());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let config = Configuration::parse(&text);
        tracing::debug!(path = %self.path.display(), keys = config.len(), "configuration loaded");
        Ok(config)
    }
}

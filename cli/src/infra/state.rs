//! Advisory state cache at `.vagrantp/state.json`.
//!
//! Maps instance id to the last state this tool observed or set. Nothing
//! reads it to make a decision; `status` only displays it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::application::ports::{CachedState, StateCache};
use crate::domain::{InfrastructureState, InstanceHandle};
use crate::infra::fs::{state_dir, write_atomic};

type CacheFile = BTreeMap<String, CachedState>;

pub struct StateCacheFile {
    path: PathBuf,
}

impl StateCacheFile {
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self::with_path(state_dir(project_dir).join("state.json"))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<CacheFile> {
        if !self.path.exists() {
            return Ok(CacheFile::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading state cache {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing state cache {}", self.path.display()))
    }
}

impl StateCache for StateCacheFile {
    fn record(&self, handle: &InstanceHandle, state: InfrastructureState) -> Result<()> {
        // A corrupt cache is replaced rather than blocking the operation.
        let mut entries = self.read().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable state cache");
            CacheFile::new()
        });
        entries.insert(
            handle.id().to_string(),
            CachedState {
                state,
                recorded_at: Utc::now(),
            },
        );
        let content = serde_json::to_string_pretty(&entries).context("serializing state cache")?;
        write_atomic(&self.path, &content)
    }

    fn last_known(&self, handle: &InstanceHandle) -> Result<Option<CachedState>> {
        Ok(self.read()?.remove(handle.id()))
    }
}

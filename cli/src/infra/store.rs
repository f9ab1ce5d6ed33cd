//! File-backed implementation of the `ProvisioningStore` port.
//!
//! One JSON file per instance at `.vagrantp/<id>.provisioned`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ProvisioningStore;
use crate::domain::InstanceHandle;
use crate::domain::ProvisioningRecord;
use crate::domain::provisioning::RECORD_SUFFIX;
use crate::infra::fs::{remove_if_exists, state_dir, write_atomic};

pub struct ProvisioningFileStore {
    dir: PathBuf,
}

impl ProvisioningFileStore {
    /// Store rooted at `<project_dir>/.vagrantp`.
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            dir: state_dir(project_dir),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{RECORD_SUFFIX}"))
    }
}

impl ProvisioningStore for ProvisioningFileStore {
    fn load(&self, handle: &InstanceHandle) -> Result<Option<ProvisioningRecord>> {
        let path = self.path_for(handle.id());
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        match serde_json::from_str::<ProvisioningRecord>(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Bare marker files predate the JSON format.
                tracing::debug!(path = %path.display(), error = %e, "legacy provisioning marker");
                Ok(Some(ProvisioningRecord {
                    infra_id: handle.id().to_string(),
                    provisioned_at: None,
                    playbook_sha256: None,
                }))
            }
        }
    }

    fn save(&self, record: &ProvisioningRecord) -> Result<()> {
        let path = self.path_for(&record.infra_id);
        let content =
            serde_json::to_string_pretty(record).context("serializing provisioning record")?;
        write_atomic(&path, &content)?;
        tracing::debug!(path = %path.display(), "provisioning record written");
        Ok(())
    }

    fn clear(&self, handle: &InstanceHandle) -> Result<()> {
        remove_if_exists(&self.path_for(handle.id()))
    }
}

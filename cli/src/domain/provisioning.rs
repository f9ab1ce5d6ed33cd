//! Provisioning record and playbook fingerprinting.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::instance::InstanceHandle;

/// File name suffix of the per-instance provisioning marker.
pub const RECORD_SUFFIX: &str = ".provisioned";

/// Persistent evidence that provisioning completed for an instance.
///
/// Legacy markers written as a bare file deserialize with only `infra_id`
/// known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRecord {
    pub infra_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook_sha256: Option<String>,
}

impl ProvisioningRecord {
    #[must_use]
    pub fn new(handle: &InstanceHandle, playbook_sha256: Option<String>) -> Self {
        Self {
            infra_id: handle.id().to_string(),
            provisioned_at: Some(Utc::now()),
            playbook_sha256,
        }
    }

    /// A record only counts for the instance it was written for.
    #[must_use]
    pub fn is_valid_for(&self, handle: &InstanceHandle) -> bool {
        self.infra_id == handle.id()
    }

    /// `true` when both digests are known and differ.
    #[must_use]
    pub fn playbook_changed(&self, current_sha256: Option<&str>) -> bool {
        match (self.playbook_sha256.as_deref(), current_sha256) {
            (Some(recorded), Some(current)) => recorded != current,
            _ => false,
        }
    }
}

/// Lower-case hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

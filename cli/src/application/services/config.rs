//! Configuration use-case: load, validate, and type the project configuration.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::application::ports::{ConfigSource, ProgressReporter};
use crate::domain::config::{
    Configuration, InfraSettings, KEY_BACKEND_NAME, KEY_INFRA_ID, KEY_INFRA_KIND,
    ValidationReport, validate,
};
use crate::domain::{InfraKind, InstanceHandle, VagrantpError};

/// A configuration that passed validation, with everything derived from it.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: Configuration,
    pub report: ValidationReport,
    pub settings: InfraSettings,
    pub handle: InstanceHandle,
}

impl ValidatedConfig {
    /// The instance this configuration addresses.
    #[must_use]
    pub fn target(&self) -> InstanceTarget {
        InstanceTarget {
            handle: self.handle.clone(),
            backend_name: self.settings.backend_name.clone(),
        }
    }
}

/// Just enough configuration to address an existing instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTarget {
    pub handle: InstanceHandle,
    pub backend_name: Option<String>,
}

/// Resolve `path` against the project directory unless it is absolute.
#[must_use]
pub fn resolve_path(project_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

/// Load the configuration, validate it, and build typed settings.
///
/// Warnings go to `reporter` whether or not validation passes. Relative
/// playbook and vars paths are resolved against `project_dir`.
///
/// # Errors
///
/// `ConfigNotFound` when the source is absent, `ConfigInvalid` with every
/// accumulated violation otherwise.
pub fn load_validated(
    source: &impl ConfigSource,
    project_dir: &Path,
    exists: impl Fn(&Path) -> bool,
    reporter: &impl ProgressReporter,
) -> Result<ValidatedConfig> {
    let config = source.load()?;
    tracing::debug!(path = %source.location().display(), entries = config.len(), "loaded configuration");

    let report = validate(&config, |p| exists(&resolve_path(project_dir, p)));
    for warning in &report.warnings {
        reporter.warn(warning);
    }
    if !report.valid {
        return Err(VagrantpError::ConfigInvalid {
            errors: report.errors,
        }
        .into());
    }

    let mut settings = InfraSettings::from_config(&config)?;
    let provisioning = &mut settings.provisioning;
    provisioning.playbook = provisioning
        .playbook
        .take()
        .map(|p| resolve_path(project_dir, &p));
    provisioning.vars = provisioning
        .vars
        .take()
        .map(|p| resolve_path(project_dir, &p));

    let handle = instance_handle(project_dir, settings.infra_id.as_deref(), settings.kind);

    Ok(ValidatedConfig {
        config,
        report,
        settings,
        handle,
    })
}

/// Load only `infra_kind`, `infra_id` and `backend_name`.
///
/// Nothing else is validated, so `stop`, `rm`, `ssh` and `status` keep
/// working on an instance whose playbook or resource settings went stale.
///
/// # Errors
///
/// `ConfigNotFound` when the source is absent, `ConfigInvalid` when
/// `infra_kind` is missing or unknown.
pub fn load_target(source: &impl ConfigSource, project_dir: &Path) -> Result<InstanceTarget> {
    let config = source.load()?;
    let kind = match config.get(KEY_INFRA_KIND).map(str::parse::<InfraKind>) {
        Some(Ok(kind)) => kind,
        Some(Err(e)) => return Err(VagrantpError::ConfigInvalid { errors: vec![e] }.into()),
        None => {
            return Err(VagrantpError::ConfigInvalid {
                errors: vec![format!("{KEY_INFRA_KIND} is required")],
            }
            .into());
        }
    };
    let non_empty = |key: &str| {
        config
            .get(key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(InstanceTarget {
        handle: instance_handle(project_dir, non_empty(KEY_INFRA_ID).as_deref(), kind),
        backend_name: non_empty(KEY_BACKEND_NAME),
    })
}

fn instance_handle(project_dir: &Path, infra_id: Option<&str>, kind: InfraKind) -> InstanceHandle {
    let dir_name = project_dir.file_name().and_then(|n| n.to_str());
    InstanceHandle::resolve(infra_id, dir_name, kind)
}

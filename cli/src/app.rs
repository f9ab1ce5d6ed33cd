//! Application context — unified state passed to every command handler.
//!
//! `AppContext` carries the cross-cutting flags. `Project` is the per-project
//! wiring (instance handle, backend, stores) that the instance commands share.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ProgressReporter;
use crate::application::services::config::{self, InstanceTarget, ValidatedConfig};
use crate::application::services::lifecycle::Lifecycle;
use crate::domain::InstanceHandle;
use crate::infra::backend::Backend;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::EnvFileSource;
use crate::infra::state::StateCacheFile;
use crate::infra::store::ProvisioningFileStore;
use crate::output::OutputContext;

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `VAGRANTP_YES` env vars).
    pub yes: bool,
    /// Configuration file override.
    pub config: Option<PathBuf>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Directory the instance belongs to (the working directory).
    pub project_dir: PathBuf,
    /// `--config` / `VAGRANTP_CONFIG`, if given.
    pub config_path: Option<PathBuf>,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `VAGRANTP_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be determined.
    pub fn new(flags: AppFlags) -> Result<Self> {
        let project_dir = std::env::current_dir().context("cannot determine current directory")?;
        Ok(Self::with_project_dir(flags, project_dir))
    }

    /// Same as `new` with an explicit project directory.
    #[must_use]
    pub fn with_project_dir(flags: AppFlags, project_dir: PathBuf) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("VAGRANTP_YES").is_ok();
        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            project_dir,
            config_path: flags.behaviour.config,
            non_interactive: flags.behaviour.yes || ci_env,
        }
    }

    /// The configuration source for this invocation.
    #[must_use]
    pub fn config_source(&self) -> EnvFileSource {
        EnvFileSource::locate(self.config_path.as_deref(), &self.project_dir)
    }

    /// Load and validate the project configuration.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` or `ConfigInvalid`.
    pub fn load_config(&self, reporter: &impl ProgressReporter) -> Result<ValidatedConfig> {
        config::load_validated(&self.config_source(), &self.project_dir, Path::exists, reporter)
    }

    /// Wire the backend and stores for an existing instance.
    ///
    /// Reads only what addresses the instance, so a stale playbook or
    /// resource setting does not block `stop`, `rm`, `ssh` or `status`.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound`, `ConfigInvalid` for a missing or unknown
    /// `infra_kind`, or `BackendNotAvailable`.
    pub async fn open_instance(&self) -> Result<Project> {
        let target = config::load_target(&self.config_source(), &self.project_dir)?;
        self.wire(target).await
    }

    /// Fully validate the configuration and wire the backend and stores for it.
    ///
    /// # Errors
    ///
    /// Configuration errors, or `BackendNotAvailable` when no container
    /// runtime can be used.
    pub async fn open_project(
        &self,
        reporter: &impl ProgressReporter,
    ) -> Result<(ValidatedConfig, Project)> {
        let validated = self.load_config(reporter)?;
        let project = self.wire(validated.target()).await?;
        Ok((validated, project))
    }

    async fn wire(&self, target: InstanceTarget) -> Result<Project> {
        let backend = Backend::select(
            TokioCommandRunner::in_dir(&self.project_dir),
            target.handle.clone(),
            target.backend_name.as_deref(),
            &self.project_dir,
        )
        .await?;
        Ok(Project {
            handle: target.handle,
            backend,
            store: ProvisioningFileStore::new(&self.project_dir),
            cache: StateCacheFile::new(&self.project_dir),
        })
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `VAGRANTP_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}

/// Everything the instance commands need for one project.
pub struct Project {
    pub handle: InstanceHandle,
    pub backend: Backend<TokioCommandRunner>,
    pub store: ProvisioningFileStore,
    pub cache: StateCacheFile,
}

impl Project {
    /// Lifecycle orchestrator over this project's backend and stores.
    pub fn lifecycle<'a, R: ProgressReporter>(
        &'a self,
        reporter: &'a R,
    ) -> Lifecycle<'a, Backend<TokioCommandRunner>, ProvisioningFileStore, StateCacheFile, R> {
        Lifecycle::new(&self.backend, &self.store, &self.cache, reporter)
    }
}

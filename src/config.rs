//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::lifecycle::{DesiredState, LifecycleSettings, UnknownStateError};
use crate::poll::{DEFAULT_WAIT_TIMEOUT_SECS, WaitPolicy};
use crate::provision::{
    DEFAULT_PACKAGE_NAME, DEFAULT_SOURCE_BRANCH, DEFAULT_SOURCE_REPO_URL, DeploymentLayout,
    ProvisioningConfig,
};

/// Name of the configuration file searched for by discovery.
pub const CONFIG_FILE_NAME: &str = "reposectl.toml";

/// Lifecycle settings derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "REPOSE",
    discovery(
        app_name = "reposectl",
        env_var = "REPOSECTL_CONFIG_PATH",
        config_file_name = "reposectl.toml",
        dotfile_name = ".reposectl.toml",
        project_file_name = "reposectl.toml"
    )
)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "configuration struct with user-facing toggle settings that are naturally expressed as booleans"
)]
pub struct LifecycleConfig {
    /// Package version to install. When unset the service is built from
    /// source.
    pub release: Option<String>,
    /// Build from source even when a release is set.
    #[ortho_config(default = false)]
    pub git_build: bool,
    /// Repository used by source builds.
    #[ortho_config(default = DEFAULT_SOURCE_REPO_URL.to_owned())]
    pub git_repo: String,
    /// Branch used by source builds.
    #[ortho_config(default = DEFAULT_SOURCE_BRANCH.to_owned())]
    pub git_branch: String,
    /// Desired state: `present` or `absent`.
    #[ortho_config(default = "present".to_owned())]
    pub state: String,
    /// Wait for the service to reach the desired state.
    #[ortho_config(default = false)]
    pub wait: bool,
    /// Wait bound in seconds; `0` waits forever.
    #[ortho_config(default = DEFAULT_WAIT_TIMEOUT_SECS)]
    pub wait_timeout: u64,
    /// Package and init-script name.
    #[ortho_config(default = DEFAULT_PACKAGE_NAME.to_owned())]
    pub package_name: String,
    /// Command-line fragment identifying the running service.
    #[ortho_config(default = DEFAULT_PACKAGE_NAME.to_owned())]
    pub process_signature: String,
    /// Leave a running service alone instead of rebuilding from source over it.
    #[ortho_config(default = false)]
    pub skip_running_rebuild: bool,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl LifecycleConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to {CONFIG_FILE_NAME}",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("reposectl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Parses the configured desired state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidState`] for anything other than
    /// `present` or `absent`.
    pub fn desired_state(&self) -> Result<DesiredState, ConfigError> {
        Ok(DesiredState::parse(&self.state)?)
    }

    /// Provisioning inputs for the lifecycle controller.
    #[must_use]
    pub fn provisioning(&self) -> ProvisioningConfig {
        ProvisioningConfig {
            release: self.release.clone(),
            use_source_build: self.git_build,
            source_repo_url: self.git_repo.trim().to_owned(),
            source_branch: self.git_branch.trim().to_owned(),
            package_name: self.package_name.trim().to_owned(),
            skip_running_rebuild: self.skip_running_rebuild,
        }
    }

    /// Wait policy for the convergence poller.
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            enabled: self.wait,
            timeout_seconds: self.wait_timeout,
        }
    }

    /// Builds [`LifecycleSettings`] using the default deployment layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_settings(&self) -> Result<LifecycleSettings, ConfigError> {
        self.validate()?;
        Ok(LifecycleSettings {
            desired: self.desired_state()?,
            provisioning: self.provisioning(),
            wait: self.wait_policy(),
            signature: self.process_signature.trim().to_owned(),
            layout: DeploymentLayout::default(),
        })
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide missing values via environment variables or configuration
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidState`] for an unknown state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.desired_state()?;
        Self::require_field(
            &self.process_signature,
            &FieldMetadata::new(
                "process signature",
                "REPOSE_PROCESS_SIGNATURE",
                "process_signature",
            ),
        )?;
        Self::require_field(
            &self.package_name,
            &FieldMetadata::new("package name", "REPOSE_PACKAGE_NAME", "package_name"),
        )?;
        Self::require_field(
            &self.git_repo,
            &FieldMetadata::new("source repository", "REPOSE_GIT_REPO", "git_repo"),
        )?;
        Self::require_field(
            &self.git_branch,
            &FieldMetadata::new("source branch", "REPOSE_GIT_BRANCH", "git_branch"),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates the desired state is not recognised.
    #[error("invalid configuration: {0} (set REPOSE_STATE or state in reposectl.toml)")]
    InvalidState(#[from] UnknownStateError),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

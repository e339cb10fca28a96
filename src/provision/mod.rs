//! Provisioning strategies that make the service binaries present and start
//! the service.
//!
//! Two strategies exist and they are mutually exclusive: installing a
//! pre-built package through the host package manager, or building from a
//! git checkout and deploying the artifacts by hand. Selection is a pure
//! function of [`ProvisioningConfig`]; execution goes through injected
//! collaborators so every host-side effect can be scripted in tests.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::command::{CommandError, CommandRunner};
use crate::platform::{HostPlatform, PlatformError};

mod layout;
mod package;
mod source;

pub use layout::{
    BundlePattern, CONFIG_SOURCE_DIR, DEFAULT_CHECKOUT_DIR, DEFAULT_CONFIG_DIR,
    DEFAULT_CONTROL_PORT, DEFAULT_FILTERS_DIR, DEFAULT_LIB_DIR, DeploymentLayout,
    EXTENSIONS_BUNDLE, FILTER_BUNDLE, VALVE_JAR_NAME, VALVE_JAR_SOURCE,
};
pub use package::PackageInstall;
pub use source::SourceBuild;

/// Default package and service name.
pub const DEFAULT_PACKAGE_NAME: &str = "repose-valve";
/// Default source repository.
pub const DEFAULT_SOURCE_REPO_URL: &str = "https://github.com/rackerlabs/repose";
/// Default source branch.
pub const DEFAULT_SOURCE_BRANCH: &str = "master";

/// How to provision the service when it is requested and not running.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisioningConfig {
    /// Package version to install; `None` selects the source build.
    pub release: Option<String>,
    /// Forces the source build even when a release is set.
    pub use_source_build: bool,
    /// Repository cloned by the source build.
    pub source_repo_url: String,
    /// Branch pulled by the source build.
    pub source_branch: String,
    /// Package and init-script name used by the package install.
    pub package_name: String,
    /// Skip the source rebuild and relaunch when an instance is already
    /// running. Package installs never act on a running instance.
    pub skip_running_rebuild: bool,
}

impl ProvisioningConfig {
    /// Returns the release when one is set and not blank.
    #[must_use]
    pub fn release(&self) -> Option<&str> {
        self.release
            .as_deref()
            .map(str::trim)
            .filter(|release| !release.is_empty())
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            release: None,
            use_source_build: false,
            source_repo_url: DEFAULT_SOURCE_REPO_URL.to_owned(),
            source_branch: DEFAULT_SOURCE_BRANCH.to_owned(),
            package_name: DEFAULT_PACKAGE_NAME.to_owned(),
            skip_running_rebuild: false,
        }
    }
}

/// Identifies a strategy in logs and reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyKind {
    /// Host package manager install.
    PackageInstall,
    /// Git checkout plus build.
    SourceBuild,
}

impl StrategyKind {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PackageInstall => "package-install",
            Self::SourceBuild => "source-build",
        }
    }
}

/// Summary of a completed provisioning run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionReport {
    /// Strategy that ran.
    pub strategy: StrategyKind,
    /// Completed steps, in order.
    pub steps: Vec<String>,
}

/// Errors that abort provisioning. None of them are retried.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Raised when the host package manager is not supported.
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// Raised when a required command fails or cannot start.
    #[error("provisioning command failed: {0}")]
    Command(#[from] CommandError),
    /// Raised when the build did not produce an expected artifact.
    #[error("build artifact missing: {description} at {path}")]
    MissingArtifact {
        /// What was expected.
        description: String,
        /// Where it was expected.
        path: Utf8PathBuf,
    },
    /// Raised when a deployment directory or file operation fails.
    #[error("filesystem operation failed on {path}: {message}")]
    Filesystem {
        /// Path involved in the failing operation.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
}

/// Host collaborators a strategy acts through.
#[derive(Clone, Copy, Debug)]
pub struct ProvisionHost<'a, R, H> {
    /// Runs package, git, build, and launch commands.
    pub runner: &'a R,
    /// Resolves the package family.
    pub platform: &'a H,
    /// Deployment locations for source builds.
    pub layout: &'a DeploymentLayout,
}

/// Capability shared by every provisioning strategy.
pub trait Provision {
    /// Makes the service binaries present and launches the service.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on the first failing step.
    fn provision<R: CommandRunner, H: HostPlatform>(
        &self,
        host: &ProvisionHost<'_, R, H>,
    ) -> Result<ProvisionReport, ProvisionError>;
}

/// The closed set of provisioning strategies.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProvisionStrategy {
    /// Install a pre-built package.
    PackageInstall(PackageInstall),
    /// Build from source and deploy the artifacts.
    SourceBuild(SourceBuild),
}

impl ProvisionStrategy {
    /// Chooses the strategy for `config`.
    ///
    /// A source build is used when explicitly requested and also whenever no
    /// release is set, even if `use_source_build` is `false`.
    #[must_use]
    pub fn select(config: &ProvisioningConfig) -> Self {
        match config.release() {
            Some(release) if !config.use_source_build => Self::PackageInstall(
                PackageInstall::new(config.package_name.clone(), Some(release.to_owned())),
            ),
            _ => Self::SourceBuild(SourceBuild::new(
                config.source_repo_url.clone(),
                config.source_branch.clone(),
            )),
        }
    }

    /// Returns the strategy kind.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::PackageInstall(_) => StrategyKind::PackageInstall,
            Self::SourceBuild(_) => StrategyKind::SourceBuild,
        }
    }
}

impl Provision for ProvisionStrategy {
    fn provision<R: CommandRunner, H: HostPlatform>(
        &self,
        host: &ProvisionHost<'_, R, H>,
    ) -> Result<ProvisionReport, ProvisionError> {
        match self {
            Self::PackageInstall(strategy) => strategy.provision(host),
            Self::SourceBuild(strategy) => strategy.provision(host),
        }
    }
}

#[cfg(test)]
mod tests;

//! Package-manager install followed by an init-script start.

use shell_escape::unix::escape;
use tracing::info;

use crate::command::{CommandLine, CommandRunner};
use crate::platform::{HostPlatform, PackageFamily};

use super::{Provision, ProvisionError, ProvisionHost, ProvisionReport, StrategyKind};

/// Installs the service package and starts it through its init script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageInstall {
    package: String,
    release: Option<String>,
}

impl PackageInstall {
    /// Creates the strategy. A missing or blank release installs the latest
    /// available package.
    #[must_use]
    pub fn new(package: impl Into<String>, release: Option<String>) -> Self {
        Self {
            package: package.into(),
            release: release.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Release pinned by this strategy, if any.
    #[must_use]
    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    /// Builds the install command for `family`.
    #[must_use]
    pub fn install_command(&self, family: PackageFamily) -> CommandLine {
        let package_spec = match (family, self.release.as_deref()) {
            (_, None) => self.package.clone(),
            (PackageFamily::Debian, Some(release)) => format!("{}={release}", self.package),
            (PackageFamily::RedHat, Some(release)) => format!("{}-{release}", self.package),
        };
        let escaped = escape(package_spec.into());
        let script = match family {
            PackageFamily::Debian => {
                format!("apt-get update && apt-get install -y -q {escaped}")
            }
            PackageFamily::RedHat => format!("yum makecache -q && yum install -y -q {escaped}"),
        };
        CommandLine::shell(script)
    }

    /// Builds the service start command.
    #[must_use]
    pub fn start_command(&self) -> CommandLine {
        CommandLine::new("service").args([self.package.as_str(), "start"])
    }
}

impl Provision for PackageInstall {
    fn provision<R: CommandRunner, H: HostPlatform>(
        &self,
        host: &ProvisionHost<'_, R, H>,
    ) -> Result<ProvisionReport, ProvisionError> {
        let family = host.platform.package_family()?;
        info!(
            package = %self.package,
            release = self.release().unwrap_or("latest"),
            %family,
            "installing package"
        );

        let install = self.install_command(family);
        host.runner.run_checked(&install)?;
        let start = self.start_command();
        host.runner.run_checked(&start)?;

        Ok(ProvisionReport {
            strategy: StrategyKind::PackageInstall,
            steps: vec![install.display(), start.display()],
        })
    }
}

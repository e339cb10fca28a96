//! Build from a git checkout and deploy the artifacts by hand.
//!
//! Every step mutates the host and none is idempotent. The first failure
//! aborts the run; partially deployed files are left in place.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use shell_escape::unix::escape;
use tracing::{debug, info};

use crate::command::{CommandLine, CommandRunner};
use crate::platform::HostPlatform;

use super::layout::{BundlePattern, CONFIG_SOURCE_DIR, VALVE_JAR_NAME, VALVE_JAR_SOURCE};
use super::{
    DeploymentLayout, EXTENSIONS_BUNDLE, FILTER_BUNDLE, Provision, ProvisionError,
    ProvisionHost, ProvisionReport, StrategyKind,
};

/// Clones, builds, deploys, and launches the service from source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceBuild {
    repo_url: String,
    branch: String,
}

impl SourceBuild {
    /// Creates the strategy for `repo_url` at `branch`.
    #[must_use]
    pub fn new(repo_url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: branch.into(),
        }
    }

    /// Repository pulled by the build.
    #[must_use]
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Branch pulled by the build.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Builds the detached launch command for `layout`.
    #[must_use]
    pub fn launch_command(layout: &DeploymentLayout) -> CommandLine {
        let config_dir = escape(layout.config_dir.as_str().into());
        CommandLine::shell(format!(
            "nohup java -jar {VALVE_JAR_NAME} -s {port} -c {config_dir} start >/dev/null 2>&1 &",
            port = layout.control_port,
        ))
        .current_dir(&layout.lib_dir)
    }

    fn source_commands(&self, checkout: &Utf8Path) -> [CommandLine; 3] {
        [
            CommandLine::new("git").arg("init").current_dir(checkout),
            CommandLine::new("git")
                .args(["pull", self.repo_url.as_str(), self.branch.as_str()])
                .current_dir(checkout),
            CommandLine::new("mvn")
                .args(["-q", "-DskipTests", "clean", "install"])
                .current_dir(checkout),
        ]
    }
}

impl Provision for SourceBuild {
    fn provision<R: CommandRunner, H: HostPlatform>(
        &self,
        host: &ProvisionHost<'_, R, H>,
    ) -> Result<ProvisionReport, ProvisionError> {
        let layout = host.layout;
        let mut steps = Vec::new();
        info!(repo = %self.repo_url, branch = %self.branch, "building from source");

        ensure_dir(&layout.checkout_dir)?;
        steps.push(format!("create {}", layout.checkout_dir));

        for command in self.source_commands(&layout.checkout_dir) {
            host.runner.run_checked(&command)?;
            steps.push(command.display());
        }

        for dir in [&layout.lib_dir, &layout.filters_dir, &layout.config_dir] {
            ensure_dir(dir)?;
            steps.push(format!("create {dir}"));
        }

        let checkout = open_dir(&layout.checkout_dir)?;
        deploy_runtime_jar(&checkout, layout)?;
        steps.push(format!("deploy {}", layout.runtime_jar()));

        for bundle in [&EXTENSIONS_BUNDLE, &FILTER_BUNDLE] {
            deploy_bundle(&checkout, layout, bundle)?;
            steps.push(format!("deploy {}", layout.bundle_path(bundle)));
        }

        let copied = deploy_configuration(&checkout, layout)?;
        steps.push(format!("deploy {copied} files to {}", layout.config_dir));

        let launch = Self::launch_command(layout);
        host.runner.run_checked(&launch)?;
        steps.push(launch.display());

        Ok(ProvisionReport {
            strategy: StrategyKind::SourceBuild,
            steps,
        })
    }
}

fn filesystem_error(path: &Utf8Path, err: &io::Error) -> ProvisionError {
    ProvisionError::Filesystem {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn ensure_dir(path: &Utf8Path) -> Result<(), ProvisionError> {
    Dir::create_ambient_dir_all(path, ambient_authority()).map_err(|err| filesystem_error(path, &err))
}

fn open_dir(path: &Utf8Path) -> Result<Dir, ProvisionError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| filesystem_error(path, &err))
}

fn open_build_dir(
    checkout: &Dir,
    layout: &DeploymentLayout,
    relative: &str,
    description: &str,
) -> Result<Dir, ProvisionError> {
    let path = layout.checkout_dir.join(relative);
    checkout.open_dir(relative).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ProvisionError::MissingArtifact {
                description: description.to_owned(),
                path: path.clone(),
            }
        } else {
            filesystem_error(&path, &err)
        }
    })
}

fn deploy_runtime_jar(checkout: &Dir, layout: &DeploymentLayout) -> Result<(), ProvisionError> {
    let lib = open_dir(&layout.lib_dir)?;
    checkout
        .copy(VALVE_JAR_SOURCE, &lib, VALVE_JAR_NAME)
        .map(|_| ())
        .map_err(|err| {
            let source = layout.checkout_dir.join(VALVE_JAR_SOURCE);
            if err.kind() == io::ErrorKind::NotFound {
                ProvisionError::MissingArtifact {
                    description: String::from("runtime jar"),
                    path: source,
                }
            } else {
                filesystem_error(&source, &err)
            }
        })
}

fn deploy_bundle(
    checkout: &Dir,
    layout: &DeploymentLayout,
    bundle: &BundlePattern,
) -> Result<(), ProvisionError> {
    let source_path = layout.checkout_dir.join(bundle.source_dir);
    let build_dir = open_build_dir(checkout, layout, bundle.source_dir, bundle.deployed_name)?;
    let mut candidates = regular_file_names(&build_dir, &source_path)?
        .into_iter()
        .filter(|name| bundle.matches(name))
        .collect::<Vec<_>>();
    candidates.sort();
    let Some(artifact) = candidates.first() else {
        return Err(ProvisionError::MissingArtifact {
            description: format!("{}*{}", bundle.prefix, bundle.suffix),
            path: source_path,
        });
    };

    debug!(artifact = %artifact, target = bundle.deployed_name, "deploying bundle");
    let filters = open_dir(&layout.filters_dir)?;
    build_dir
        .copy(artifact, &filters, bundle.deployed_name)
        .map(|_| ())
        .map_err(|err| filesystem_error(&source_path.join(artifact), &err))
}

fn deploy_configuration(checkout: &Dir, layout: &DeploymentLayout) -> Result<usize, ProvisionError> {
    let source_path = layout.checkout_dir.join(CONFIG_SOURCE_DIR);
    let configs = open_build_dir(checkout, layout, CONFIG_SOURCE_DIR, "configuration directory")?;
    let target = open_dir(&layout.config_dir)?;
    let mut names = regular_file_names(&configs, &source_path)?;
    names.sort();
    for name in &names {
        configs
            .copy(name, &target, name)
            .map_err(|err| filesystem_error(&source_path.join(name), &err))?;
    }
    Ok(names.len())
}

fn regular_file_names(dir: &Dir, path: &Utf8Path) -> Result<Vec<String>, ProvisionError> {
    let mut names = Vec::new();
    for item in dir.entries().map_err(|err| filesystem_error(path, &err))? {
        let entry = item.map_err(|err| filesystem_error(path, &err))?;
        let file_type = entry.file_type().map_err(|err| filesystem_error(path, &err))?;
        if file_type.is_file() {
            names.push(entry.file_name().map_err(|err| filesystem_error(path, &err))?);
        }
    }
    Ok(names)
}

//! Fixed deployment locations used by the source build.

use camino::{Utf8Path, Utf8PathBuf};

/// Default checkout directory for the source tree.
pub const DEFAULT_CHECKOUT_DIR: &str = "/opt/repose";
/// Default directory holding the runtime jar.
pub const DEFAULT_LIB_DIR: &str = "/usr/share/lib/repose";
/// Default directory holding the filter bundles.
pub const DEFAULT_FILTERS_DIR: &str = "/usr/share/repose/filters";
/// Default configuration directory passed to the service.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/repose";
/// Default control port the service binds.
pub const DEFAULT_CONTROL_PORT: u16 = 8123;

/// File name of the deployed runtime jar.
pub const VALVE_JAR_NAME: &str = "repose-valve.jar";
/// File name of the deployed extensions bundle.
pub const EXTENSIONS_BUNDLE_NAME: &str = "extensions-filter-bundle.ear";
/// File name of the deployed filter bundle.
pub const FILTER_BUNDLE_NAME: &str = "filter-bundle.ear";

/// Runtime jar produced by the build, relative to the checkout.
pub const VALVE_JAR_SOURCE: &str = "repose-aggregator/core/valve/target/repose-valve.jar";
/// Directory of the extensions bundle build output, relative to the checkout.
pub const EXTENSIONS_BUNDLE_SOURCE_DIR: &str =
    "repose-aggregator/extensions/extensions-filter-bundle/target";
/// Directory of the filter bundle build output, relative to the checkout.
pub const FILTER_BUNDLE_SOURCE_DIR: &str =
    "repose-aggregator/components/filters/filter-bundle/target";
/// Sample configuration shipped in the source tree, relative to the checkout.
pub const CONFIG_SOURCE_DIR: &str = "repose-aggregator/installation/configs/core";

/// Build output matched by prefix and suffix, mirroring a
/// `<prefix>*<suffix>` glob.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BundlePattern {
    /// Directory searched, relative to the checkout.
    pub source_dir: &'static str,
    /// Required file-name prefix.
    pub prefix: &'static str,
    /// Required file-name suffix.
    pub suffix: &'static str,
    /// File name used at the deployment location.
    pub deployed_name: &'static str,
}

impl BundlePattern {
    /// Returns `true` when `file_name` matches the pattern.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() >= self.prefix.len() + self.suffix.len()
            && file_name.starts_with(self.prefix)
            && file_name.ends_with(self.suffix)
    }
}

/// The extensions filter bundle.
pub const EXTENSIONS_BUNDLE: BundlePattern = BundlePattern {
    source_dir: EXTENSIONS_BUNDLE_SOURCE_DIR,
    prefix: "extensions-filter-bundle-",
    suffix: "-SNAPSHOT.ear",
    deployed_name: EXTENSIONS_BUNDLE_NAME,
};

/// The core filter bundle.
pub const FILTER_BUNDLE: BundlePattern = BundlePattern {
    source_dir: FILTER_BUNDLE_SOURCE_DIR,
    prefix: "filter-bundle-",
    suffix: "-SNAPSHOT.ear",
    deployed_name: FILTER_BUNDLE_NAME,
};

/// Where the source build places its checkout and deployed artifacts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentLayout {
    /// Working directory for the git checkout and build.
    pub checkout_dir: Utf8PathBuf,
    /// Directory receiving the runtime jar; the launch runs from here.
    pub lib_dir: Utf8PathBuf,
    /// Directory receiving both filter bundles.
    pub filters_dir: Utf8PathBuf,
    /// Configuration directory passed to the service with `-c`.
    pub config_dir: Utf8PathBuf,
    /// Control port passed to the service with `-s`.
    pub control_port: u16,
}

impl DeploymentLayout {
    /// Places every directory below `root`, keeping the standard relative
    /// structure. Used to deploy into scratch directories.
    #[must_use]
    pub fn rooted_at(root: &Utf8Path) -> Self {
        let under = |absolute: &str| root.join(absolute.trim_start_matches('/'));
        Self {
            checkout_dir: under(DEFAULT_CHECKOUT_DIR),
            lib_dir: under(DEFAULT_LIB_DIR),
            filters_dir: under(DEFAULT_FILTERS_DIR),
            config_dir: under(DEFAULT_CONFIG_DIR),
            control_port: DEFAULT_CONTROL_PORT,
        }
    }

    /// Deployed runtime jar path.
    #[must_use]
    pub fn runtime_jar(&self) -> Utf8PathBuf {
        self.lib_dir.join(VALVE_JAR_NAME)
    }

    /// Deployed path for `bundle`.
    #[must_use]
    pub fn bundle_path(&self, bundle: &BundlePattern) -> Utf8PathBuf {
        self.filters_dir.join(bundle.deployed_name)
    }
}

impl Default for DeploymentLayout {
    fn default() -> Self {
        Self::rooted_at(Utf8Path::new("/"))
    }
}

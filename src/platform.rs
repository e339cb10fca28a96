//! Host platform inspection for the package-install strategy.
//!
//! Only two package-manager families are supported. The family is derived
//! from `/etc/os-release`, checking `ID` first and then each `ID_LIKE` entry,
//! so derivatives such as Linux Mint or Rocky Linux resolve to their parent.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Default location of the os-release file.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

const DEBIAN_IDS: [&str; 2] = ["debian", "ubuntu"];
const REDHAT_IDS: [&str; 4] = ["rhel", "redhat", "fedora", "centos"];

/// Package-manager family of the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PackageFamily {
    /// `apt`-based distributions.
    Debian,
    /// `yum`-based distributions.
    RedHat,
}

impl PackageFamily {
    fn from_id(id: &str) -> Option<Self> {
        let lowered = id.to_ascii_lowercase();
        if DEBIAN_IDS.contains(&lowered.as_str()) {
            Some(Self::Debian)
        } else if REDHAT_IDS.contains(&lowered.as_str()) {
            Some(Self::RedHat)
        } else {
            None
        }
    }
}

impl fmt::Display for PackageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => f.write_str("debian"),
            Self::RedHat => f.write_str("redhat"),
        }
    }
}

/// Errors raised while determining the host platform.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PlatformError {
    /// Raised when the distribution uses neither `apt` nor `yum`.
    #[error("unsupported platform: {name}")]
    Unsupported {
        /// Distribution name as reported by the host.
        name: String,
    },
    /// Raised when the os-release file cannot be read.
    #[error("failed to read {path}: {message}")]
    Unreadable {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
}

/// Resolves the package family used to install the service.
pub trait HostPlatform {
    /// Returns the host's package family.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] when the family is unknown or cannot be
    /// determined.
    fn package_family(&self) -> Result<PackageFamily, PlatformError>;
}

impl HostPlatform for PackageFamily {
    fn package_family(&self) -> Result<PackageFamily, PlatformError> {
        Ok(*self)
    }
}

/// Parsed subset of an os-release file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OsRelease {
    /// Distribution identifier (`ID`).
    pub id: String,
    /// Parent distributions (`ID_LIKE`).
    pub id_like: Vec<String>,
    /// Human readable name (`NAME`), used in error messages.
    pub name: Option<String>,
}

impl OsRelease {
    /// Parses os-release `KEY=value` lines, ignoring comments and unknown
    /// keys.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut release = Self::default();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') {
                continue;
            }
            let Some((key, raw)) = trimmed.split_once('=') else {
                continue;
            };
            let value = unquote(raw);
            match key {
                "ID" => value.clone_into(&mut release.id),
                "ID_LIKE" => {
                    release.id_like = value.split_whitespace().map(str::to_owned).collect();
                }
                "NAME" => release.name = Some(value.to_owned()),
                _ => {}
            }
        }
        release
    }

    /// Reads and parses the os-release file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unreadable`] when the file cannot be read.
    pub fn load(path: &Utf8Path) -> Result<Self, PlatformError> {
        let unreadable = |message: String| PlatformError::Unreadable {
            path: path.to_path_buf(),
            message,
        };
        let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| unreadable(String::from("path is missing a filename")))?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| unreadable(err.to_string()))?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|err| unreadable(err.to_string()))?;
        Ok(Self::parse(&contents))
    }

    fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                if self.id.is_empty() {
                    String::from("unknown")
                } else {
                    self.id.clone()
                }
            })
    }
}

impl HostPlatform for OsRelease {
    fn package_family(&self) -> Result<PackageFamily, PlatformError> {
        std::iter::once(&self.id)
            .chain(self.id_like.iter())
            .find_map(|id| PackageFamily::from_id(id))
            .ok_or_else(|| PlatformError::Unsupported {
                name: self.display_name(),
            })
    }
}

/// Reads the os-release file lazily, on first use.
#[derive(Clone, Debug)]
pub struct OsReleaseFile {
    path: Utf8PathBuf,
}

impl OsReleaseFile {
    /// Points at an os-release file.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for OsReleaseFile {
    fn default() -> Self {
        Self::new(OS_RELEASE_PATH)
    }
}

impl HostPlatform for OsReleaseFile {
    fn package_family(&self) -> Result<PackageFamily, PlatformError> {
        OsRelease::load(&self.path)?.package_family()
    }
}

fn unquote(raw: &str) -> &str {
    let value = raw.trim();
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        })
        .unwrap_or(value)
}

//! Pipeline configuration.
//!
//! Everything except the requirement list can be overridden by the caller
//! (the CLI maps flags and `STAGEHAND_*` environment variables onto these
//! fields). The requirement list is fixed at build time.

use std::path::{Path, PathBuf};

use crate::resolver::PackageRequirement;

/// Runtime release staged when no version is given.
pub const DEFAULT_RUNTIME_VERSION: &str = "0.26.4";

/// Release host; the archive lives at `{base}/{version}/{archive}`.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/pyodide/pyodide/releases/download";

/// Extra packages the bundled application needs on top of the runtime's
/// built-in package set.
pub const DEFAULT_REQUIREMENTS: &[&str] = &[
    "markitdown[docx,xlsx,pptx,pdf]",
    "html2text",
    "ebooklib",
];

/// Interpreter used to drive `pip download`.
pub const DEFAULT_PYTHON: &str = "python3";

/// Oldest interpreter accepted by the prerequisite check.
pub const MIN_PYTHON: (u32, u32) = (3, 10);

/// Name of the working area under the bundle root.
pub const WORK_DIR_NAME: &str = ".stagehand-tmp";

/// Runtime archive settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Release version, e.g. `0.26.4`.
    pub version: String,
    /// Base URL of the release host.
    pub release_base_url: String,
    /// Directory the archive unpacks into, relative to the bundle root.
    pub dir_name: String,
    /// File whose presence inside the runtime root marks a complete extraction.
    pub marker: String,
    /// Optional SHA-256 the downloaded archive must match.
    pub expected_sha256: Option<String>,
}

impl RuntimeConfig {
    /// Archive filename for the configured version.
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tar.bz2", self.dir_name, self.version)
    }

    /// Full download URL for the configured version.
    pub fn release_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.release_base_url.trim_end_matches('/'),
            self.version,
            self.archive_name()
        )
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_RUNTIME_VERSION.to_string(),
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            dir_name: "pyodide".to_string(),
            marker: "pyodide.js".to_string(),
            expected_sha256: None,
        }
    }
}

/// Package cache settings.
#[derive(Debug, Clone)]
pub struct PackagesConfig {
    /// Package cache directory, relative to the bundle root.
    pub dir_name: String,
    /// Manifest filename inside the package cache.
    pub manifest_name: String,
    /// Interpreter (name on `PATH` or absolute path) used for `pip download`.
    pub python: String,
    /// Requirements handed to the resolver, in order.
    pub requirements: Vec<PackageRequirement>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            dir_name: "wheels".to_string(),
            manifest_name: "manifest.json".to_string(),
            python: DEFAULT_PYTHON.to_string(),
            requirements: DEFAULT_REQUIREMENTS
                .iter()
                .copied()
                .map(PackageRequirement::from)
                .collect(),
        }
    }
}

/// Complete configuration for one staging run.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Bundle root; all outputs land below it.
    pub root: PathBuf,
    /// Runtime archive settings.
    pub runtime: RuntimeConfig,
    /// Package cache settings.
    pub packages: PackagesConfig,
}

impl StageConfig {
    /// Default configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            runtime: RuntimeConfig::default(),
            packages: PackagesConfig::default(),
        }
    }

    /// Override the runtime version.
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime.version = version.into();
        self
    }

    /// Override the release host.
    pub fn with_release_base_url(mut self, url: impl Into<String>) -> Self {
        self.runtime.release_base_url = url.into();
        self
    }

    /// Require the runtime archive to hash to `sha256`.
    pub fn with_expected_sha256(mut self, sha256: Option<String>) -> Self {
        self.runtime.expected_sha256 = sha256.map(|s| s.to_ascii_lowercase());
        self
    }

    /// Override the interpreter.
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.packages.python = python.into();
        self
    }

    /// Replace the requirement list.
    pub fn with_requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PackageRequirement>,
    {
        self.packages.requirements = requirements.into_iter().map(Into::into).collect();
        self
    }

    /// Bundle root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_url_construction() {
        let config = StageConfig::new("/tmp/bundle");
        assert_eq!(
            config.runtime.release_url(),
            "https://github.com/pyodide/pyodide/releases/download/0.26.4/pyodide-0.26.4.tar.bz2"
        );

        let mirrored = config
            .with_runtime_version("0.27.0")
            .with_release_base_url("http://127.0.0.1:8080/releases/");
        assert_eq!(
            mirrored.runtime.release_url(),
            "http://127.0.0.1:8080/releases/0.27.0/pyodide-0.27.0.tar.bz2"
        );
    }

    #[test]
    fn test_default_requirements_are_fixed_list() {
        let config = StageConfig::new(".");
        let reqs: Vec<&str> = config
            .packages
            .requirements
            .iter()
            .map(PackageRequirement::as_str)
            .collect();
        assert_eq!(reqs, DEFAULT_REQUIREMENTS);
    }

    #[test]
    fn test_expected_sha_normalized() {
        let config = StageConfig::new(".").with_expected_sha256(Some("ABCDEF".to_string()));
        assert_eq!(config.runtime.expected_sha256.as_deref(), Some("abcdef"));
    }
}

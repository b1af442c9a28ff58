//! Package resolution via an external download mechanism.
//!
//! [`PackageResolver`] is the seam between the pipeline and whatever actually
//! fetches wheels. [`PipResolver`] shells out to `python -m pip download`;
//! tests substitute deterministic fakes.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::StageError;
use crate::config::MIN_PYTHON;
use crate::filter::{Portability, classify};

/// An opaque requirement specifier, e.g. `markitdown[docx,pdf]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequirement(String);

impl PackageRequirement {
    /// Borrow the specifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageRequirement {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PackageRequirement {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PackageRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One downloaded artifact sitting in scratch space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArtifact {
    /// Bare filename.
    pub filename: String,
    /// Location in scratch space.
    pub path: PathBuf,
}

impl CandidateArtifact {
    /// Wrap a scratch file. Returns `None` if the path has no UTF-8 filename.
    pub fn new(path: PathBuf) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        Some(Self { filename, path })
    }

    /// Portability derived from the filename's compatibility tag.
    pub fn portability(&self) -> Portability {
        classify(&self.filename)
    }
}

/// Resolves a fixed requirement list into candidate artifacts.
#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// Verify local tooling before any work is attempted.
    async fn check_prerequisites(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Download binary artifacts for every requirement into `scratch`.
    ///
    /// All-or-nothing: if any requirement fails the whole call fails with the
    /// mechanism's diagnostic output.
    async fn resolve(
        &self,
        requirements: &[PackageRequirement],
        scratch: &Path,
    ) -> Result<Vec<CandidateArtifact>, StageError>;
}

/// List every regular file in `scratch` as a candidate, sorted by filename.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be read.
pub fn collect_candidates(scratch: &Path) -> std::io::Result<Vec<CandidateArtifact>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(scratch)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(candidate) = CandidateArtifact::new(entry.path()) {
            candidates.push(candidate);
        }
    }
    candidates.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(candidates)
}

/// Resolver backed by `python -m pip download --only-binary=:all:`.
#[derive(Debug, Clone)]
pub struct PipResolver {
    python: String,
}

impl PipResolver {
    /// Use `python` (a name on `PATH` or an absolute path).
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn locate(&self) -> Result<PathBuf, StageError> {
        which::which(&self.python).map_err(|e| {
            StageError::PrerequisiteUnmet(format!(
                "Python interpreter '{}' not found: {e}",
                self.python
            ))
        })
    }
}

#[async_trait]
impl PackageResolver for PipResolver {
    async fn check_prerequisites(&self) -> Result<(), StageError> {
        let python = self.locate()?;

        let output = Command::new(&python)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                StageError::PrerequisiteUnmet(format!("Failed to run {}: {e}", python.display()))
            })?;

        // Old interpreters print the version on stderr
        let reported = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        let version = parse_python_version(&reported).ok_or_else(|| {
            StageError::PrerequisiteUnmet(format!(
                "Could not determine Python version from '{}'",
                reported.trim()
            ))
        })?;
        if version < MIN_PYTHON {
            return Err(StageError::PrerequisiteUnmet(format!(
                "Python {}.{} or newer is required, found {}.{}",
                MIN_PYTHON.0, MIN_PYTHON.1, version.0, version.1
            )));
        }
        tracing::info!(python = %python.display(), "Python {}.{}", version.0, version.1);

        let pip = Command::new(&python)
            .args(["-m", "pip", "--version"])
            .output()
            .await
            .map_err(|e| StageError::PrerequisiteUnmet(format!("Failed to run pip: {e}")))?;
        if !pip.status.success() {
            return Err(StageError::PrerequisiteUnmet(format!(
                "pip is not available for {}: {}",
                python.display(),
                String::from_utf8_lossy(&pip.stderr).trim()
            )));
        }

        Ok(())
    }

    async fn resolve(
        &self,
        requirements: &[PackageRequirement],
        scratch: &Path,
    ) -> Result<Vec<CandidateArtifact>, StageError> {
        let python = self.locate()?;

        let mut cmd = Command::new(&python);
        cmd.args(["-m", "pip", "download", "--dest"])
            .arg(scratch)
            .args([
                "--only-binary=:all:",
                "--disable-pip-version-check",
                "--quiet",
            ])
            .args(requirements.iter().map(PackageRequirement::as_str));

        tracing::info!(
            python = %python.display(),
            requirements = ?requirements.iter().map(PackageRequirement::as_str).collect::<Vec<_>>(),
            "running pip download"
        );

        let output = cmd.output().await.map_err(|e| {
            StageError::resolution(format!("Failed to run {}: {e}", python.display()))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(StageError::resolution(format!(
                "pip download exited with {}:\n{diagnostic}",
                output.status
            )));
        }

        collect_candidates(scratch)
            .map_err(|e| StageError::io(format!("Failed to read {}", scratch.display()), e))
    }
}

/// Parse `Python 3.11.4` (or `3.11`) into `(major, minor)`.
pub fn parse_python_version(text: &str) -> Option<(u32, u32)> {
    let version = text.trim().strip_prefix("Python").unwrap_or(text).trim();
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    Some((major, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python_version() {
        assert_eq!(parse_python_version("Python 3.11.4\n"), Some((3, 11)));
        assert_eq!(parse_python_version("Python 3.13.0rc1"), Some((3, 13)));
        assert_eq!(parse_python_version("3.10"), Some((3, 10)));
        assert_eq!(parse_python_version("Python 3.12b1"), Some((3, 12)));
        assert_eq!(parse_python_version("Python"), None);
        assert_eq!(parse_python_version("garbage"), None);
    }

    #[test]
    fn test_collect_candidates_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-1.0-py3-none-any.whl"), b"").unwrap();
        std::fs::write(dir.path().join("a-1.0-py3-none-any.whl"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let names: Vec<String> = collect_candidates(dir.path())
            .unwrap()
            .into_iter()
            .map(|c| c.filename)
            .collect();
        assert_eq!(
            names,
            vec!["a-1.0-py3-none-any.whl", "b-1.0-py3-none-any.whl"]
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_prerequisite_error() {
        let resolver = PipResolver::new("/nonexistent/stagehand-python");
        let err = resolver.check_prerequisites().await.unwrap_err();
        assert!(matches!(err, StageError::PrerequisiteUnmet(_)));
    }

    #[cfg(unix)]
    fn fake_python(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("python3");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_old_python_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(dir.path(), "echo 'Python 3.8.10'");
        let resolver = PipResolver::new(python.to_string_lossy());

        let err = resolver.check_prerequisites().await.unwrap_err();
        assert!(err.to_string().contains("3.10 or newer"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(
            dir.path(),
            "echo 'ERROR: No matching distribution found for beta' >&2\nexit 1",
        );
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();

        let resolver = PipResolver::new(python.to_string_lossy());
        let reqs = [PackageRequirement::from("alpha"), "beta".into()];
        let err = resolver.resolve(&reqs, &scratch).await.unwrap_err();

        match err {
            StageError::Resolution { diagnostic } => {
                assert!(diagnostic.contains("No matching distribution found for beta"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_download_lists_scratch() {
        let dir = tempfile::tempdir().unwrap();
        // Mimic `pip download --dest <dir> ...` by writing into the --dest argument
        let python = fake_python(
            dir.path(),
            "touch \"$5/gamma-1.2-py3-none-any.whl\" \"$5/alpha-1.0-py3-none-any.whl\"",
        );
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();

        let resolver = PipResolver::new(python.to_string_lossy());
        let reqs = [PackageRequirement::from("alpha"), "gamma".into()];
        let candidates = resolver.resolve(&reqs, &scratch).await.unwrap();

        let names: Vec<&str> = candidates.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["alpha-1.0-py3-none-any.whl", "gamma-1.2-py3-none-any.whl"]
        );
    }
}

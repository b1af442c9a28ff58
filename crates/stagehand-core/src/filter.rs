//! Platform filter for wheel artifacts.
//!
//! A wheel filename is `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
//! Each of the three trailing tags may be a compressed set joined by `.`
//! (e.g. `py2.py3`). An artifact is platform-independent iff every ABI tag is
//! `none` and every platform tag is `any`. Anything that does not parse as a
//! wheel name is treated as platform-specific.

use std::fmt;
use std::path::Path;

use crate::Reporter;
use crate::resolver::CandidateArtifact;

/// Outcome of classifying one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Portability {
    /// No native code; usable by any runtime on any platform.
    Independent,
    /// Tied to an interpreter ABI or platform, or not verifiably portable.
    PlatformSpecific,
}

impl fmt::Display for Portability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Independent => f.write_str("platform-independent"),
            Self::PlatformSpecific => f.write_str("platform-specific"),
        }
    }
}

/// The compatibility tag triple of a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelTag {
    /// Interpreter tag set, e.g. `py3` or `cp311`.
    pub python: String,
    /// ABI tag set, e.g. `none` or `cp311`.
    pub abi: String,
    /// Platform tag set, e.g. `any` or `manylinux_2_17_x86_64`.
    pub platform: String,
}

impl WheelTag {
    /// Parse the tag triple out of a wheel filename.
    ///
    /// Returns `None` for anything that is not a well-formed wheel name.
    ///
    /// ```
    /// use stagehand_core::WheelTag;
    ///
    /// let tag = WheelTag::parse("six-1.16.0-py2.py3-none-any.whl").unwrap();
    /// assert_eq!(tag.python, "py2.py3");
    /// assert!(WheelTag::parse("six-1.16.0.tar.gz").is_none());
    /// ```
    pub fn parse(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(".whl")?;
        let parts: Vec<&str> = stem.split('-').collect();

        let (head, tags) = match parts.len() {
            5 => parts.split_at(2),
            6 => {
                // Build tags must start with a digit
                if !parts[2].starts_with(|c: char| c.is_ascii_digit()) {
                    return None;
                }
                parts.split_at(3)
            }
            _ => return None,
        };

        if head.iter().chain(tags).any(|p| p.is_empty()) {
            return None;
        }
        if tags.iter().any(|t| t.split('.').any(str::is_empty)) {
            return None;
        }

        Some(Self {
            python: tags[0].to_string(),
            abi: tags[1].to_string(),
            platform: tags[2].to_string(),
        })
    }

    /// Classify this tag triple.
    pub fn portability(&self) -> Portability {
        let no_abi = self.abi.split('.').all(|t| t == "none");
        let any_platform = self.platform.split('.').all(|t| t == "any");

        if no_abi && any_platform {
            Portability::Independent
        } else {
            Portability::PlatformSpecific
        }
    }
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

/// Classify an artifact by filename. Malformed names fail closed.
pub fn classify(filename: &str) -> Portability {
    WheelTag::parse(filename).map_or(Portability::PlatformSpecific, |t| t.portability())
}

/// Kept and rejected filenames from one filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Filenames moved into the destination.
    pub kept: Vec<String>,
    /// Filenames deleted from scratch space.
    pub skipped: Vec<String>,
}

/// Apply the filter to resolved candidates.
///
/// Independent artifacts are moved into `dest`; platform-specific ones are
/// deleted from scratch immediately. Every decision is reported by filename.
///
/// # Errors
///
/// Returns the first filesystem error encountered while moving or deleting.
pub fn sift(
    candidates: Vec<CandidateArtifact>,
    dest: &Path,
    reporter: &dyn Reporter,
) -> std::io::Result<FilterOutcome> {
    std::fs::create_dir_all(dest)?;
    let mut outcome = FilterOutcome::default();

    for candidate in candidates {
        match classify(&candidate.filename) {
            Portability::Independent => {
                std::fs::rename(&candidate.path, dest.join(&candidate.filename))?;
                tracing::debug!(filename = %candidate.filename, "keeping artifact");
                reporter.kept(&candidate.filename);
                outcome.kept.push(candidate.filename);
            }
            Portability::PlatformSpecific => {
                std::fs::remove_file(&candidate.path)?;
                tracing::info!(filename = %candidate.filename, "skipping platform-specific artifact");
                reporter.skipped(&candidate.filename);
                outcome.skipped.push(candidate.filename);
            }
        }
    }

    Ok(outcome)
}

//! stagehand-core - staging pipeline for offline browser runtime bundles.
//!
//! Fetches a versioned runtime archive, resolves a fixed set of Python
//! requirements into wheels, keeps only the platform-independent ones and
//! writes the manifest the in-browser loader reads.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── pyodide/            # Extracted runtime (pyodide.js marks completion)
//! ├── wheels/             # Staged platform-independent wheels
//! │   └── manifest.json   # Sorted list of staged wheel filenames
//! └── .stagehand-tmp/     # Working area, swept at the start of every run
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod manifest;
pub mod pipeline;
pub mod reporter;
pub mod resolver;
pub mod runtime;
pub mod store;

pub use config::StageConfig;
pub use error::StageError;
pub use filter::{Portability, WheelTag, classify};
pub use manifest::{Manifest, ManifestWriter};
pub use pipeline::{StageReport, Stager};
pub use reporter::{NullReporter, Reporter};
pub use resolver::{CandidateArtifact, PackageRequirement, PackageResolver, PipResolver};
pub use runtime::{RuntimeFetcher, RuntimeRelease};
pub use store::ArtifactStore;

/// User Agent string for runtime downloads
pub const USER_AGENT: &str = concat!("stagehand/", env!("CARGO_PKG_VERSION"));

/// Extract the filename from a URL.
///
/// # Example
///
/// ```
/// use stagehand_core::filename_from_url;
///
/// assert_eq!(filename_from_url("https://example.com/r/0.26.4/pyodide-0.26.4.tar.bz2"), "pyodide-0.26.4.tar.bz2");
/// assert_eq!(filename_from_url(""), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

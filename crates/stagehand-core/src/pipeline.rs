//! Staging Flow Typestate Pattern
//!
//! Models one staging run as a series of explicit state transitions:
//!
//! ```text
//! Init --[ensure_runtime()]--> RuntimeReady --[ensure_packages()]--> PackagesReady --[write_manifest()]--> StageReport
//! ```
//!
//! Each transition consults the [`ArtifactStore`] first and only does network
//! work on a cache miss. The manifest is rewritten on every run, so a fully
//! cached run still produces a manifest that matches the cache exactly.
//!
//! # Usage
//!
//! ```ignore
//! let stager = Stager::new(config, client, PipResolver::new("python3"), reporter);
//! let report = stager.run().await?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;

use crate::filter::{self, FilterOutcome};
use crate::{
    ArtifactStore, Manifest, ManifestWriter, PackageResolver, Reporter, RuntimeFetcher,
    RuntimeRelease, StageConfig, StageError,
};

/// Everything needed to run the pipeline against one bundle root.
pub struct Stager<R> {
    config: StageConfig,
    store: ArtifactStore,
    fetcher: RuntimeFetcher,
    resolver: R,
    reporter: Arc<dyn Reporter>,
}

impl<R> fmt::Debug for Stager<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stager")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// State 1: working area prepared, prerequisites for pending stages verified.
///
/// # Transitions
///
/// - [`ensure_runtime()`](Self::ensure_runtime) -> [`RuntimeReady`]
#[derive(Debug)]
pub struct Init {
    _private: (),
}

/// State 2: the runtime root is complete.
///
/// # Transitions
///
/// - [`ensure_packages()`](Self::ensure_packages) -> [`PackagesReady`]
#[derive(Debug)]
pub struct RuntimeReady {
    /// The staged release.
    pub runtime: RuntimeRelease,
    /// True if no download was needed.
    pub runtime_cached: bool,
}

/// State 3: the package cache holds the final artifact set.
///
/// # Transitions
///
/// - [`write_manifest()`](Self::write_manifest) -> [`StageReport`]
#[derive(Debug)]
pub struct PackagesReady {
    /// Runtime stage result.
    pub runtime: RuntimeReady,
    /// True if resolution was skipped because artifacts were already staged.
    pub packages_cached: bool,
    /// Decisions made by the filter (empty on a cache hit).
    pub filtered: FilterOutcome,
}

/// Terminal state: what one run did and the manifest it wrote.
#[derive(Debug)]
pub struct StageReport {
    /// The staged runtime release.
    pub runtime: RuntimeRelease,
    /// True if the runtime was already present.
    pub runtime_cached: bool,
    /// True if package resolution was skipped.
    pub packages_cached: bool,
    /// Artifacts staged by this run.
    pub kept: Vec<String>,
    /// Artifacts rejected as platform-specific by this run.
    pub skipped: Vec<String>,
    /// The manifest as written.
    pub manifest: Manifest,
    /// Where it was written.
    pub manifest_path: PathBuf,
}

impl<R: PackageResolver> Stager<R> {
    /// Assemble a pipeline for `config`.
    pub fn new(
        config: StageConfig,
        client: Client,
        resolver: R,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let store = ArtifactStore::new(&config);
        let fetcher = RuntimeFetcher::new(client, config.runtime.clone());
        Self {
            config,
            store,
            fetcher,
            resolver,
            reporter,
        }
    }

    /// The store this pipeline stages into.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The configuration in effect.
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Run every stage in order.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; later stages do not run and no manifest
    /// is written.
    pub async fn run(&self) -> Result<StageReport, StageError> {
        let init = self.begin().await?;
        let runtime = init.ensure_runtime(self).await?;
        let packages = runtime.ensure_packages(self).await?;
        packages.write_manifest(self).await
    }

    /// Sweep the working area and check tooling for the stages that will run.
    ///
    /// The interpreter is only required when the package cache is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::PrerequisiteUnmet`] before any other work, or an
    /// IO error if the package cache cannot be read or the working area
    /// cannot be prepared.
    pub async fn begin(&self) -> Result<Init, StageError> {
        if self.list_staged()?.is_empty() {
            self.resolver.check_prerequisites().await?;
        }
        self.store
            .prepare_work_dir()
            .map_err(|e| StageError::io("Failed to prepare working area", e))?;
        Ok(Init { _private: () })
    }

    /// Rewrite the manifest from the current cache without touching anything else.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be listed or the manifest written.
    pub async fn write_manifest_only(&self) -> Result<Manifest, StageError> {
        let staged = self.list_staged()?;
        ManifestWriter::new(self.store.manifest_path())
            .write(staged)
            .await
    }

    fn list_staged(&self) -> Result<std::collections::BTreeSet<String>, StageError> {
        self.store.list_staged().map_err(|e| {
            StageError::io(
                format!("Failed to read {}", self.store.packages_dir().display()),
                e,
            )
        })
    }
}

impl Init {
    /// Stage the runtime unless it is already complete.
    ///
    /// # Errors
    ///
    /// Propagates any fetch failure unchanged.
    pub async fn ensure_runtime<R: PackageResolver>(
        self,
        stager: &Stager<R>,
    ) -> Result<RuntimeReady, StageError> {
        let version = stager.config.runtime.version.as_str();
        let store = &stager.store;
        let reporter = &stager.reporter;

        reporter.section(&format!("Runtime {version}"));

        if store.has_runtime(version) {
            // Describe what is on disk, not what was asked for
            let staged = store.runtime_version();
            if let Some(staged) = staged.as_deref().filter(|&s| s != version) {
                tracing::warn!(staged, configured = version, "runtime version differs");
                reporter.warning(&format!(
                    "{} holds runtime {staged}, configured {version}. Run `stagehand clean --runtime` to re-fetch.",
                    store.runtime_root().display()
                ));
            }
            reporter.info(&format!(
                "{} already present, skipping download",
                store.runtime_root().display()
            ));
            return Ok(RuntimeReady {
                runtime: stager
                    .fetcher
                    .release(staged.as_deref().unwrap_or(version), store),
                runtime_cached: true,
            });
        }

        let runtime = stager.fetcher.fetch(version, store, reporter).await?;
        reporter.success(&format!("Runtime {version} extracted"));

        Ok(RuntimeReady {
            runtime,
            runtime_cached: false,
        })
    }
}

impl RuntimeReady {
    /// Resolve and filter the requirement list unless artifacts are already staged.
    ///
    /// # Errors
    ///
    /// A resolver failure aborts before any filtering; nothing is staged.
    pub async fn ensure_packages<R: PackageResolver>(
        self,
        stager: &Stager<R>,
    ) -> Result<PackagesReady, StageError> {
        let store = &stager.store;
        let reporter = &stager.reporter;

        reporter.section("Packages");

        let count = stager.list_staged()?.len();
        if count > 0 {
            reporter.info(&format!(
                "{} already holds {count} packages, skipping download",
                store.packages_dir().display()
            ));
            return Ok(PackagesReady {
                runtime: self,
                packages_cached: true,
                filtered: FilterOutcome::default(),
            });
        }

        let work = tempfile::Builder::new()
            .prefix("packages-")
            .tempdir_in(store.work_dir())
            .map_err(|e| StageError::io("Failed to create scratch space", e))?;
        let scratch = work.path().join("scratch");
        let staging = work.path().join("staging");
        std::fs::create_dir_all(&scratch)
            .map_err(|e| StageError::io("Failed to create scratch space", e))?;

        let requirements = &stager.config.packages.requirements;
        reporter.info(&format!("Resolving {} requirements", requirements.len()));

        let candidates = stager.resolver.resolve(requirements, &scratch).await?;
        tracing::info!(candidates = candidates.len(), "resolution complete");

        let filtered = filter::sift(candidates, &staging, reporter.as_ref())
            .map_err(|e| StageError::io("Failed to filter candidates", e))?;

        store
            .publish_packages(&staging)
            .map_err(|e| StageError::io("Failed to publish packages", e))?;

        if !filtered.skipped.is_empty() {
            reporter.info(&format!(
                "Skipped {} platform-specific packages (provided by the runtime)",
                filtered.skipped.len()
            ));
        }
        reporter.success(&format!("Kept {} platform-independent packages", filtered.kept.len()));

        Ok(PackagesReady {
            runtime: self,
            packages_cached: false,
            filtered,
        })
    }
}

impl PackagesReady {
    /// Write the manifest as a projection of the package cache, then remove
    /// the working area.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be listed or the manifest written.
    pub async fn write_manifest<R: PackageResolver>(
        self,
        stager: &Stager<R>,
    ) -> Result<StageReport, StageError> {
        let manifest_path = stager.store.manifest_path();
        let manifest = stager.write_manifest_only().await?;

        stager
            .store
            .sweep_work_dir()
            .map_err(|e| StageError::io("Failed to remove working area", e))?;

        stager.reporter.success(&format!(
            "Wrote {} ({} packages)",
            manifest_path.display(),
            manifest.len()
        ));

        Ok(StageReport {
            runtime: self.runtime.runtime,
            runtime_cached: self.runtime.runtime_cached,
            packages_cached: self.packages_cached,
            kept: self.filtered.kept,
            skipped: self.filtered.skipped,
            manifest,
            manifest_path,
        })
    }
}

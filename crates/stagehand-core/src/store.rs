//! Filesystem-backed artifact store.
//!
//! Owns every path the pipeline reads or writes and answers the cache
//! questions the orchestrator asks before doing network work. Outputs only
//! become visible through a rename, so an interrupted run never leaves a
//! runtime root that passes [`ArtifactStore::has_runtime`].

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{StageConfig, WORK_DIR_NAME};

/// File written into the runtime root recording which release it holds.
pub const VERSION_STAMP: &str = ".stagehand-version";

/// Extension of files counted as staged artifacts.
pub const ARTIFACT_EXTENSION: &str = "whl";

/// Paths and cache queries for one bundle root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    runtime_dir_name: String,
    runtime_root: PathBuf,
    marker: String,
    packages_dir: PathBuf,
    manifest_name: String,
    work_dir: PathBuf,
}

impl ArtifactStore {
    /// Store for the layout described by `config`.
    pub fn new(config: &StageConfig) -> Self {
        let root = config.root.clone();
        Self {
            runtime_dir_name: config.runtime.dir_name.clone(),
            runtime_root: root.join(&config.runtime.dir_name),
            marker: config.runtime.marker.clone(),
            packages_dir: root.join(&config.packages.dir_name),
            manifest_name: config.packages.manifest_name.clone(),
            work_dir: root.join(WORK_DIR_NAME),
            root,
        }
    }

    /// Bundle root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name the runtime archive unpacks into.
    pub fn runtime_dir_name(&self) -> &str {
        &self.runtime_dir_name
    }

    /// Final runtime root.
    pub fn runtime_root(&self) -> &Path {
        &self.runtime_root
    }

    /// Marker filename whose presence means the runtime is complete.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Package cache directory.
    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    /// Manifest location inside the package cache.
    pub fn manifest_path(&self) -> PathBuf {
        self.packages_dir.join(&self.manifest_name)
    }

    /// Working area for downloads, extraction and scratch space.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// True iff the runtime root exists and holds its marker file.
    ///
    /// The root is shared by all versions; `version` is only compared against
    /// the recorded stamp by callers that care (see [`Self::runtime_version`]).
    pub fn has_runtime(&self, version: &str) -> bool {
        let complete = self.runtime_root.join(&self.marker).is_file();
        tracing::debug!(version, complete, root = %self.runtime_root.display(), "runtime cache check");
        complete
    }

    /// Version recorded in the runtime root, if any.
    pub fn runtime_version(&self) -> Option<String> {
        fs::read_to_string(self.runtime_root.join(VERSION_STAMP))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// True iff the package cache holds at least one artifact.
    ///
    /// A single artifact is enough: the package stage is all-or-nothing.
    /// An unreadable cache counts as empty; callers that must not re-resolve
    /// over it should use [`Self::list_staged`] and propagate the error.
    pub fn has_packages(&self) -> bool {
        match self.list_staged() {
            Ok(staged) => !staged.is_empty(),
            Err(e) => {
                tracing::warn!(path = %self.packages_dir.display(), error = %e, "package cache unreadable");
                false
            }
        }
    }

    /// Artifact filenames currently in the package cache.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the path exists but cannot be read as a
    /// directory.
    pub fn list_staged(&self) -> io::Result<BTreeSet<String>> {
        list_artifacts(&self.packages_dir)
    }

    /// Remove anything left in the working area by an interrupted run.
    ///
    /// Returns `true` if stale state was found.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the working area cannot be removed.
    pub fn sweep_work_dir(&self) -> io::Result<bool> {
        if !self.work_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.work_dir)?;
        Ok(true)
    }

    /// Sweep and recreate the working area.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be removed or created.
    pub fn prepare_work_dir(&self) -> io::Result<&Path> {
        if self.sweep_work_dir()? {
            tracing::info!(path = %self.work_dir.display(), "removed stale working area");
        }
        fs::create_dir_all(&self.work_dir)?;
        Ok(&self.work_dir)
    }

    /// Make a fully extracted runtime visible as the runtime root.
    ///
    /// `extracted` must already contain the marker. The version stamp is
    /// written before the rename, and any incomplete root left by an earlier
    /// run is removed first.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the stamp, removal or rename fails.
    pub fn publish_runtime(&self, extracted: &Path, version: &str) -> io::Result<()> {
        fs::write(extracted.join(VERSION_STAMP), version)?;

        if self.runtime_root.exists() {
            tracing::warn!(path = %self.runtime_root.display(), "replacing incomplete runtime root");
            fs::remove_dir_all(&self.runtime_root)?;
        }
        if let Some(parent) = self.runtime_root.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(extracted, &self.runtime_root)
    }

    /// Move the artifacts in `staging` into the package cache.
    ///
    /// When the cache holds nothing but (at most) a stale manifest, the whole
    /// staging directory is published with one rename so an interruption
    /// cannot leave a partial set behind. Otherwise files are moved one by one.
    ///
    /// # Errors
    ///
    /// Returns an IO error if listing, removal or any rename fails.
    pub fn publish_packages(&self, staging: &Path) -> io::Result<BTreeSet<String>> {
        let staged = list_artifacts(staging)?;

        let whole = if self.packages_dir.exists() {
            let manifest = self.manifest_path();
            if manifest.is_file() {
                fs::remove_file(&manifest)?;
            }
            // Only succeeds on an empty directory
            fs::remove_dir(&self.packages_dir).is_ok()
        } else {
            true
        };

        if whole {
            if let Some(parent) = self.packages_dir.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(staging, &self.packages_dir)?;
        } else {
            for name in &staged {
                fs::rename(staging.join(name), self.packages_dir.join(name))?;
            }
        }

        Ok(staged)
    }

    /// Delete the runtime root. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if removal fails.
    pub fn clear_runtime(&self) -> io::Result<bool> {
        remove_if_exists(&self.runtime_root)
    }

    /// Delete the package cache (manifest included). Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if removal fails.
    pub fn clear_packages(&self) -> io::Result<bool> {
        remove_if_exists(&self.packages_dir)
    }
}

/// Total size in bytes of regular files under `path` (0 if absent).
pub fn disk_usage(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn list_artifacts(dir: &Path) -> io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    if !dir.exists() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file()
            || path.extension().is_none_or(|ext| ext != ARTIFACT_EXTENSION)
        {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path)?;
    Ok(true)
}

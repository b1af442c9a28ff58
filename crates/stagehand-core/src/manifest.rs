//! Wheel manifest read by the in-browser loader.
//!
//! The manifest is a JSON array of staged wheel filenames, sorted
//! lexicographically so repeated runs over the same cache produce identical
//! bytes. It is never edited in place: every run rewrites it from the
//! current cache contents.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::StageError;

/// Sorted list of staged artifact filenames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Build from any set of filenames; duplicates collapse and order is sorted.
    pub fn from_filenames<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = filenames.into_iter().map(Into::into).collect();
        Self {
            entries: sorted.into_iter().collect(),
        }
    }

    /// Filenames in manifest order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no artifacts are listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized form written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a previously written manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON string array.
    pub async fn load(path: &Path) -> Result<Self, StageError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StageError::io(format!("Failed to read {}", path.display()), e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Writes the manifest to its fixed path.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    /// Writer targeting `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Manifest location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sort `filenames` and overwrite the manifest unconditionally.
    ///
    /// The file is first written to a temporary sibling and then renamed so
    /// readers never observe a partially written manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, directory creation, writing or the
    /// rename fails.
    pub async fn write<I, S>(&self, filenames: I) -> Result<Manifest, StageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let manifest = Manifest::from_filenames(filenames);
        let content = manifest.to_json()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StageError::io(format!("Failed to write {}", temp_path.display()), e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StageError::io(format!("Failed to replace {}", self.path.display()), e))?;

        tracing::info!(path = %self.path.display(), entries = manifest.len(), "manifest written");
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_sorts_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ManifestWriter::new(dir.path().join("wheels/manifest.json"));

        let manifest = writer
            .write([
                "gamma-1.2-py3-none-any.whl",
                "alpha-1.0-py3-none-any.whl",
                "gamma-1.2-py3-none-any.whl",
            ])
            .await
            .unwrap();

        assert_eq!(
            manifest.entries(),
            ["alpha-1.0-py3-none-any.whl", "gamma-1.2-py3-none-any.whl"]
        );
        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert_eq!(
            text,
            "[\n  \"alpha-1.0-py3-none-any.whl\",\n  \"gamma-1.2-py3-none-any.whl\"\n]"
        );
        assert_eq!(Manifest::load(writer.path()).await.unwrap(), manifest);
    }

    #[tokio::test]
    async fn test_overwrites_unconditionally() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ManifestWriter::new(dir.path().join("manifest.json"));

        writer.write(["old-1.0-py3-none-any.whl"]).await.unwrap();
        let manifest = writer.write(Vec::<String>::new()).await.unwrap();

        assert!(manifest.is_empty());
        assert_eq!(std::fs::read_to_string(writer.path()).unwrap(), "[]");
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{\"a\": 1}").unwrap();
        assert!(matches!(
            Manifest::load(&path).await,
            Err(StageError::Manifest(_))
        ));
    }
}

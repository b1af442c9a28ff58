//! Runtime archive retrieval.
//!
//! The archive is downloaded and unpacked inside a temporary directory in the
//! store's working area. Only once the marker file is present is the unpacked
//! tree renamed into place, so a failed or interrupted fetch never leaves a
//! root that looks complete. The temporary directory (and the archive in it)
//! is dropped on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;

use crate::config::RuntimeConfig;
use crate::io::download::DownloadRequest;
use crate::io::extract::{ExtractError, extract_archive};
use crate::{ArtifactStore, Reporter, StageError, filename_from_url};

/// A staged (or to-be-staged) runtime release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRelease {
    /// Release version.
    pub version: String,
    /// Archive download URL.
    pub url: String,
    /// Extraction root inside the bundle.
    pub root: PathBuf,
}

/// Downloads and unpacks runtime releases.
#[derive(Debug, Clone)]
pub struct RuntimeFetcher {
    client: Client,
    config: RuntimeConfig,
}

impl RuntimeFetcher {
    /// Fetcher using `client` and the release location in `config`.
    pub fn new(client: Client, config: RuntimeConfig) -> Self {
        Self { client, config }
    }

    /// Download URL for `version`.
    pub fn release_url(&self, version: &str) -> String {
        RuntimeConfig {
            version: version.to_string(),
            ..self.config.clone()
        }
        .release_url()
    }

    /// Describe `version` as it would be staged in `store`.
    pub fn release(&self, version: &str, store: &ArtifactStore) -> RuntimeRelease {
        RuntimeRelease {
            version: version.to_string(),
            url: self.release_url(version),
            root: store.runtime_root().to_path_buf(),
        }
    }

    /// Download, extract and publish `version` into `store`.
    ///
    /// # Errors
    ///
    /// - [`StageError::Network`] if the archive cannot be downloaded.
    /// - [`StageError::Integrity`] if a configured digest does not match.
    /// - [`StageError::Extraction`] if the archive is unreadable or does not
    ///   produce the marker file.
    /// - [`StageError::Io`] for working-area or publish failures.
    pub async fn fetch(
        &self,
        version: &str,
        store: &ArtifactStore,
        reporter: &Arc<dyn Reporter>,
    ) -> Result<RuntimeRelease, StageError> {
        let release = self.release(version, store);

        tokio::fs::create_dir_all(store.work_dir())
            .await
            .map_err(|e| StageError::io("Failed to create working area", e))?;
        let work = tempfile::Builder::new()
            .prefix("runtime-")
            .tempdir_in(store.work_dir())
            .map_err(|e| StageError::io("Failed to create temporary directory", e))?;

        let archive = work.path().join(filename_from_url(&release.url));
        reporter.info(&format!("Downloading {}", release.url));

        let downloaded = DownloadRequest::new(
            &self.client,
            store.runtime_dir_name(),
            version,
            &release.url,
            &archive,
            reporter.as_ref(),
        )
        .with_expected_hash(self.config.expected_sha256.as_deref())
        .execute()
        .await?;

        tracing::info!(sha256 = %downloaded.sha256, bytes = downloaded.bytes, "runtime archive downloaded");

        let extract_dir = work.path().join("extract");
        let entries = unpack(
            &archive,
            &extract_dir,
            store.runtime_dir_name(),
            version,
            reporter,
        )
        .await?;

        tokio::fs::remove_file(&archive)
            .await
            .map_err(|e| StageError::io("Failed to remove runtime archive", e))?;

        let extracted_root = extract_dir.join(store.runtime_dir_name());
        if !extracted_root.join(store.marker()).is_file() {
            return Err(ExtractError::MissingMarker(
                Path::new(store.runtime_dir_name()).join(store.marker()),
            )
            .into());
        }

        store
            .publish_runtime(&extracted_root, version)
            .map_err(|e| StageError::io("Failed to publish runtime root", e))?;

        tracing::info!(version, entries, root = %release.root.display(), "runtime staged");
        Ok(release)
    }
}

/// Unpack on the blocking pool, reporting entry counts as it goes.
async fn unpack(
    archive: &Path,
    dest: &Path,
    name: &str,
    version: &str,
    reporter: &Arc<dyn Reporter>,
) -> Result<u64, StageError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let name = name.to_string();
    let version = version.to_string();
    let reporter = Arc::clone(reporter);

    tokio::task::spawn_blocking(move || {
        extract_archive(&archive, &dest, |n| {
            if n % 256 == 0 {
                reporter.extracting(&name, &version, n);
            }
        })
    })
    .await
    .map_err(|e| StageError::Extraction(ExtractError::Io(std::io::Error::other(e))))?
    .map_err(StageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::extract::tests::tar_bz2;
    use crate::{NullReporter, StageConfig};
    use mockito::Server;

    fn reporter() -> Arc<dyn Reporter> {
        Arc::new(NullReporter)
    }

    fn setup(server_url: &str, root: &Path) -> (StageConfig, ArtifactStore, RuntimeFetcher) {
        let config = StageConfig::new(root)
            .with_runtime_version("0.26.4")
            .with_release_base_url(server_url);
        let store = ArtifactStore::new(&config);
        let fetcher = RuntimeFetcher::new(Client::new(), config.runtime.clone());
        (config, store, fetcher)
    }

    #[tokio::test]
    async fn test_fetch_extracts_and_cleans_up() {
        let mut server = Server::new_async().await;
        let body = tar_bz2(&[
            ("pyodide/pyodide.js", &b"// loader"[..]),
            ("pyodide/pyodide.asm.wasm", &b"\0asm"[..]),
        ]);
        let m = server
            .mock("GET", "/0.26.4/pyodide-0.26.4.tar.bz2")
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, store, fetcher) = setup(&server.url(), dir.path());

        let release = fetcher.fetch("0.26.4", &store, &reporter()).await.unwrap();

        m.assert_async().await;
        assert_eq!(release.root, dir.path().join("pyodide"));
        assert!(store.has_runtime("0.26.4"));
        assert!(release.root.join("pyodide.asm.wasm").is_file());
        assert_eq!(store.runtime_version().as_deref(), Some("0.26.4"));

        // No archive or extraction leftovers in the working area
        let leftovers: Vec<_> = std::fs::read_dir(store.work_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_http_failure_leaves_no_root() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/0.26.4/pyodide-0.26.4.tar.bz2")
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, store, fetcher) = setup(&server.url(), dir.path());

        let err = fetcher
            .fetch("0.26.4", &store, &reporter())
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Network(_)));
        assert!(!store.runtime_root().exists());
        assert_eq!(std::fs::read_dir(store.work_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_extraction_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/0.26.4/pyodide-0.26.4.tar.bz2")
            .with_status(200)
            .with_body("truncated garbage")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, store, fetcher) = setup(&server.url(), dir.path());

        let err = fetcher
            .fetch("0.26.4", &store, &reporter())
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Extraction(_)));
        assert!(!store.has_runtime("0.26.4"));
        assert!(!store.runtime_root().exists());
    }

    #[tokio::test]
    async fn test_missing_marker_is_extraction_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/0.26.4/pyodide-0.26.4.tar.bz2")
            .with_status(200)
            .with_body(tar_bz2(&[("pyodide/other.js", &b"x"[..])]))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, store, fetcher) = setup(&server.url(), dir.path());

        let err = fetcher
            .fetch("0.26.4", &store, &reporter())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StageError::Extraction(ExtractError::MissingMarker(_))
        ));
        assert!(!store.runtime_root().exists());
    }

    #[tokio::test]
    async fn test_digest_mismatch_is_integrity_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/0.26.4/pyodide-0.26.4.tar.bz2")
            .with_status(200)
            .with_body(tar_bz2(&[("pyodide/pyodide.js", &b"x"[..])]))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::new(dir.path())
            .with_release_base_url(server.url())
            .with_expected_sha256(Some("0".repeat(64)));
        let store = ArtifactStore::new(&config);
        let fetcher = RuntimeFetcher::new(Client::new(), config.runtime.clone());

        let err = fetcher
            .fetch("0.26.4", &store, &reporter())
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Integrity { .. }));
        assert!(!store.runtime_root().exists());
    }
}

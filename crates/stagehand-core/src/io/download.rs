//! Async download module with streaming SHA256 and progress reporting.
//!
//! The whole body is streamed to `dest` while being hashed. There is no retry
//! and no resume: a failed transfer leaves a partial file that the caller's
//! temporary directory is expected to clean up.

use std::fmt;
use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::Reporter;

/// Failures while transferring a file.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Connection, status or body-stream failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local write failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The received bytes do not hash to the expected digest.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected SHA-256 (hex).
        expected: String,
        /// Actual SHA-256 (hex).
        actual: String,
    },
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// SHA-256 of the received bytes (hex).
    pub sha256: String,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    /// HTTP client.
    pub client: &'a Client,
    /// Display name for progress reporting.
    pub name: &'a str,
    /// Display version for progress reporting.
    pub version: &'a str,
    /// Source URL.
    pub url: &'a str,
    /// Destination file; created or truncated.
    pub dest: &'a Path,
    /// Digest the body must match, if known.
    pub expected_hash: Option<&'a str>,
    /// Progress sink.
    pub reporter: &'a dyn Reporter,
}

impl fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("dest", &self.dest)
            .field("expected_hash", &self.expected_hash)
            .finish_non_exhaustive()
    }
}

impl<'a> DownloadRequest<'a> {
    /// Create a request without digest verification.
    pub fn new(
        client: &'a Client,
        name: &'a str,
        version: &'a str,
        url: &'a str,
        dest: &'a Path,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            client,
            name,
            version,
            url,
            dest,
            expected_hash: None,
            reporter,
        }
    }

    /// Verify the body against `expected_hash` once the transfer completes.
    pub fn with_expected_hash(mut self, expected_hash: Option<&'a str>) -> Self {
        self.expected_hash = expected_hash;
        self
    }

    /// Execute the download.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Http`] for any network or non-success status,
    /// [`DownloadError::Io`] if `dest` cannot be written, and
    /// [`DownloadError::HashMismatch`] if verification fails (the file is
    /// removed in that case).
    pub async fn execute(self) -> Result<Downloaded, DownloadError> {
        let response = self
            .client
            .get(self.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        let total_size = response.content_length();
        self.reporter
            .downloading(self.name, self.version, 0, total_size);

        let mut file = File::create(self.dest).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            self.reporter
                .downloading(self.name, self.version, downloaded, total_size);
        }

        file.flush().await?;
        let actual_hash = hex::encode(hasher.finalize());

        if let Some(expected) = self.expected_hash {
            if actual_hash != expected {
                tokio::fs::remove_file(self.dest).await.ok();
                return Err(DownloadError::HashMismatch {
                    expected: expected.to_string(),
                    actual: actual_hash,
                });
            }
        }

        tracing::debug!(url = self.url, bytes = downloaded, sha256 = %actual_hash, "download complete");

        Ok(Downloaded {
            sha256: actual_hash,
            bytes: downloaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use mockito::Server;

    #[tokio::test]
    async fn test_download_writes_body_and_hashes() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let client = Client::new();
        let url = format!("{}/file.bin", server.url());

        let got = DownloadRequest::new(&client, "file", "1", &url, &dest, &NullReporter)
            .execute()
            .await
            .unwrap();

        assert_eq!(got.bytes, 5);
        assert_eq!(
            got.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_hash_mismatch_removes_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let client = Client::new();
        let url = format!("{}/file.bin", server.url());

        let err = DownloadRequest::new(&client, "file", "1", &url, &dest, &NullReporter)
            .with_expected_hash(Some("00"))
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::HashMismatch { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_http_status_is_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.bin")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.bin");
        let client = Client::new();
        let url = format!("{}/missing.bin", server.url());

        let err = DownloadRequest::new(&client, "file", "1", &url, &dest, &NullReporter)
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Http(_)));
    }
}

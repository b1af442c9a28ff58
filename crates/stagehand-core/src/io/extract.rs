//! Archive extraction module
//!
//! Runtime releases ship as `.tar.bz2`; that is the only format unpacked here.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use thiserror::Error;

/// Failures while unpacking an archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Read/write failure, including corrupt compressed streams.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive extension is not one we can unpack.
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// The archive contents are unusable.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Extraction finished but the expected completion marker is absent.
    #[error("Archive did not contain {}", .0.display())]
    MissingMarker(PathBuf),
}

/// True if `path` names a bzip2-compressed tarball.
#[allow(clippy::case_sensitive_file_extension_comparisons)] // input is lowercased first
pub fn is_tar_bz2(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".tar.bz2") || path_str.ends_with(".tbz2") || path_str.ends_with(".tbz")
}

/// Extract a `.tar.bz2` archive into `dest_dir`.
///
/// `on_entry` is called with the running entry count after each entry is
/// unpacked. Returns the total number of entries.
///
/// # Errors
///
/// Fails on other extensions, unreadable or corrupt archives, and entries
/// whose path would land outside `dest_dir`.
pub fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    on_entry: impl FnMut(u64),
) -> Result<u64, ExtractError> {
    if !is_tar_bz2(archive_path) {
        return Err(ExtractError::UnsupportedFormat(
            archive_path.display().to_string(),
        ));
    }

    let reader = BufReader::new(File::open(archive_path)?);
    extract_tar(BzDecoder::new(reader), dest_dir, on_entry)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(
    reader: R,
    dest_dir: &Path,
    mut on_entry: impl FnMut(u64),
) -> Result<u64, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut count = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        // Reject absolute paths and `..` rather than silently skipping them
        if !is_contained(&entry_path) {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                entry_path.display()
            )));
        }

        entry.unpack_in(dest_dir)?;
        count += 1;
        on_entry(count);
    }

    Ok(count)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Build a `.tar.bz2` holding `files` (path, contents).
    pub(crate) fn tar_bz2(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_is_tar_bz2() {
        assert!(is_tar_bz2(Path::new("pyodide-0.26.4.tar.bz2")));
        assert!(is_tar_bz2(Path::new("X.TBZ2")));
        assert!(!is_tar_bz2(Path::new("a.tar.gz")));
        assert!(!is_tar_bz2(Path::new("a.zip")));
    }

    #[test]
    fn test_extract_tar_bz2() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rt.tar.bz2");
        std::fs::write(
            &archive,
            tar_bz2(&[
                ("pyodide/pyodide.js", &b"// loader"[..]),
                ("pyodide/lib/python.zip", &b"zip"[..]),
            ]),
        )
        .unwrap();

        let out = dir.path().join("out");
        let mut seen = 0;
        let count = extract_archive(&archive, &out, |n| seen = n).unwrap();

        assert_eq!(count, 2);
        assert_eq!(seen, 2);
        assert_eq!(
            std::fs::read(out.join("pyodide/pyodide.js")).unwrap(),
            b"// loader"
        );
        assert!(out.join("pyodide/lib/python.zip").is_file());
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rt.tar.bz2");
        let mut f = File::create(&archive).unwrap();
        f.write_all(b"definitely not bzip2").unwrap();

        let err = extract_archive(&archive, &dir.path().join("out"), |_| {}).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        let name = b"../evil.txt";
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, &b"evil"[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.tar.bz2");
        std::fs::write(&archive, bytes).unwrap();

        let out = dir.path().join("out");
        let err = extract_archive(&archive, &out, |_| {}).unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rt.zip");
        std::fs::write(&archive, b"PK").unwrap();
        let err = extract_archive(&archive, &dir.path().join("out"), |_| {}).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }
}

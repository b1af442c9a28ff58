//! Manifest command: rewrite the manifest from the package cache only

use std::path::Path;

use anyhow::Result;
use stagehand_core::{ManifestWriter, StageConfig};

/// Rewrite `<root>/wheels/manifest.json` without touching the network.
pub async fn manifest(root: &Path, quiet: bool, dry_run: bool) -> Result<()> {
    let config = StageConfig::new(root);
    let store = stagehand_core::ArtifactStore::new(&config);
    let reporter = super::reporter(quiet);

    let staged = store.list_staged()?;
    if staged.is_empty() {
        reporter.warning(&format!(
            "{} holds no packages; the manifest will be empty",
            store.packages_dir().display()
        ));
    }

    if dry_run {
        println!(
            "Would write {} ({} packages)",
            store.manifest_path().display(),
            staged.len()
        );
        return Ok(());
    }

    let manifest = ManifestWriter::new(store.manifest_path()).write(staged).await?;
    reporter.success(&format!(
        "Wrote {} ({} packages)",
        store.manifest_path().display(),
        manifest.len()
    ));
    Ok(())
}

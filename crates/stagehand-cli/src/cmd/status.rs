//! Status command: report what is staged, without network access

use std::path::Path;

use anyhow::Result;
use crossterm::style::Stylize;
use stagehand_core::store::disk_usage;
use stagehand_core::{ArtifactStore, Manifest, StageConfig};

use crate::ui::Theme;
use crate::ui::theme::format_size;

/// Print runtime and package cache state for `root`.
pub async fn status(root: &Path) -> Result<()> {
    let config = StageConfig::new(root);
    let store = ArtifactStore::new(&config);
    let theme = Theme::default();
    let label_width = 12;

    println!();
    println!("{}", "Bundle status".dark_grey());
    println!();
    println!("{:<label_width$}{}", "Root:", store.root().display());

    let runtime = if store.has_runtime(&config.runtime.version) {
        let version = store
            .runtime_version()
            .unwrap_or_else(|| "unknown version".to_string());
        format!(
            "{version} ({})",
            format_size(disk_usage(store.runtime_root()))
        )
    } else if store.runtime_root().exists() {
        "incomplete (will be re-fetched)".to_string()
    } else {
        "not staged".to_string()
    };
    println!("{:<label_width$}{runtime}", "Runtime:");

    let staged = store.list_staged()?;
    println!(
        "{:<label_width$}{} ({})",
        "Packages:",
        staged.len(),
        format_size(disk_usage(store.packages_dir()))
    );

    let manifest_path = store.manifest_path();
    let manifest = if manifest_path.is_file() {
        Manifest::load(&manifest_path).await.ok()
    } else {
        None
    };
    let manifest_state = match &manifest {
        None if manifest_path.exists() => "unreadable".to_string(),
        None => "missing".to_string(),
        Some(m) if m.entries().iter().eq(staged.iter()) => "up to date".to_string(),
        Some(_) => "stale (run `stagehand manifest`)".to_string(),
    };
    println!("{:<label_width$}{manifest_state}", "Manifest:");

    if store.work_dir().exists() {
        println!(
            "{:<label_width$}{}",
            "Leftovers:",
            "working area from an interrupted run".with(theme.colors.warning)
        );
    }

    if !staged.is_empty() {
        println!();
        for name in &staged {
            println!("  {}", name.as_str().with(theme.colors.artifact));
        }
    }

    println!();
    Ok(())
}

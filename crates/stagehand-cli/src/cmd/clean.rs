//! Clean command: remove staged output

use std::path::Path;

use anyhow::{Context, Result};
use stagehand_core::{ArtifactStore, StageConfig};

/// Remove the runtime root and/or package cache. With neither flag, both go.
///
/// The working area is always swept.
pub fn clean(root: &Path, runtime: bool, packages: bool, quiet: bool, dry_run: bool) -> Result<()> {
    let store = ArtifactStore::new(&StageConfig::new(root));
    let reporter = super::reporter(quiet);
    let (runtime, packages) = if runtime || packages {
        (runtime, packages)
    } else {
        (true, true)
    };

    let mut targets = vec![store.work_dir()];
    if runtime {
        targets.push(store.runtime_root());
    }
    if packages {
        targets.push(store.packages_dir());
    }

    if dry_run {
        for target in targets.iter().filter(|t| t.exists()) {
            println!("Would remove {}", target.display());
        }
        return Ok(());
    }

    let mut removed = 0;
    if store
        .sweep_work_dir()
        .context("Failed to remove working area")?
    {
        removed += 1;
    }
    if runtime && store.clear_runtime().context("Failed to remove runtime")? {
        reporter.info(&format!("Removed {}", store.runtime_root().display()));
        removed += 1;
    }
    if packages && store.clear_packages().context("Failed to remove packages")? {
        reporter.info(&format!("Removed {}", store.packages_dir().display()));
        removed += 1;
    }

    if removed == 0 {
        reporter.success("Nothing to clean.");
    } else {
        reporter.success("Bundle root is clean.");
    }
    Ok(())
}

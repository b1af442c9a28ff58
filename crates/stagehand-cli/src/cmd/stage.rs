//! Stage command: fetch the runtime and packages, then write the manifest

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use stagehand_core::{PipResolver, StageReport, Stager, USER_AGENT};

use crate::StageArgs;

/// Run the full pipeline against `root`.
pub async fn stage(root: &Path, args: &StageArgs, quiet: bool, dry_run: bool) -> Result<()> {
    let config = args.config(root);
    let reporter = super::reporter(quiet);

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;
    let stager = Stager::new(config, client, PipResolver::new(args.python()), reporter);

    if dry_run {
        plan(&stager);
        return Ok(());
    }

    let start = Instant::now();
    let report = stager.run().await?;
    tracing::info!(elapsed = ?start.elapsed(), "staging complete");

    if !quiet {
        summary(&report, start.elapsed().as_secs_f64(), stager.store().root());
    }
    Ok(())
}

fn plan(stager: &Stager<PipResolver>) {
    let config = stager.config();
    let store = stager.store();
    let version = &config.runtime.version;

    println!("Bundle root: {}", store.root().display());
    if store.has_runtime(version) {
        println!("Runtime:     {} present, would skip", store.runtime_root().display());
    } else {
        println!("Runtime:     would fetch {}", config.runtime.release_url());
    }
    if store.has_packages() {
        println!("Packages:    {} present, would skip", store.packages_dir().display());
    } else {
        println!("Packages:    would resolve with {}", config.packages.python);
        for requirement in &config.packages.requirements {
            println!("               {requirement}");
        }
    }
    println!("Manifest:    would write {}", store.manifest_path().display());
}

fn summary(report: &StageReport, elapsed_secs: f64, root: &Path) {
    println!();
    println!("Staged in {elapsed_secs:.1}s");
    println!(
        "  Runtime   {} ({})",
        report.runtime.version,
        if report.runtime_cached { "cached" } else { "fetched" }
    );
    if report.packages_cached {
        println!("  Packages  {} (cached)", report.manifest.len());
    } else {
        println!(
            "  Packages  {} kept, {} skipped",
            report.kept.len(),
            report.skipped.len()
        );
    }
    println!("  Manifest  {}", report.manifest_path.display());
    println!();
    println!("Next steps:");
    println!("  Serve {} with any static file server, e.g.", root.display());
    println!("    python3 -m http.server --directory {}", root.display());
}

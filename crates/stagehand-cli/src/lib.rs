//! stagehand - offline bundle staging
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Fetches a Pyodide runtime and a pure-Python wheel set into a bundle root
//! that can be served without network access.
//!
//! # Bundle Layout
//!
//! ```text
//! <root>/
//! ├── pyodide/           # Extracted runtime (complete iff pyodide.js exists)
//! ├── wheels/            # Platform-independent wheels
//! │   └── manifest.json  # Sorted filenames of every staged wheel
//! └── .stagehand-tmp/    # Working area, swept at the start of every run
//! ```

pub mod cmd;
pub mod ui;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use stagehand_core::StageConfig;
use stagehand_core::config::{DEFAULT_PYTHON, DEFAULT_RELEASE_BASE_URL, DEFAULT_RUNTIME_VERSION};

#[derive(Debug, Parser)]
#[command(name = "stagehand")]
#[command(author, version = env!("STAGEHAND_VERSION"), about = "stagehand - stage an offline Pyodide bundle")]
pub struct Cli {
    /// Bundle root that receives the runtime and package cache
    #[arg(long, global = true, env = "STAGEHAND_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub stage: StageArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The subcommand to run; a bare invocation stages.
    ///
    /// Stage options given before `stage` still apply, unless repeated after it.
    pub fn into_command(self) -> Commands {
        match self.command {
            None => Commands::Stage(self.stage),
            Some(Commands::Stage(args)) => Commands::Stage(args.or(self.stage)),
            Some(other) => other,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch the runtime and packages, then write the manifest (default)
    Stage(StageArgs),
    /// Show what is staged under the bundle root
    Status,
    /// Rewrite the manifest from the current package cache
    Manifest,
    /// Remove staged output so the next run fetches it again
    Clean {
        /// Remove the runtime root
        #[arg(long)]
        runtime: bool,
        /// Remove the package cache and its manifest
        #[arg(long)]
        packages: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct StageArgs {
    /// Pyodide release to stage [default: 0.26.4]
    #[arg(long, env = "STAGEHAND_RUNTIME_VERSION")]
    pub runtime_version: Option<String>,

    /// Base URL that release archives are published under
    /// [default: https://github.com/pyodide/pyodide/releases/download]
    #[arg(long, env = "STAGEHAND_RELEASE_URL")]
    pub release_url: Option<String>,

    /// Python interpreter used to resolve packages [default: python3]
    #[arg(long, env = "STAGEHAND_PYTHON")]
    pub python: Option<String>,

    /// Expected SHA-256 of the runtime archive
    #[arg(long, env = "STAGEHAND_RUNTIME_SHA256")]
    pub sha256: Option<String>,
}

impl StageArgs {
    /// Fill options missing here from `outer`.
    pub fn or(self, outer: Self) -> Self {
        Self {
            runtime_version: self.runtime_version.or(outer.runtime_version),
            release_url: self.release_url.or(outer.release_url),
            python: self.python.or(outer.python),
            sha256: self.sha256.or(outer.sha256),
        }
    }

    /// Interpreter to resolve packages with.
    pub fn python(&self) -> &str {
        self.python.as_deref().unwrap_or(DEFAULT_PYTHON)
    }

    /// Pipeline configuration for `root`.
    pub fn config(&self, root: &Path) -> StageConfig {
        StageConfig::new(root)
            .with_runtime_version(
                self.runtime_version
                    .as_deref()
                    .unwrap_or(DEFAULT_RUNTIME_VERSION),
            )
            .with_release_base_url(self.release_url.as_deref().unwrap_or(DEFAULT_RELEASE_BASE_URL))
            .with_python(self.python())
            .with_expected_sha256(self.sha256.clone())
    }
}

//! Subcommand implementations

pub mod clean;
pub mod manifest;
pub mod stage;
pub mod status;

use std::sync::Arc;

use stagehand_core::{NullReporter, Reporter};

use crate::ui::ConsoleReporter;

/// Console output unless `--quiet` was given.
pub fn reporter(quiet: bool) -> Arc<dyn Reporter> {
    if quiet {
        Arc::new(NullReporter)
    } else {
        Arc::new(ConsoleReporter::new())
    }
}

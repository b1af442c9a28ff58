//! Console reporter.
//!
//! Writes pipeline progress to stderr so stdout stays free for command
//! output (`status`, `manifest`).

use std::sync::atomic::{AtomicU64, Ordering};

use crossterm::style::Stylize;
use stagehand_core::Reporter;

use super::theme::{self, Theme};

/// Bytes between progress lines when the download size is unknown.
const UNSIZED_STEP: u64 = 4 * 1024 * 1024;

/// Entries between extraction progress lines.
const EXTRACT_STEP: u64 = 1000;

const NONE: u64 = u64::MAX;

/// Prints sections, throttled progress and per-artifact decisions.
#[derive(Debug)]
pub struct ConsoleReporter {
    theme: Theme,
    download_step: AtomicU64,
    extract_step: AtomicU64,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            download_step: AtomicU64::new(NONE),
            extract_step: AtomicU64::new(NONE),
        }
    }

    /// True the first time `step` is seen since the last change.
    fn advance(slot: &AtomicU64, step: u64) -> bool {
        slot.swap(step, Ordering::Relaxed) != step
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress bucket for a download: tens of percent when sized, otherwise
/// multiples of [`UNSIZED_STEP`].
fn download_step(current: u64, total: Option<u64>) -> u64 {
    theme::percent(current, total).map_or(current / UNSIZED_STEP, |p| u64::from(p / 10))
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.download_step.store(NONE, Ordering::Relaxed);
        self.extract_step.store(NONE, Ordering::Relaxed);
        eprintln!();
        eprintln!("{} {}", title, "─".repeat(40).with(self.theme.colors.secondary));
    }

    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>) {
        if !Self::advance(&self.download_step, download_step(current, total)) {
            return;
        }
        eprintln!(
            "  {} {} {}  {}",
            self.theme.icons.active.with(self.theme.colors.secondary),
            name,
            version.with(self.theme.colors.secondary),
            theme::format_progress(current, total)
        );
    }

    fn extracting(&self, name: &str, version: &str, entries: u64) {
        if !Self::advance(&self.extract_step, entries / EXTRACT_STEP) {
            return;
        }
        eprintln!(
            "  {} {} {}  extracting ({entries} entries)",
            self.theme.icons.active.with(self.theme.colors.secondary),
            name,
            version.with(self.theme.colors.secondary),
        );
    }

    fn kept(&self, filename: &str) {
        eprintln!(
            "  {} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            filename.with(self.theme.colors.artifact)
        );
    }

    fn skipped(&self, filename: &str) {
        eprintln!(
            "  {} {} {}",
            self.theme.icons.skipped.with(self.theme.colors.secondary),
            filename.with(self.theme.colors.secondary),
            "(platform-specific)".with(self.theme.colors.secondary)
        );
    }

    fn info(&self, msg: &str) {
        eprintln!("  {} {}", self.theme.icons.info, msg);
    }

    fn success(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            msg
        );
    }

    fn warning(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg
        );
    }
}

//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and status without
//! being coupled to a specific terminal implementation.

/// Receives operator-facing progress from the pipeline.
pub trait Reporter: Send + Sync {
    /// Indicates a new stage has started (e.g. "Runtime", "Packages").
    fn section(&self, title: &str);

    /// Updates the progress of a download.
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>);

    /// Updates the progress of an extraction (entries unpacked so far).
    fn extracting(&self, name: &str, version: &str, entries: u64);

    /// A candidate artifact was staged into the package cache.
    fn kept(&self, filename: &str);

    /// A candidate artifact was rejected as platform-specific.
    fn skipped(&self, filename: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn extracting(&self, name: &str, version: &str, entries: u64) {
        (**self).extracting(name, version, entries);
    }
    fn kept(&self, filename: &str) {
        (**self).kept(filename);
    }
    fn skipped(&self, filename: &str) {
        (**self).skipped(filename);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., `--quiet`, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn downloading(&self, _: &str, _: &str, _: u64, _: Option<u64>) {}
    fn extracting(&self, _: &str, _: &str, _: u64) {}
    fn kept(&self, _: &str) {}
    fn skipped(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}

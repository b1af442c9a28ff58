//! Terminal output.
//!
//! - [`theme`] - Colors, icons and formatting helpers
//! - [`console`] - [`Reporter`](stagehand_core::Reporter) that writes to stderr

pub mod console;
pub mod theme;

pub use console::ConsoleReporter;
pub use theme::Theme;

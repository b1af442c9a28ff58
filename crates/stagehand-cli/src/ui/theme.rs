//! UI Theme - Design system constants

use crossterm::style::Color;

/// Default theme for stagehand output
#[derive(Debug, Clone, Default)]
pub struct Theme {
    /// Colors for different UI elements
    pub colors: ColorScheme,
    /// Status icons
    pub icons: Icons,
}

/// Color scheme for UI elements
#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Artifact filenames
    pub artifact: Color,
    /// Headers, labels and secondary info
    pub secondary: Color,
    /// Success states
    pub success: Color,
    /// Warning states
    pub warning: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            artifact: Color::Cyan,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
        }
    }
}

/// Status icons for different states
#[derive(Debug, Clone)]
pub struct Icons {
    /// Kept artifact / completed step (✓)
    pub success: &'static str,
    /// Skipped artifact (○)
    pub skipped: &'static str,
    /// In-progress step (●)
    pub active: &'static str,
    /// Warning state (⚠)
    pub warning: &'static str,
    /// Info state (ℹ)
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            skipped: "○",
            active: "●",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

/// Whole percentage of `current` over `total`, clamped to 100.
///
/// `None` when the total is unknown or zero.
pub fn percent(current: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|&t| t > 0)?;
    Some((current.saturating_mul(100) / total).min(100) as u8)
}

/// Progress text for a download: a percentage when the size is known,
/// otherwise the bytes received so far.
pub fn format_progress(current: u64, total: Option<u64>) -> String {
    match (percent(current, total), total) {
        (Some(p), Some(t)) => format!("{p:>3}% of {}", format_size(t)),
        _ => format!("{} received", format_size(current)),
    }
}

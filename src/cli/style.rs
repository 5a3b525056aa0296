//! Terminal styling helpers

use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Style};
use std::fmt::Display;

/// Check mark used in success lines
pub const CHECK: &str = "✓";

/// Semantic colors for CLI output
pub trait Stylize: Display + Sized {
    /// Secondary information
    fn muted(&self) -> String {
        self.style(Style::new().dimmed()).to_string()
    }

    /// Headings and names
    fn emphasis(&self) -> String {
        self.style(Style::new().bold()).to_string()
    }

    /// Identifiers (branches, shas)
    fn accent(&self) -> String {
        self.style(Style::new().cyan()).to_string()
    }

    /// Warnings and failures
    fn warn(&self) -> String {
        self.style(Style::new().yellow()).to_string()
    }

    /// Success markers
    fn success(&self) -> String {
        self.style(Style::new().green()).to_string()
    }
}

impl<T: Display> Stylize for T {}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Spinner used while a merge runs
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

//! Color and styling utilities with support for NO_COLOR and TERM environment variables.
//!
//! Conditional colored output based on:
//! - `--no-color` CLI flag
//! - `NO_COLOR` environment variable (https://no-color.org/)
//! - `CROPSCAN_NO_COLOR` environment variable (application-specific)
//! - `TERM=dumb` environment variable
//! - TTY detection for stderr

use colored::ColoredString;
use std::io::{stderr, IsTerminal};
use std::sync::OnceLock;

static COLOR_CONFIG: OnceLock<ColorConfig> = OnceLock::new();

fn should_disable_colors_from_env() -> bool {
    !std::env::var("NO_COLOR").unwrap_or_default().is_empty()
        || !std::env::var("CROPSCAN_NO_COLOR")
            .unwrap_or_default()
            .is_empty()
        || std::env::var("TERM").unwrap_or_default() == "dumb"
        || !stderr().is_terminal()
}

#[derive(Debug, Clone)]
struct ColorConfig {
    colors_enabled: bool,
}

impl ColorConfig {
    fn new(no_color_flag: bool) -> Self {
        let colors_enabled = !no_color_flag && !should_disable_colors_from_env();
        Self { colors_enabled }
    }

    fn is_enabled(&self) -> bool {
        self.colors_enabled
    }
}

/// Initialize the color configuration with the CLI flag state.
/// This should be called once at application startup after parsing CLI arguments.
pub fn init_color_config(no_color_flag: bool) {
    let config = ColorConfig::new(no_color_flag);
    COLOR_CONFIG.set(config).unwrap_or_else(|_| {
        eprintln!("Warning: Color configuration already initialized");
    });
}

fn colors_enabled() -> bool {
    COLOR_CONFIG
        .get()
        .map(|config| config.is_enabled())
        .unwrap_or_else(|| !should_disable_colors_from_env())
}

/// Apply color to a string only if colors are enabled for stderr output
pub fn maybe_color_stderr<F>(text: &str, color_fn: F) -> String
where
    F: FnOnce(&str) -> ColoredString,
{
    if colors_enabled() {
        color_fn(text).to_string()
    } else {
        text.to_string()
    }
}

/// Semantic symbols for different operation types and states
pub mod symbols {
    use super::colors_enabled;

    /// Symbol for starting an analysis run
    pub fn analysis_start() -> &'static str {
        if colors_enabled() {
            "🔍"
        } else {
            ""
        }
    }

    /// Symbol for operation failures
    pub fn operation_failed() -> &'static str {
        if colors_enabled() {
            "❌"
        } else {
            "[FAILED]"
        }
    }

    /// Symbol for successful completion
    pub fn completed_successfully() -> &'static str {
        if colors_enabled() {
            "✅"
        } else {
            "[SUCCESS]"
        }
    }

    /// Symbol for partial success (some successes, some failures)
    pub fn completed_partially_successfully() -> &'static str {
        if colors_enabled() {
            "⚠️ "
        } else {
            "[PARTIAL-SUCCESS]"
        }
    }

    /// Symbol for warnings
    pub fn warning() -> &'static str {
        if colors_enabled() {
            "⚠️ "
        } else {
            ""
        }
    }
}

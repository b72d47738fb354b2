//! Progress bars for fan-out stages
//!
//! Fetch, vintage lookup and per-account reports each track a known number
//! of work items. Bars are hidden when progress is disabled so callers never
//! branch on it.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Progress reporter for one stage
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Bar over `total` items, or a hidden one when `enabled` is false
    pub fn new(total: usize, unit: &str, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total as u64);
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} | {{msg}}",
            unit
        );
        match ProgressStyle::default_bar().template(&template) {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => debug!("Falling back to default progress style: {}", e),
        }
        Self { bar }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn increment(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }
}

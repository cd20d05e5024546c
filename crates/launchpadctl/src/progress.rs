//! Terminal progress for bulk sync

use indicatif::{ProgressBar, ProgressStyle};
use launchpad_common::{ArtifactEntry, LaunchpadError, ProgressSink};
use owo_colors::OwoColorize;

/// Bar resolution; progress fractions are mapped onto 0..=STEPS
const STEPS: u64 = 100;

/// Draws sync progress on stderr; hidden automatically when not a terminal
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(STEPS);
        let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {percent:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&self, fraction: f64) {
        self.bar.set_position(to_steps(fraction));
    }

    fn on_failure(&self, entry: &ArtifactEntry, error: &LaunchpadError) {
        self.bar.println(format!(
            "{} {}: {}",
            "✗".red(),
            entry.display_name(),
            error
        ));
    }
}

fn to_steps(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * STEPS as f64).round() as u64
}

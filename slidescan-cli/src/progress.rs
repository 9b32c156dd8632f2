//! Terminal progress bar for scans

use indicatif::{ProgressBar, ProgressStyle};
use slidescan_scanner::ProgressSink;
use std::time::Duration;

/// Bar resolution; fractions are mapped onto this many steps
const BAR_STEPS: u64 = 1000;

/// Renders scan progress with indicatif
pub struct BarProgress {
    bar: ProgressBar,
    position: u64,
}

impl BarProgress {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(BAR_STEPS);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {percent}% ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░ "),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, position: 0 }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn report(&mut self, fraction: f64, status: &str) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_STEPS as f64).round() as u64;
        // Never move the bar backwards.
        if position >= self.position {
            self.position = position;
            self.bar.set_position(position);
        }
        self.bar.set_message(status.to_string());
    }
}

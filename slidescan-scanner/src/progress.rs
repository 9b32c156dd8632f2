//! Progress reporting with ETA estimation

use std::time::Instant;

/// Receives scan progress once per processed frame
pub trait ProgressSink {
    /// `fraction` is within [0, 1]; `status` is a short human-readable line
    fn report(&mut self, fraction: f64, status: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(f64, &str),
{
    fn report(&mut self, fraction: f64, status: &str) {
        self(fraction, status)
    }
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _fraction: f64, _status: &str) {}
}

/// Logs progress with elapsed time and ETA every `interval_percent`
pub struct LogProgress {
    label: String,
    start_time: Instant,
    interval_percent: u32,
    next_percent: u32,
}

impl LogProgress {
    /// Creates a new logging sink
    pub fn new(label: &str, interval_percent: u32) -> Self {
        Self {
            label: label.to_string(),
            start_time: Instant::now(),
            interval_percent: interval_percent.clamp(1, 100),
            next_percent: 0,
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&mut self, fraction: f64, status: &str) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        if percent < self.next_percent {
            return;
        }
        self.next_percent = (percent / self.interval_percent + 1) * self.interval_percent;

        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        if fraction > 0.0 && fraction < 1.0 {
            let remaining = elapsed_secs * (1.0 - fraction) / fraction;
            log::info!(
                "{} {:.1}% - {} - elapsed: {} - ETA: {}",
                self.label,
                fraction * 100.0,
                status,
                format_duration(elapsed_secs),
                format_duration(remaining),
            );
        } else if fraction >= 1.0 {
            log::info!(
                "{} 100.0% - {} - completed in {}",
                self.label,
                status,
                format_duration(elapsed_secs),
            );
        } else {
            log::info!("{} {}", self.label, status);
        }
    }
}

/// Formats seconds into a human-readable duration string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor() as u64;
        let remaining = secs - (hours as f64 * 3600.0);
        let mins = (remaining / 60.0).floor() as u64;
        let remaining_secs = remaining - (mins as f64 * 60.0);
        format!("{}h {}m {:.0}s", hours, mins, remaining_secs)
    }
}

/// Formats a timestamp as `HH:MM:SS.mmm`
pub fn format_timestamp(secs: f64) -> String {
    let total_millis = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let seconds = (total_millis / 1000) % 60;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(12.34), "12.3s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(125.5), "00:02:05.500");
        assert_eq!(format_timestamp(3725.042), "01:02:05.042");
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |fraction: f64, status: &str| seen.push((fraction, status.to_string()));
            sink.report(0.25, "scanning");
            sink.report(1.0, "done");
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (1.0, "done".to_string()));
    }

    #[test]
    fn test_log_progress_throttles() {
        let mut sink = LogProgress::new("Scan", 25);
        sink.report(0.0, "start");
        assert_eq!(sink.next_percent, 25);
        sink.report(0.1, "ignored");
        assert_eq!(sink.next_percent, 25);
        sink.report(0.6, "jumped");
        assert_eq!(sink.next_percent, 75);
        sink.report(1.0, "done");
        assert_eq!(sink.next_percent, 125);
    }
}

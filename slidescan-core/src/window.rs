//! Scan windows and the rules that resolve user selections into them
//!
//! A user asks for a time range of the *original* source. Upstream retrieval
//! may have materialized the whole source or only that range; the resolved
//! [`ScanWindow`] describes what to traverse inside the local file and the
//! offset that maps local timestamps back onto the original timeline.

use crate::{Error, Result};

/// A requested time range, in seconds of the original source
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TimeRange {
    /// Creates a validated range; `start` must be non-negative and before `end`
    pub fn new(start_seconds: f64, end_seconds: f64) -> Result<Self> {
        if !start_seconds.is_finite() || !end_seconds.is_finite() {
            return Err(Error::Configuration(format!(
                "time range bounds must be finite (got {start_seconds}..{end_seconds})"
            )));
        }
        if start_seconds < 0.0 {
            return Err(Error::Configuration(format!(
                "start ({start_seconds}s) must not be negative"
            )));
        }
        if start_seconds >= end_seconds {
            return Err(Error::Configuration(format!(
                "start ({start_seconds}s) must be before end ({end_seconds}s)"
            )));
        }
        Ok(Self {
            start_seconds,
            end_seconds,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// What the retrieval step actually put on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// The whole source; local time equals original time
    Full,
    /// Only the requested range; local time 0 is the range start
    Clipped,
}

/// The in-file range to traverse plus the timestamp correction
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanWindow {
    /// First in-file second to scan
    pub start_seconds: f64,
    /// In-file second at which scanning stops
    pub end_seconds: f64,
    /// Added to every in-file timestamp to recover the original position
    pub time_offset: f64,
}

impl ScanWindow {
    /// Resolves a requested range against how the source was materialized
    pub fn resolve(range: TimeRange, materialization: Materialization) -> Result<Self> {
        // Ranges built through struct literals skip `TimeRange::new`.
        let range = TimeRange::new(range.start_seconds, range.end_seconds)?;

        let window = match materialization {
            Materialization::Full => Self {
                start_seconds: range.start_seconds,
                end_seconds: range.end_seconds,
                time_offset: 0.0,
            },
            Materialization::Clipped => Self {
                start_seconds: 0.0,
                end_seconds: range.duration_seconds(),
                time_offset: range.start_seconds,
            },
        };

        log::debug!(
            "Resolved {:?} range {:.3}s..{:.3}s to window {:.3}s..{:.3}s (offset {:.3}s)",
            materialization,
            range.start_seconds,
            range.end_seconds,
            window.start_seconds,
            window.end_seconds,
            window.time_offset
        );

        Ok(window)
    }

    /// A window covering a fully materialized file from 0 to `duration`
    pub fn whole(duration_seconds: f64) -> Result<Self> {
        Self::resolve(TimeRange::new(0.0, duration_seconds)?, Materialization::Full)
    }

    /// Checks the window bounds
    pub fn validate(&self) -> Result<()> {
        TimeRange::new(self.start_seconds, self.end_seconds)?;
        if !self.time_offset.is_finite() || self.time_offset < 0.0 {
            return Err(Error::Configuration(format!(
                "time offset must be a non-negative number (got {})",
                self.time_offset
            )));
        }
        Ok(())
    }

    /// Absolute timestamp of an in-file frame index
    pub fn absolute_timestamp(&self, frame_index: u64, frames_per_second: f64) -> f64 {
        frame_index as f64 / frames_per_second + self.time_offset
    }
}

/// A chapter marker read from the container
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: Option<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// How the user picked the part of the source to scan
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Explicit start/end in seconds
    Explicit(TimeRange),
    /// Inclusive range of chapter indices
    Chapters { first: usize, last: usize },
    /// Inclusive range of fixed-length buckets
    Segments {
        length_seconds: f64,
        first: usize,
        last: usize,
    },
}

impl Selection {
    /// Maps the selection onto a time range of the source
    pub fn to_time_range(&self, chapters: &[Chapter], source_duration: f64) -> Result<TimeRange> {
        match *self {
            Selection::Explicit(range) => TimeRange::new(range.start_seconds, range.end_seconds),
            Selection::Chapters { first, last } => chapter_range(chapters, first, last),
            Selection::Segments {
                length_seconds,
                first,
                last,
            } => segment_range(length_seconds, first, last, source_duration),
        }
    }
}

fn check_index_order(kind: &str, first: usize, last: usize) -> Result<()> {
    if first > last {
        return Err(Error::Configuration(format!(
            "{kind} range {first}-{last} is reversed"
        )));
    }
    Ok(())
}

/// `[chapters[first].start, chapters[last].end]`
pub fn chapter_range(chapters: &[Chapter], first: usize, last: usize) -> Result<TimeRange> {
    check_index_order("chapter", first, last)?;
    if last >= chapters.len() {
        return Err(Error::Configuration(format!(
            "chapter {last} does not exist (source has {} chapters)",
            chapters.len()
        )));
    }
    TimeRange::new(chapters[first].start_seconds, chapters[last].end_seconds)
}

/// `[first * length, min((last + 1) * length, duration)]`
pub fn segment_range(
    length_seconds: f64,
    first: usize,
    last: usize,
    source_duration: f64,
) -> Result<TimeRange> {
    if !length_seconds.is_finite() || length_seconds <= 0.0 {
        return Err(Error::Configuration(format!(
            "segment length must be positive (got {length_seconds})"
        )));
    }
    check_index_order("segment", first, last)?;

    let start = first as f64 * length_seconds;
    let end = ((last + 1) as f64 * length_seconds).min(source_duration);
    if start >= source_duration {
        return Err(Error::Configuration(format!(
            "segment {first} starts at {start}s, past the end of the source ({source_duration}s)"
        )));
    }
    TimeRange::new(start, end)
}

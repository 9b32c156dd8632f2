//! Scan orchestration
//!
//! One pass over a scan window: read the frame under the cursor, compare it to
//! the last accepted slide, keep it if it is new, then let the cursor decide
//! how far to jump. Reads that fail or run dry end the pass early with
//! whatever was captured; only configuration and positioning problems are
//! errors.

use crate::change_detector::{ChangeDetector, ReferenceState};
use crate::cursor::{self, CursorController, CursorStep};
use crate::progress::{format_timestamp, ProgressSink};
use crate::still_encoder::encode_still;
use crate::video_reader::{FrameSource, SourceInfo};
use crate::{Error, Result, ScanConfig};
use slidescan_core::{CaptureLog, ScanWindow, SlideDeck};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for stopping a running scan between frames
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the scan stop before its next frame
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The cursor passed the end of the window
    ReachedEnd,
    /// The source stopped producing frames first
    SourceExhausted,
    /// A [`CancelFlag`] was raised
    Cancelled,
}

/// Result of one pass over a window
#[derive(Debug, Clone)]
pub struct ScanSession {
    /// Properties reported by the source
    pub source: SourceInfo,
    pub window: ScanWindow,
    /// Frame rate used for all index and timestamp math
    pub frames_per_second: f64,
    pub start_frame: u64,
    pub end_frame: u64,
    pub captures: CaptureLog,
    /// Frames read and compared
    pub frames_examined: u64,
    pub termination: Termination,
}

impl ScanSession {
    pub fn capture_count(&self) -> usize {
        self.captures.len()
    }

    /// Packs the captures into a deck for storage
    pub fn into_deck(self) -> SlideDeck {
        SlideDeck::new(
            self.source.width,
            self.source.height,
            self.frames_per_second,
            self.window,
            self.captures,
        )
    }
}

/// Runs scans with a fixed configuration
pub struct SlideScanner {
    config: ScanConfig,
    detector: ChangeDetector,
}

impl SlideScanner {
    /// Creates a scanner for the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let detector = ChangeDetector::new(config.detection.clone());
        Self { config, detector }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scans the configured window of `source`
    ///
    /// Configuration problems are reported before the source is touched. A
    /// source that cannot be positioned at the window start is
    /// [`Error::SourceUnavailable`]. A scan with zero captures is a success.
    pub fn scan<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        progress: &mut dyn ProgressSink,
        cancel: Option<&CancelFlag>,
    ) -> Result<ScanSession> {
        self.config.validate()?;

        let info = source.info();
        if info.width == 0 || info.height == 0 {
            return Err(Error::Configuration(format!(
                "source reports invalid frame size {}x{}",
                info.width, info.height
            )));
        }

        let window = self.config.window;
        let fps = cursor::effective_fps(info.frames_per_second);
        if fps != info.frames_per_second {
            log::warn!(
                "Source reports {} fps, assuming {} fps",
                info.frames_per_second,
                fps
            );
        }
        let start_frame = cursor::first_frame_at_or_after(window.start_seconds, fps);
        let end_frame = cursor::frame_at(window.end_seconds, fps);
        let mut cursor = CursorController::new(&self.config.skip, fps, start_frame, end_frame)?;

        source.seek(start_frame).map_err(|e| match e {
            Error::SourceUnavailable(_) => e,
            other => Error::SourceUnavailable(format!(
                "cannot position source at frame {}: {}",
                start_frame, other
            )),
        })?;

        log::info!(
            "Scanning frames {}..{} ({} - {})",
            start_frame,
            end_frame,
            format_timestamp(window.start_seconds + window.time_offset),
            format_timestamp(window.end_seconds + window.time_offset)
        );

        let mut captures = CaptureLog::new();
        let mut reference: Option<ReferenceState> = None;
        let mut frames_examined = 0u64;
        let mut step = cursor.first_step();

        let termination = loop {
            let CursorStep::Read(frame_index) = step else {
                break Termination::ReachedEnd;
            };

            if cancel.is_some_and(CancelFlag::is_cancelled) {
                log::info!("Scan cancelled at frame {}", frame_index);
                break Termination::Cancelled;
            }

            let frame = match source.read_frame(frame_index) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("Source ran out of frames at {}", frame_index);
                    break Termination::SourceExhausted;
                }
                Err(e) => {
                    log::warn!("Stopping scan, frame {} could not be read: {}", frame_index, e);
                    break Termination::SourceExhausted;
                }
            };

            if frame.index >= end_frame {
                break Termination::ReachedEnd;
            }
            cursor.realign(frame.index);
            frames_examined += 1;

            let evaluation = self.detector.evaluate(&frame.image, reference.take());
            reference = Some(evaluation.reference);

            if evaluation.is_new {
                let still = encode_still(&frame.image, &self.config.still)?;
                let timestamp = window.absolute_timestamp(frame.index, fps);
                let capture = captures.append(still, frame.index, timestamp)?;
                log::debug!(
                    "Slide {} at frame {} ({}), {:?} pixels changed",
                    capture.sequence,
                    capture.frame_index,
                    format_timestamp(capture.timestamp_seconds),
                    evaluation.changed_pixels
                );
            }

            step = cursor.advance(evaluation.is_new);
            progress.report(
                cursor.progress(),
                &format!(
                    "{} - {} slides",
                    format_timestamp(window.absolute_timestamp(cursor.position(), fps)),
                    captures.len()
                ),
            );
        };

        log::info!(
            "Scan finished ({:?}): {} slides from {} examined frames",
            termination,
            captures.len(),
            frames_examined
        );

        Ok(ScanSession {
            source: info,
            window,
            frames_per_second: fps,
            start_frame,
            end_frame,
            captures,
            frames_examined,
            termination,
        })
    }
}

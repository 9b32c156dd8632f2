//! Slidescan Scanner Library
//!
//! Walks a window of a decoded video with an adaptive cursor and keeps the
//! frames that show a materially new visual state.

pub mod change_detector;
pub mod cursor;
pub mod progress;
pub mod slide_scanner;
pub mod still_encoder;
pub mod video_reader;

#[cfg(test)]
mod testing;

pub use change_detector::{ChangeDetector, DetectionConfig, Evaluation, ReferenceState};
pub use cursor::{CursorController, CursorState, CursorStep, SkipConfig};
pub use progress::{LogProgress, NullProgress, ProgressSink};
pub use slide_scanner::{CancelFlag, ScanSession, SlideScanner, Termination};
pub use still_encoder::StillConfig;
pub use video_reader::{Frame, FrameSource, SeekStrategy, SourceInfo, VideoReader};

use slidescan_core::ScanWindow;

/// Result type for slidescan-scanner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for slidescan-scanner operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Slidescan core error: {0}")]
    Core(#[from] slidescan_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Still encode error: {0}")]
    StillEncode(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No video stream found")]
    NoVideoStream,
}

impl Error {
    /// True for problems with the caller's parameters, raised before scanning
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Core(slidescan_core::Error::Configuration(_))
        )
    }
}

/// Everything a scan needs besides the source itself
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Change detection thresholds
    pub detection: DetectionConfig,
    /// Cursor jump sizes in seconds
    pub skip: SkipConfig,
    /// How accepted frames are stored
    pub still: StillConfig,
    /// In-file range to traverse and its timestamp offset
    pub window: ScanWindow,
}

impl ScanConfig {
    /// Default detection, skip and still settings for `window`
    pub fn new(window: ScanWindow) -> Self {
        Self {
            detection: DetectionConfig::default(),
            skip: SkipConfig::default(),
            still: StillConfig::default(),
            window,
        }
    }

    /// Rejects settings the scan cannot run with
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.detection.validate()?;
        self.skip.validate()?;
        self.still.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScanConfig::new(ScanWindow::whole(60.0).unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_window_is_configuration_error() {
        let window = ScanWindow {
            start_seconds: 10.0,
            end_seconds: 5.0,
            time_offset: 0.0,
        };
        let err = ScanConfig::new(window).validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_source_errors_are_not_configuration_errors() {
        assert!(!Error::SourceUnavailable("gone".into()).is_configuration());
        assert!(!Error::NoVideoStream.is_configuration());
    }
}

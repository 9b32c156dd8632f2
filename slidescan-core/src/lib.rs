//! Slidescan Core Library
//!
//! Data structures shared by the scanner and its consumers: the append-only
//! capture log, scan windows and the range resolution rules that produce
//! them, and the binary slide-deck container a finished scan is stored in.

pub mod capture;
pub mod deck;
pub mod export;
#[cfg(feature = "serde")]
pub mod manifest;
pub mod window;

pub use capture::{Capture, CaptureLog, Still, StillFormat};
pub use deck::{DeckHeader, SlideDeck};
pub use export::export_stills;
#[cfg(feature = "serde")]
pub use manifest::{Manifest, ManifestEntry};
pub use window::{Chapter, Materialization, ScanWindow, Selection, TimeRange};

/// Result type for slidescan-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for slidescan-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes, expected 'SLD\\0'")]
    InvalidMagic,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown still format tag: {0}")]
    UnknownStillFormat(u8),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Capture at {timestamp:.3}s does not follow previous capture at {previous:.3}s")]
    OutOfOrderCapture { previous: f64, timestamp: f64 },

    #[error("Capture sequence {found} found where {expected} was expected")]
    InvalidSequence { expected: u32, found: u32 },

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

//! JSON manifest describing an exported deck

use crate::export::still_file_name;
use crate::{Result, ScanWindow, SlideDeck, StillFormat};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One exported slide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sequence: u32,
    pub timestamp_seconds: f64,
    pub frame_index: u64,
    pub format: StillFormat,
    pub file: String,
}

/// Export summary consumed by document builders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub width: u32,
    pub height: u32,
    pub frames_per_second: f64,
    pub window: ScanWindow,
    pub slides: Vec<ManifestEntry>,
}

impl Manifest {
    /// Builds the manifest for a deck
    pub fn from_deck(deck: &SlideDeck) -> Self {
        let slides = deck
            .captures
            .iter()
            .map(|capture| ManifestEntry {
                sequence: capture.sequence,
                timestamp_seconds: capture.timestamp_seconds,
                frame_index: capture.frame_index,
                format: capture.still.format,
                file: still_file_name(capture),
            })
            .collect();

        Self {
            width: deck.header.width,
            height: deck.header.height,
            frames_per_second: deck.header.frames_per_second,
            window: deck.header.window,
            slides,
        }
    }

    /// Writes pretty-printed JSON to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureLog, Still};

    #[test]
    fn test_manifest_matches_exported_names() {
        let mut log = CaptureLog::new();
        log.append(Still::new(StillFormat::Jpeg, 8, 8, vec![1]), 0, 10.0)
            .unwrap();
        log.append(Still::new(StillFormat::Jpeg, 8, 8, vec![2]), 300, 20.0)
            .unwrap();
        let window = ScanWindow::whole(60.0).unwrap();
        let deck = SlideDeck::new(8, 8, 30.0, window, log);

        let manifest = Manifest::from_deck(&deck);
        assert_eq!(manifest.slides.len(), 2);
        assert_eq!(manifest.slides[1].file, "slide_0001.jpg");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        manifest.write_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["slides"][1]["timestamp_seconds"], 20.0);
        assert_eq!(parsed["slides"][0]["format"], "jpeg");
    }
}

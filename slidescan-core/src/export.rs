//! Writing captured stills out as individual image files

use crate::{Capture, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File name used for a capture, e.g. `slide_0003.png`
pub fn still_file_name(capture: &Capture) -> String {
    format!(
        "slide_{:04}.{}",
        capture.sequence,
        capture.still.format.extension()
    )
}

/// Writes every capture into `dir` in sequence order and returns the paths
pub fn export_stills<'a, I>(captures: I, dir: &Path) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a Capture>,
{
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for capture in captures {
        let path = dir.join(still_file_name(capture));
        fs::write(&path, &capture.still.data)?;
        log::debug!(
            "Wrote slide {} ({:.2}s) to {}",
            capture.sequence,
            capture.timestamp_seconds,
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CaptureLog, Still, StillFormat};

    #[test]
    fn test_export_writes_one_file_per_capture() {
        let mut log = CaptureLog::new();
        log.append(Still::new(StillFormat::Png, 2, 2, vec![7; 10]), 0, 0.0)
            .unwrap();
        log.append(Still::new(StillFormat::Avif, 2, 2, vec![9; 4]), 90, 3.0)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("slides");
        let paths = export_stills(&log, &out).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("slide_0000.png"));
        assert!(paths[1].ends_with("slide_0001.avif"));
        assert_eq!(fs::read(&paths[1]).unwrap(), vec![9; 4]);
    }

    #[test]
    fn test_export_empty_log_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty");

        let paths = export_stills(&CaptureLog::new(), &out).unwrap();
        assert!(paths.is_empty());
        assert!(out.is_dir());
    }
}

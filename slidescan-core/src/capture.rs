//! Capture log data structures

use crate::{Error, Result};

/// Still-image encoding of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StillFormat {
    #[default]
    Png,
    Jpeg,
    Avif,
}

impl StillFormat {
    /// Tag stored in the slide-deck container
    pub fn tag(self) -> u8 {
        match self {
            StillFormat::Png => 0,
            StillFormat::Jpeg => 1,
            StillFormat::Avif => 2,
        }
    }

    /// Parses a container tag
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(StillFormat::Png),
            1 => Ok(StillFormat::Jpeg),
            2 => Ok(StillFormat::Avif),
            other => Err(Error::UnknownStillFormat(other)),
        }
    }

    /// File extension used when exporting
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpeg => "jpg",
            StillFormat::Avif => "avif",
        }
    }
}

/// A full-resolution frame compressed to a still image
#[derive(Debug, Clone)]
pub struct Still {
    /// Encoding of `data`
    pub format: StillFormat,
    /// Width of the image in pixels
    pub width: u32,
    /// Height of the image in pixels
    pub height: u32,
    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl Still {
    /// Creates a new still
    pub fn new(format: StillFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            format,
            width,
            height,
            data,
        }
    }

    /// Returns the size of the encoded data in bytes
    pub fn data_size(&self) -> usize {
        self.data.len()
    }
}

/// An accepted slide: the still plus where it was found
#[derive(Debug, Clone)]
pub struct Capture {
    /// Position in the log, contiguous from 0
    pub sequence: u32,
    /// Source frame index (in-file) the still was taken from
    pub frame_index: u64,
    /// Absolute timestamp in the original, unclipped source
    pub timestamp_seconds: f64,
    /// The encoded frame
    pub still: Still,
}

/// Append-only, timestamp-ordered sequence of captures
///
/// Sequence numbers are assigned by the log itself, so they are always
/// contiguous starting at 0. Timestamps must strictly increase.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    captures: Vec<Capture>,
}

impl CaptureLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a capture and returns it
    pub fn append(
        &mut self,
        still: Still,
        frame_index: u64,
        timestamp_seconds: f64,
    ) -> Result<&Capture> {
        if let Some(last) = self.captures.last() {
            // Also rejects NaN.
            if !(timestamp_seconds > last.timestamp_seconds) {
                return Err(Error::OutOfOrderCapture {
                    previous: last.timestamp_seconds,
                    timestamp: timestamp_seconds,
                });
            }
        }

        let sequence = self.captures.len() as u32;
        self.captures.push(Capture {
            sequence,
            frame_index,
            timestamp_seconds,
            still,
        });
        Ok(&self.captures[sequence as usize])
    }

    /// Number of captures
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Gets a capture by sequence number
    pub fn get(&self, sequence: u32) -> Option<&Capture> {
        self.captures.get(sequence as usize)
    }

    /// Most recent capture
    pub fn last(&self) -> Option<&Capture> {
        self.captures.last()
    }

    /// Iterates captures in sequence order
    pub fn iter(&self) -> std::slice::Iter<'_, Capture> {
        self.captures.iter()
    }

    /// Total encoded size of all stills in bytes
    pub fn total_data_size(&self) -> usize {
        self.captures.iter().map(|c| c.still.data_size()).sum()
    }
}

impl<'a> IntoIterator for &'a CaptureLog {
    type Item = &'a Capture;
    type IntoIter = std::slice::Iter<'a, Capture>;

    fn into_iter(self) -> Self::IntoIter {
        self.captures.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still(byte: u8) -> Still {
        Still::new(StillFormat::Png, 4, 3, vec![byte; 8])
    }

    #[test]
    fn test_sequence_numbers_are_contiguous() {
        let mut log = CaptureLog::new();
        log.append(still(1), 0, 0.0).unwrap();
        log.append(still(2), 60, 2.0).unwrap();
        log.append(still(3), 300, 10.0).unwrap();

        let sequences: Vec<u32> = log.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(log.get(1).unwrap().frame_index, 60);
        assert_eq!(log.total_data_size(), 24);
    }

    #[test]
    fn test_rejects_non_increasing_timestamp() {
        let mut log = CaptureLog::new();
        log.append(still(1), 30, 1.0).unwrap();

        let err = log.append(still(2), 30, 1.0).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderCapture { .. }));

        let err = log.append(still(2), 10, 0.5).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderCapture { .. }));

        assert!(log.append(still(2), 31, f64::NAN).is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_still_format_tags() {
        for format in [StillFormat::Png, StillFormat::Jpeg, StillFormat::Avif] {
            assert_eq!(StillFormat::from_tag(format.tag()).unwrap(), format);
        }
        assert!(matches!(
            StillFormat::from_tag(9),
            Err(Error::UnknownStillFormat(9))
        ));
        assert_eq!(StillFormat::Jpeg.extension(), "jpg");
    }
}

//! Slide-deck container serialization and deserialization

use crate::{CaptureLog, Error, Result, ScanWindow, Still, StillFormat};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Magic bytes for the deck format: "SLD\0"
const MAGIC: [u8; 4] = [b'S', b'L', b'D', 0];

/// Current deck format version
const VERSION: u16 = 1;

/// Slide-deck file header
#[derive(Debug, Clone)]
pub struct DeckHeader {
    /// Format version
    pub version: u16,
    /// Source frame width in pixels
    pub width: u32,
    /// Source frame height in pixels
    pub height: u32,
    /// Frame rate the scan ran at
    pub frames_per_second: f64,
    /// Window that was scanned
    pub window: ScanWindow,
    /// Number of captures
    pub num_captures: u32,
}

impl DeckHeader {
    /// Creates a new deck header
    pub fn new(
        width: u32,
        height: u32,
        frames_per_second: f64,
        window: ScanWindow,
        num_captures: u32,
    ) -> Self {
        Self {
            version: VERSION,
            width,
            height,
            frames_per_second,
            window,
            num_captures,
        }
    }

    /// Reads a header from a reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = reader.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let width = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_u32::<LittleEndian>()?;
        let frames_per_second = reader.read_f64::<LittleEndian>()?;
        let window = ScanWindow {
            start_seconds: reader.read_f64::<LittleEndian>()?,
            end_seconds: reader.read_f64::<LittleEndian>()?,
            time_offset: reader.read_f64::<LittleEndian>()?,
        };
        let num_captures = reader.read_u32::<LittleEndian>()?;

        Ok(Self {
            version,
            width,
            height,
            frames_per_second,
            window,
            num_captures,
        })
    }

    /// Writes the header to a writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.width)?;
        writer.write_u32::<LittleEndian>(self.height)?;
        writer.write_f64::<LittleEndian>(self.frames_per_second)?;
        writer.write_f64::<LittleEndian>(self.window.start_seconds)?;
        writer.write_f64::<LittleEndian>(self.window.end_seconds)?;
        writer.write_f64::<LittleEndian>(self.window.time_offset)?;
        writer.write_u32::<LittleEndian>(self.num_captures)?;
        Ok(())
    }
}

/// A finished scan: header plus the capture log
#[derive(Debug, Clone)]
pub struct SlideDeck {
    /// Deck header
    pub header: DeckHeader,
    /// Captured slides in order
    pub captures: CaptureLog,
}

impl SlideDeck {
    /// Creates a deck, filling the capture count from the log
    pub fn new(
        width: u32,
        height: u32,
        frames_per_second: f64,
        window: ScanWindow,
        captures: CaptureLog,
    ) -> Self {
        let header = DeckHeader::new(
            width,
            height,
            frames_per_second,
            window,
            captures.len() as u32,
        );
        Self { header, captures }
    }

    /// Reads a deck from a reader, re-validating capture order
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let header = DeckHeader::read(&mut reader)?;

        let mut captures = CaptureLog::new();
        for expected in 0..header.num_captures {
            let sequence = reader.read_u32::<LittleEndian>()?;
            if sequence != expected {
                return Err(Error::InvalidSequence {
                    expected,
                    found: sequence,
                });
            }
            let frame_index = reader.read_u64::<LittleEndian>()?;
            let timestamp_seconds = reader.read_f64::<LittleEndian>()?;
            let format = StillFormat::from_tag(reader.read_u8()?)?;
            let width = reader.read_u32::<LittleEndian>()?;
            let height = reader.read_u32::<LittleEndian>()?;
            let data_len = reader.read_u32::<LittleEndian>()?;

            let mut data = Vec::new();
            reader
                .by_ref()
                .take(u64::from(data_len))
                .read_to_end(&mut data)?;
            if data.len() as u64 != u64::from(data_len) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("still {} declares {} bytes, found {}", expected, data_len, data.len()),
                )));
            }

            captures.append(
                Still::new(format, width, height, data),
                frame_index,
                timestamp_seconds,
            )?;
        }

        Ok(Self { header, captures })
    }

    /// Writes the deck to a writer
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        self.header.write(&mut writer)?;

        for capture in &self.captures {
            writer.write_u32::<LittleEndian>(capture.sequence)?;
            writer.write_u64::<LittleEndian>(capture.frame_index)?;
            writer.write_f64::<LittleEndian>(capture.timestamp_seconds)?;
            writer.write_u8(capture.still.format.tag())?;
            writer.write_u32::<LittleEndian>(capture.still.width)?;
            writer.write_u32::<LittleEndian>(capture.still.height)?;
            writer.write_u32::<LittleEndian>(capture.still.data.len() as u32)?;
            writer.write_all(&capture.still.data)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Duration of the scanned window in seconds
    pub fn window_seconds(&self) -> f64 {
        self.header.window.end_seconds - self.header.window.start_seconds
    }
}

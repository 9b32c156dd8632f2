//! Still-image encoding of accepted frames

use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use ravif::{Encoder, Img, RGB8};
use slidescan_core::{Still, StillFormat};

/// How captured frames are compressed
#[derive(Debug, Clone)]
pub struct StillConfig {
    /// Output encoding
    pub format: StillFormat,
    /// Quality (1-100) for JPEG and AVIF; ignored for PNG
    pub quality: u8,
}

impl Default for StillConfig {
    fn default() -> Self {
        Self {
            format: StillFormat::Png,
            quality: 85,
        }
    }
}

impl StillConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(Error::Configuration(format!(
                "still quality must be within 1-100 (got {})",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Encodes a full-resolution frame
pub fn encode_still(image: &RgbImage, config: &StillConfig) -> Result<Still> {
    let data = match config.format {
        StillFormat::Png => encode_png(image)?,
        StillFormat::Jpeg => encode_jpeg(image, config.quality)?,
        StillFormat::Avif => encode_avif(image, config.quality)?,
    };
    Ok(Still::new(config.format, image.width(), image.height(), data))
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    PngEncoder::new(&mut data).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(data)
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(data)
}

fn encode_avif(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let img = Img::new(image.as_raw().as_rgb(), width, height);

    let encoder = Encoder::new()
        .with_quality(quality as f32)
        .with_speed(6)
        .with_num_threads(Some(num_cpus::get()));

    let encoded = encoder
        .encode_rgb(img)
        .map_err(|e| Error::StillEncode(format!("{:?}", e)))?;

    Ok(encoded.avif_file)
}

// Helper trait to convert byte slices to RGB slices
trait AsRgb {
    fn as_rgb(&self) -> &[RGB8];
}

impl AsRgb for [u8] {
    fn as_rgb(&self) -> &[RGB8] {
        // RGB8 is three packed u8 fields, so alignment is 1.
        unsafe { std::slice::from_raw_parts(self.as_ptr() as *const RGB8, self.len() / 3) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::solid_frame;

    #[test]
    fn test_png_still_decodes_back() {
        let frame = solid_frame(16, 9, [200, 10, 10]);
        let still = encode_still(&frame, &StillConfig::default()).unwrap();

        assert_eq!(still.format, StillFormat::Png);
        assert_eq!((still.width, still.height), (16, 9));

        let decoded = image::load_from_memory(&still.data).unwrap().to_rgb8();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_jpeg_still() {
        let frame = solid_frame(32, 18, [0, 128, 255]);
        let config = StillConfig {
            format: StillFormat::Jpeg,
            quality: 90,
        };
        let still = encode_still(&frame, &config).unwrap();

        assert_eq!(&still.data[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&still.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 18));
    }

    #[test]
    fn test_quality_validation() {
        let config = StillConfig {
            format: StillFormat::Jpeg,
            quality: 0,
        };
        assert!(config.validate().unwrap_err().is_configuration());
        assert!(StillConfig::default().validate().is_ok());
    }
}

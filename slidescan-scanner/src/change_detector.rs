//! Visual change detection against the last accepted slide
//!
//! Every candidate frame is reduced to a small, blurred intensity image before
//! comparison, so encoder noise and slight flicker do not register as change.
//! A frame counts as a new slide when enough of those pixels moved by more
//! than the sensitivity cutoff.

use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Width every frame is downsampled to before comparison
pub const WORKING_WIDTH: u32 = 640;

/// Height used when the source reports a zero width
const FALLBACK_HEIGHT: u32 = 360;

/// Sigma of a 21x21 Gaussian kernel (0.3 * ((21 - 1) / 2 - 1) + 0.8)
const BLUR_SIGMA: f32 = 3.5;

/// Configuration for change detection
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Per-pixel intensity difference (0-255) a pixel must exceed to count as changed
    pub sensitivity: u8,
    /// Percentage of the working frame (0-100] that must change to trigger a capture
    pub strictness_percent: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sensitivity: 30,
            strictness_percent: 1.0,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.strictness_percent.is_finite()
            || self.strictness_percent <= 0.0
            || self.strictness_percent > 100.0
        {
            return Err(Error::Configuration(format!(
                "strictness must be within (0, 100] percent (got {})",
                self.strictness_percent
            )));
        }
        Ok(())
    }
}

/// Working resolution for a source of the given size
///
/// Width is fixed; height keeps the source aspect ratio.
pub fn working_size(width: u32, height: u32) -> (u32, u32) {
    if width == 0 {
        return (WORKING_WIDTH, FALLBACK_HEIGHT);
    }
    let scaled = u64::from(WORKING_WIDTH) * u64::from(height) / u64::from(width);
    (WORKING_WIDTH, scaled.clamp(1, u64::from(u32::MAX)) as u32)
}

/// The processed form of the last accepted slide
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceState {
    image: GrayImage,
}

impl ReferenceState {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Outcome of comparing one frame
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Whether the frame is a new slide
    pub is_new: bool,
    /// Pixels over the sensitivity cutoff; `None` when there was nothing comparable
    pub changed_pixels: Option<u64>,
    /// Reference to use for the next frame
    pub reference: ReferenceState,
}

/// Decides whether a frame differs materially from the reference
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    config: DetectionConfig,
}

impl ChangeDetector {
    /// Creates a detector with the given thresholds
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Downsamples, converts to intensity and blurs a frame
    pub fn prepare(&self, frame: &RgbImage) -> ReferenceState {
        let (width, height) = working_size(frame.width(), frame.height());
        let resized = imageops::resize(frame, width, height, FilterType::Triangle);
        let gray = imageops::grayscale(&resized);
        ReferenceState {
            image: imageops::blur(&gray, BLUR_SIGMA),
        }
    }

    /// Number of changed pixels a working frame of this size must exceed
    pub fn motion_threshold(&self, width: u32, height: u32) -> f64 {
        f64::from(width) * f64::from(height) * self.config.strictness_percent / 100.0
    }

    /// Compares `frame` with `reference`
    ///
    /// Without a reference the frame is always new. When the frame is not new
    /// the given reference is handed back untouched.
    pub fn evaluate(&self, frame: &RgbImage, reference: Option<ReferenceState>) -> Evaluation {
        let candidate = self.prepare(frame);

        let reference = match reference {
            Some(reference)
                if reference.width() == candidate.width()
                    && reference.height() == candidate.height() =>
            {
                reference
            }
            _ => {
                return Evaluation {
                    is_new: true,
                    changed_pixels: None,
                    reference: candidate,
                }
            }
        };

        let changed =
            count_changed_pixels(&reference.image, &candidate.image, self.config.sensitivity);
        let threshold = self.motion_threshold(candidate.width(), candidate.height());
        log::trace!("{} changed pixels against threshold {:.0}", changed, threshold);

        if changed as f64 > threshold {
            Evaluation {
                is_new: true,
                changed_pixels: Some(changed),
                reference: candidate,
            }
        } else {
            Evaluation {
                is_new: false,
                changed_pixels: Some(changed),
                reference,
            }
        }
    }
}

/// Counts pixels whose absolute difference exceeds `threshold`
fn count_changed_pixels(a: &GrayImage, b: &GrayImage, threshold: u8) -> u64 {
    a.as_raw()
        .iter()
        .zip(b.as_raw())
        .filter(|(pa, pb)| pa.abs_diff(**pb) > threshold)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::solid_frame;
    use image::Rgb;

    #[test]
    fn test_working_size_keeps_aspect_ratio() {
        assert_eq!(working_size(1920, 1080), (640, 360));
        assert_eq!(working_size(1080, 1920), (640, 1137));
        assert_eq!(working_size(64, 36), (640, 360));
    }

    #[test]
    fn test_working_size_fallbacks() {
        assert_eq!(working_size(0, 1080), (640, 360));
        assert_eq!(working_size(4000, 1), (640, 1));
    }

    #[test]
    fn test_first_frame_is_always_new() {
        let detector = ChangeDetector::new(DetectionConfig {
            sensitivity: 255,
            strictness_percent: 100.0,
        });
        let evaluation = detector.evaluate(&solid_frame(64, 36, [90, 90, 90]), None);
        assert!(evaluation.is_new);
        assert_eq!(evaluation.changed_pixels, None);
        assert_eq!(evaluation.reference.width(), WORKING_WIDTH);
    }

    #[test]
    fn test_identical_frame_is_not_new() {
        let detector = ChangeDetector::default();
        let frame = solid_frame(64, 36, [128, 128, 128]);
        let first = detector.evaluate(&frame, None);

        let second = detector.evaluate(&frame, Some(first.reference));
        assert!(!second.is_new);
        assert_eq!(second.changed_pixels, Some(0));
    }

    #[test]
    fn test_full_frame_change_is_new_and_replaces_reference() {
        let detector = ChangeDetector::default();
        let black = solid_frame(64, 36, [0, 0, 0]);
        let white = solid_frame(64, 36, [255, 255, 255]);

        let first = detector.evaluate(&black, None);
        let second = detector.evaluate(&white, Some(first.reference));

        assert!(second.is_new);
        assert_eq!(second.changed_pixels, Some(640 * 360));
        assert_eq!(second.reference, detector.prepare(&white));
    }

    #[test]
    fn test_small_faint_change_under_max_tolerance() {
        let detector = ChangeDetector::new(DetectionConfig {
            sensitivity: 100,
            strictness_percent: 1.0,
        });
        let base = solid_frame(64, 36, [40, 40, 40]);
        let mut touched = base.clone();
        for (x, y) in [(3, 3), (4, 3), (30, 20), (60, 30)] {
            touched.put_pixel(x, y, Rgb([100, 100, 100]));
        }

        let first = detector.evaluate(&base, None);
        let second = detector.evaluate(&touched, Some(first.reference));
        assert!(!second.is_new);
    }

    #[test]
    fn test_strictness_controls_required_area() {
        let mut half = solid_frame(64, 36, [0, 0, 0]);
        for y in 0..36 {
            for x in 32..64 {
                half.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let black = solid_frame(64, 36, [0, 0, 0]);

        let lenient = ChangeDetector::new(DetectionConfig {
            sensitivity: 30,
            strictness_percent: 40.0,
        });
        let reference = lenient.evaluate(&black, None).reference;
        assert!(lenient.evaluate(&half, Some(reference)).is_new);

        let strict = ChangeDetector::new(DetectionConfig {
            sensitivity: 30,
            strictness_percent: 60.0,
        });
        let reference = strict.evaluate(&black, None).reference;
        assert!(!strict.evaluate(&half, Some(reference)).is_new);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let detector = ChangeDetector::default();
        let reference = detector.prepare(&solid_frame(64, 36, [10, 10, 10]));
        let frame = solid_frame(64, 36, [12, 12, 12]);

        let once = detector.evaluate(&frame, Some(reference.clone()));
        let twice = detector.evaluate(&frame, Some(reference.clone()));

        assert_eq!(once.is_new, twice.is_new);
        assert!(!once.is_new);
        assert_eq!(once.reference, reference);
        assert_eq!(twice.reference, reference);
    }

    #[test]
    fn test_motion_threshold_is_pixel_count() {
        let detector = ChangeDetector::default();
        assert_eq!(detector.motion_threshold(640, 360), 2304.0);
    }

    #[test]
    fn test_strictness_validation() {
        for strictness in [0.0, -1.0, 100.5, f64::NAN] {
            let config = DetectionConfig {
                sensitivity: 30,
                strictness_percent: strictness,
            };
            assert!(config.validate().is_err());
        }
        assert!(DetectionConfig::default().validate().is_ok());
    }
}

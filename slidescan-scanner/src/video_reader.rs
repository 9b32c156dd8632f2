//! Random-access frame reading using FFmpeg

use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use slidescan_core::Chapter;
use std::path::Path;
use std::sync::OnceLock;

static FFMPEG_INIT: OnceLock<std::result::Result<(), ffmpeg::Error>> = OnceLock::new();

/// Initialize FFmpeg once per process
fn init_ffmpeg() -> Result<()> {
    (*FFMPEG_INIT.get_or_init(ffmpeg::init)).map_err(Error::from)
}

/// Forward distance, in seconds, still reached by decoding instead of seeking
const DECODE_AHEAD_SECONDS: f64 = 2.0;

/// Stream properties reported by a frame source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// May be zero or negative when the container does not say
    pub frames_per_second: f64,
    pub frame_count: u64,
    pub duration_seconds: f64,
}

/// A decoded RGB frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Index of the frame the decoder actually produced
    pub index: u64,
    pub image: RgbImage,
}

/// Random access to decoded frames by index
///
/// Implementations are owned by a single scan for its duration.
pub trait FrameSource {
    /// Reported stream properties
    fn info(&self) -> SourceInfo;

    /// Positions the source so that `frame_index` is the next frame read
    fn seek(&mut self, frame_index: u64) -> Result<()>;

    /// Reads the frame at `frame_index`, or the first decodable frame after it.
    ///
    /// `Ok(None)` means the source has no more data.
    fn read_frame(&mut self, frame_index: u64) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn info(&self) -> SourceInfo {
        (**self).info()
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        (**self).seek(frame_index)
    }

    fn read_frame(&mut self, frame_index: u64) -> Result<Option<Frame>> {
        (**self).read_frame(frame_index)
    }
}

/// How the reader gets to a requested frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStrategy {
    /// Container seek to the preceding keyframe, then decode forward
    Indexed,
    /// Decode forward from the current position, discarding frames
    Sequential,
}

impl SeekStrategy {
    /// Tried first on every newly opened file
    pub const PRIMARY: SeekStrategy = SeekStrategy::Indexed;
    /// Used for the rest of the file once the container rejects a seek
    pub const FALLBACK: SeekStrategy = SeekStrategy::Sequential;

    /// Whether reaching `target` from `next_index` takes a seek
    ///
    /// Backward targets always do. Forward targets further than
    /// `decode_ahead` frames do only while container seeks are available.
    pub fn needs_seek(self, next_index: u64, target: u64, decode_ahead: u64) -> bool {
        if target < next_index {
            return true;
        }
        self == SeekStrategy::Indexed && target - next_index > decode_ahead
    }
}

/// Frame index of a presentation timestamp, or `fallback` when there is none
fn frame_index_from_pts(
    pts: Option<i64>,
    start_pts: i64,
    time_base: f64,
    frames_per_second: f64,
    fallback: u64,
) -> u64 {
    match pts {
        Some(pts) => {
            let seconds = (pts - start_pts) as f64 * time_base;
            (seconds * frames_per_second).round().max(0.0) as u64
        }
        None => fallback,
    }
}

/// Copies `rows` rows of `row_bytes` out of a plane padded to `stride`
fn pack_rows(plane: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(row_bytes * rows);
    for y in 0..rows {
        let offset = y * stride;
        data.extend_from_slice(&plane[offset..offset + row_bytes]);
    }
    data
}

/// Video reader that extracts frames from video files
pub struct VideoReader {
    input: ffmpeg::format::context::Input,
    video_stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    time_base: ffmpeg::Rational,
    start_pts: i64,
    info: SourceInfo,
    chapters: Vec<Chapter>,
    strategy: SeekStrategy,
    next_index: u64,
    eof_sent: bool,
}

impl VideoReader {
    /// Opens a video file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        init_ffmpeg()?;
        let path = path.as_ref();

        let input = ffmpeg::format::input(&path)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", path.display(), e)))?;

        let video_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(Error::NoVideoStream)?;

        let video_stream_index = video_stream.index();
        let time_base = video_stream.time_base();
        let start_pts = match video_stream.start_time() {
            ffmpeg::ffi::AV_NOPTS_VALUE => 0,
            pts => pts,
        };

        let frames_per_second = [video_stream.avg_frame_rate(), video_stream.rate()]
            .into_iter()
            .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
            .map(f64::from)
            .unwrap_or(0.0);

        let stream_duration = video_stream.duration();
        let duration_seconds = if stream_duration > 0 {
            stream_duration as f64 * f64::from(time_base)
        } else {
            // Fallback to container duration
            input.duration().max(0) as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        };

        let frame_count = match video_stream.frames() {
            n if n > 0 => n as u64,
            _ => (duration_seconds * frames_per_second).round().max(0.0) as u64,
        };

        // Create decoder
        let context = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())?;
        let decoder = context.decoder().video()?;

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        let chapters = input
            .chapters()
            .map(|chapter| {
                let chapter_base = f64::from(chapter.time_base());
                Chapter {
                    title: chapter.metadata().get("title").map(str::to_owned),
                    start_seconds: chapter.start() as f64 * chapter_base,
                    end_seconds: chapter.end() as f64 * chapter_base,
                }
            })
            .collect();

        let info = SourceInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration_seconds,
        };

        log::debug!(
            "Opened {}: {}x{} @ {:.3} fps, {} frames, {:.2}s",
            path.display(),
            info.width,
            info.height,
            info.frames_per_second,
            info.frame_count,
            info.duration_seconds
        );

        Ok(Self {
            input,
            video_stream_index,
            decoder,
            scaler,
            time_base,
            start_pts,
            info,
            chapters,
            strategy: SeekStrategy::PRIMARY,
            next_index: 0,
            eof_sent: false,
        })
    }

    /// Chapter markers stored in the container
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Strategy currently used to reach frames
    pub fn seek_strategy(&self) -> SeekStrategy {
        self.strategy
    }

    fn fps(&self) -> f64 {
        crate::cursor::effective_fps(self.info.frames_per_second)
    }

    /// Seeks the container to the keyframe at or before `frame_index`
    fn container_seek(&mut self, frame_index: u64) -> std::result::Result<(), ffmpeg::Error> {
        let seconds = frame_index as f64 / self.fps()
            + self.start_pts as f64 * f64::from(self.time_base);
        let timestamp = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input.seek(timestamp, ..timestamp)
    }

    /// Pulls the next decoded frame, feeding packets as needed
    fn decode_next(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.video_stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    /// Index of a decoded frame, from its timestamp when it has one
    fn index_of(&self, decoded: &ffmpeg::frame::Video) -> u64 {
        frame_index_from_pts(
            decoded.timestamp().or_else(|| decoded.pts()),
            self.start_pts,
            f64::from(self.time_base),
            self.fps(),
            self.next_index,
        )
    }

    /// Converts a decoded frame to a packed RGB image
    fn to_image(&mut self, decoded: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;

        let width = rgb_frame.width();
        let height = rgb_frame.height();
        let data = pack_rows(
            rgb_frame.data(0),
            rgb_frame.stride(0),
            width as usize * 3,
            height as usize,
        );

        RgbImage::from_raw(width, height, data)
            .ok_or_else(|| Error::SourceUnavailable("decoded frame has an unexpected size".into()))
    }
}

impl FrameSource for VideoReader {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        if self.strategy == SeekStrategy::Indexed {
            match self.container_seek(frame_index) {
                Ok(()) => {
                    self.decoder.flush();
                    self.eof_sent = false;
                    self.next_index = frame_index;
                    log::debug!("Seeked to frame {}", frame_index);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "Seek to frame {} rejected ({}), decoding sequentially from here on",
                        frame_index,
                        e
                    );
                    self.strategy = SeekStrategy::FALLBACK;
                }
            }
        }

        if frame_index < self.next_index {
            return Err(Error::SourceUnavailable(format!(
                "cannot move back to frame {} from frame {} without seeking",
                frame_index, self.next_index
            )));
        }
        // Sequential: the next read decodes forward to the target.
        Ok(())
    }

    fn read_frame(&mut self, frame_index: u64) -> Result<Option<Frame>> {
        let decode_ahead = (DECODE_AHEAD_SECONDS * self.fps()) as u64;
        if self
            .strategy
            .needs_seek(self.next_index, frame_index, decode_ahead)
        {
            self.seek(frame_index)?;
        }

        loop {
            let Some(decoded) = self.decode_next()? else {
                return Ok(None);
            };
            let index = self.index_of(&decoded);
            self.next_index = index + 1;

            if index >= frame_index {
                let image = self.to_image(&decoded)?;
                return Ok(Some(Frame { index, image }));
            }
        }
    }
}

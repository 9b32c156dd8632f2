//! Synthetic frame sources for unit tests

use crate::video_reader::{Frame, FrameSource, SourceInfo};
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use image::{Rgb, RgbImage};
use std::path::Path;

/// A frame filled with one color
pub fn solid_frame(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// In-memory source whose frame colors come from a function of the index
pub struct PatternSource {
    pub width: u32,
    pub height: u32,
    pub frames_per_second: f64,
    pub frame_count: u64,
    pattern: Box<dyn Fn(u64) -> [u8; 3]>,
    /// Indices passed to `read_frame`, in call order
    pub reads: Vec<u64>,
    pub seeks: Vec<u64>,
}

impl PatternSource {
    pub fn new(
        width: u32,
        height: u32,
        frames_per_second: f64,
        frame_count: u64,
        pattern: impl Fn(u64) -> [u8; 3] + 'static,
    ) -> Self {
        Self {
            width,
            height,
            frames_per_second,
            frame_count,
            pattern: Box::new(pattern),
            reads: Vec::new(),
            seeks: Vec::new(),
        }
    }

    /// Every frame the same color
    pub fn uniform(frame_count: u64, frames_per_second: f64, color: [u8; 3]) -> Self {
        Self::new(32, 18, frames_per_second, frame_count, move |_| color)
    }
}

impl FrameSource for PatternSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            frames_per_second: self.frames_per_second,
            frame_count: self.frame_count,
            duration_seconds: self.frame_count as f64 / self.frames_per_second,
        }
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        self.seeks.push(frame_index);
        Ok(())
    }

    fn read_frame(&mut self, frame_index: u64) -> Result<Option<Frame>> {
        self.reads.push(frame_index);
        if frame_index >= self.frame_count {
            return Ok(None);
        }
        let color = (self.pattern)(frame_index);
        Ok(Some(Frame {
            index: frame_index,
            image: solid_frame(self.width, self.height, color),
        }))
    }
}

/// A source that cannot be positioned at all
pub struct UnseekableSource;

impl FrameSource for UnseekableSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: 32,
            height: 18,
            frames_per_second: 30.0,
            frame_count: 300,
            duration_seconds: 10.0,
        }
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        Err(Error::SourceUnavailable(format!(
            "cannot seek to frame {frame_index}"
        )))
    }

    fn read_frame(&mut self, _frame_index: u64) -> Result<Option<Frame>> {
        Err(Error::SourceUnavailable("not readable".into()))
    }
}

/// Decodes normally until `fail_at`, then errors on every read
pub struct BrokenAfter {
    pub inner: PatternSource,
    pub fail_at: u64,
}

impl FrameSource for BrokenAfter {
    fn info(&self) -> SourceInfo {
        self.inner.info()
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        self.inner.seek(frame_index)
    }

    fn read_frame(&mut self, frame_index: u64) -> Result<Option<Frame>> {
        if frame_index >= self.fail_at {
            return Err(Error::SourceUnavailable("corrupt packet".into()));
        }
        self.inner.read_frame(frame_index)
    }
}

/// Encodes one solid-color frame per entry of `colors` into `path`
///
/// Returns `false` when this FFmpeg build has none of the encoders tried.
pub fn write_clip(
    path: &Path,
    width: u32,
    height: u32,
    frames_per_second: i32,
    colors: &[[u8; 3]],
) -> Result<bool> {
    ffmpeg::init()?;
    let Some(codec) = [ffmpeg::codec::Id::MPEG4, ffmpeg::codec::Id::FFV1]
        .into_iter()
        .find_map(ffmpeg::encoder::find)
    else {
        return Ok(false);
    };

    let mut octx = ffmpeg::format::output(&path)?;
    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

    let time_base = ffmpeg::Rational(1, frames_per_second);
    let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()?;
    video.set_width(width);
    video.set_height(height);
    video.set_format(Pixel::YUV420P);
    video.set_time_base(time_base);
    video.set_frame_rate(Some(ffmpeg::Rational(frames_per_second, 1)));
    video.set_gop(12);
    video.set_max_b_frames(0);
    if global_header {
        video.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
    }
    let mut encoder = video.open_as(codec)?;

    let stream_index = {
        let mut stream = octx.add_stream(codec)?;
        stream.set_parameters(&encoder);
        stream.set_time_base(time_base);
        stream.index()
    };
    octx.write_header()?;
    let stream_time_base = octx
        .stream(stream_index)
        .map(|stream| stream.time_base())
        .unwrap_or(time_base);

    let mut scaler = ffmpeg::software::scaling::Context::get(
        Pixel::RGB24,
        width,
        height,
        Pixel::YUV420P,
        width,
        height,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )?;

    for (i, color) in colors.iter().enumerate() {
        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let plane = rgb.data_mut(0);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let offset = y * stride + x * 3;
                plane[offset..offset + 3].copy_from_slice(color);
            }
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(i as i64));
        encoder.send_frame(&yuv)?;
        drain_packets(&mut encoder, &mut octx, stream_index, time_base, stream_time_base)?;
    }

    encoder.send_eof()?;
    drain_packets(&mut encoder, &mut octx, stream_index, time_base, stream_time_base)?;
    octx.write_trailer()?;
    Ok(true)
}

fn drain_packets(
    encoder: &mut ffmpeg::encoder::video::Encoder,
    octx: &mut ffmpeg::format::context::Output,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
) -> Result<()> {
    let mut packet = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(encoder_time_base, stream_time_base);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}

use std::path::{Path, PathBuf};

use crate::display::domain::display_sink::{DisplayError, DisplaySink};
use crate::shared::frame::Frame;

/// Encodes annotated frames into a video file (MPEG-4 video, container
/// chosen from the file extension).
///
/// The encoder opens on the first frame and takes its size from it; later
/// frames must keep that size.
pub struct RecordingDisplay {
    path: PathBuf,
    fps: i32,
    encoder: Option<Encoder>,
    closed: bool,
}

// Safety: RecordingDisplay is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for RecordingDisplay {}

struct Encoder {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    frame_count: usize,
}

impl RecordingDisplay {
    /// `fps` is the playback rate stamped into the file. Zero falls back
    /// to 30.
    pub fn new(path: impl Into<PathBuf>, fps: u32) -> Self {
        let fps = if fps == 0 { 30 } else { fps.min(i32::MAX as u32) as i32 };
        Self {
            path: path.into(),
            fps,
            encoder: None,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> usize {
        self.encoder.as_ref().map_or(0, |e| e.frame_count)
    }

    fn open(&self, width: u32, height: u32) -> Result<Encoder, DisplayError> {
        ffmpeg_next::init().map_err(encode_error)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut octx = ffmpeg_next::format::output(&self.path).map_err(encode_error)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or_else(|| DisplayError::Encode("MPEG4 encoder not found".into()))?;
        let mut ost = octx.add_stream(Some(codec)).map_err(encode_error)?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(encode_error)?;
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, self.fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(self.fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .map_err(encode_error)?;
        ost.set_parameters(&encoder);
        octx.write_header().map_err(encode_error)?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(encode_error)?;

        log::info!(
            "Recording to {} ({width}x{height} @ {} fps)",
            self.path.display(),
            self.fps
        );

        Ok(Encoder {
            octx,
            encoder,
            scaler,
            width,
            height,
            frame_count: 0,
        })
    }
}

impl DisplaySink for RecordingDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Encode("recording already closed".into()));
        }
        if self.encoder.is_none() {
            self.encoder = Some(self.open(frame.width(), frame.height())?);
        }
        let fps = self.fps;
        let Some(enc) = self.encoder.as_mut() else {
            return Ok(());
        };
        enc.write(frame, fps)
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        self.closed = true;
        let Some(mut enc) = self.encoder.take() else {
            return Ok(());
        };
        enc.finish(self.fps)?;
        log::info!(
            "Recording closed: {} frames written to {}",
            enc.frame_count,
            self.path.display()
        );
        Ok(())
    }
}

impl Encoder {
    fn write(&mut self, frame: &Frame, fps: i32) -> Result<(), DisplayError> {
        if (frame.width(), frame.height()) != (self.width, self.height) {
            return Err(DisplayError::FrameSize {
                expected: (self.width, self.height),
                got: (frame.width(), frame.height()),
            });
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb_frame.stride(0);
        copy_into_strided(frame.data(), rgb_frame.data_mut(0), stride, self.width, self.height);

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&rgb_frame, &mut yuv_frame)
            .map_err(encode_error)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        self.encoder.send_frame(&yuv_frame).map_err(encode_error)?;
        self.drain(fps)?;
        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self, fps: i32) -> Result<(), DisplayError> {
        self.encoder.send_eof().map_err(encode_error)?;
        self.drain(fps)?;
        self.octx.write_trailer().map_err(encode_error)
    }

    fn drain(&mut self, fps: i32) -> Result<(), DisplayError> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or_else(|| DisplayError::Encode("output stream missing".into()))?
            .time_base();
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded
                .write_interleaved(&mut self.octx)
                .map_err(encode_error)?;
        }
        Ok(())
    }
}

/// Copies a tightly packed RGB buffer into a plane whose rows are
/// `stride` bytes apart.
fn copy_into_strided(src: &[u8], dst: &mut [u8], stride: usize, width: u32, height: u32) {
    let row_bytes = width as usize * 3;
    for row in 0..height as usize {
        let src_start = row * row_bytes;
        let dst_start = row * stride;
        dst[dst_start..dst_start + row_bytes]
            .copy_from_slice(&src[src_start..src_start + row_bytes]);
    }
}

fn encode_error(e: impl std::fmt::Display) -> DisplayError {
    DisplayError::Encode(e.to_string())
}

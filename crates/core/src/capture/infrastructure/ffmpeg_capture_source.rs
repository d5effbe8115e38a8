use std::ffi::CString;

use ffmpeg_next::format::context::Input;

use crate::capture::domain::frame_source::{FrameSource, SourceError};
use crate::shared::frame::Frame;

/// Capture device, stream URL or video file decoded through ffmpeg-next.
///
/// Every decoded frame is converted to RGB24. A bare device number such as
/// `"0"` is mapped to the platform's camera naming (`/dev/video0` with the
/// `v4l2` demuxer on Linux).
pub struct FfmpegCaptureSource {
    source: String,
    input_format: Option<String>,
    options: Vec<(String, String)>,
    state: Option<CaptureState>,
    exhausted: bool,
}

// Safety: FfmpegCaptureSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCaptureSource {}

struct CaptureState {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
}

impl FfmpegCaptureSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            input_format: None,
            options: Vec::new(),
            state: None,
            exhausted: false,
        }
    }

    /// Forces a demuxer by name, e.g. `v4l2`, `avfoundation` or `dshow`.
    pub fn with_input_format(mut self, format: Option<String>) -> Self {
        self.input_format = format;
        self
    }

    /// Extra demuxer option such as `framerate` or `video_size`.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Frame size of the opened stream.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|s| (s.width, s.height))
    }

    fn open(&self) -> Result<CaptureState, SourceError> {
        ffmpeg_next::init().map_err(|e| SourceError::Init(e.to_string()))?;

        let (location, format) = resolve_device(&self.source, self.input_format.as_deref());
        let mut options = ffmpeg_next::Dictionary::new();
        for (key, value) in &self.options {
            options.set(key, value);
        }

        let ictx = match format {
            Some(name) => {
                let demuxer = find_input_format(&name)
                    .ok_or_else(|| SourceError::Init(format!("unknown input format: {name}")))?;
                let ctx = ffmpeg_next::format::open_with(
                    &location,
                    &ffmpeg_next::format::Format::Input(demuxer),
                    options,
                )
                .map_err(|e| SourceError::Init(format!("{location}: {e}")))?;
                match ctx {
                    ffmpeg_next::format::context::Context::Input(ictx) => ictx,
                    ffmpeg_next::format::context::Context::Output(_) => {
                        return Err(SourceError::Init(format!(
                            "{location} opened as an output"
                        )))
                    }
                }
            }
            None => ffmpeg_next::format::input_with_dictionary(&location, options)
                .map_err(|e| SourceError::Init(format!("{location}: {e}")))?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| SourceError::Init(format!("{location}: no video stream found")))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| SourceError::Init(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| SourceError::Init(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| SourceError::Init(e.to_string()))?;

        log::info!("Capture opened: {location} ({width}x{height})");

        Ok(CaptureState {
            ictx,
            decoder,
            scaler,
            width,
            height,
            stream_index,
            frame_index: 0,
            flushing: false,
        })
    }
}

impl FrameSource for FfmpegCaptureSource {
    fn start(&mut self) -> Result<(), SourceError> {
        if self.state.is_some() {
            return Ok(());
        }
        self.state = Some(self.open()?);
        self.exhausted = false;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        if self.exhausted {
            return Ok(None);
        }
        let frame = state.next_frame()?;
        if frame.is_none() {
            self.exhausted = true;
        }
        Ok(frame)
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        if self.state.take().is_some() {
            log::info!("Capture closed: {}", self.source);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.is_some()
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl CaptureState {
    fn try_receive(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| SourceError::Read(e.to_string()))?;

        let pixels = extract_rgb_pixels(
            rgb_frame.data(0),
            rgb_frame.stride(0),
            self.width,
            self.height,
        );
        let frame = Frame::new(pixels, self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    /// Decodes until one frame is ready. `None` means end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                return self.try_receive();
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }
}

/// Maps a bare camera number to the platform device name and default
/// demuxer. Anything else is passed through untouched.
fn resolve_device(source: &str, format: Option<&str>) -> (String, Option<String>) {
    let is_index = !source.is_empty() && source.chars().all(|c| c.is_ascii_digit());
    if !is_index {
        return (source.to_string(), format.map(str::to_string));
    }
    let (location, default_format) = if cfg!(target_os = "linux") {
        (format!("/dev/video{source}"), "v4l2")
    } else if cfg!(target_os = "macos") {
        (source.to_string(), "avfoundation")
    } else {
        (source.to_string(), "dshow")
    };
    (
        location,
        Some(format.unwrap_or(default_format).to_string()),
    )
}

/// Looks a demuxer up by name: capture devices first, then every registered
/// input format (`mjpeg`, `rtsp`, `mp4`, ...). Needs `ffmpeg_next::init()`.
fn find_input_format(name: &str) -> Option<ffmpeg_next::format::Input> {
    if let Some(device) = ffmpeg_next::device::input::video().find(|f| f.name() == name) {
        return Some(device);
    }
    let c_name = CString::new(name).ok()?;
    // Safety: av_find_input_format only reads the NUL-terminated name and
    // returns a pointer to a static demuxer descriptor, or null.
    let demuxer = unsafe { ffmpeg_next::ffi::av_find_input_format(c_name.as_ptr()) };
    if demuxer.is_null() {
        return None;
    }
    // Safety: non-null descriptors live for the whole process.
    Some(unsafe { ffmpeg_next::format::Input::wrap(demuxer as *mut _) })
}

/// Copies pixel rows out of a strided RGB24 plane into a tightly packed
/// buffer.
fn extract_rgb_pixels(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

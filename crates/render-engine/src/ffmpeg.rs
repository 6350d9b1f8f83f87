//! FFmpeg media backend.
//!
//! Sources are opened twice, once per track reader, so the video and audio
//! pumps never share a demuxer. The sink encodes H.264 into an MP4 container
//! and copies the source audio stream without re-encoding.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ffmpeg_next as ffmpeg;
use ffmpeg::codec;
use ffmpeg::format::{self, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{Dictionary, Packet, Rational};

use shotcraft_common::{ShotcraftError, ShotcraftResult};

use crate::backend::{
    AudioTrackReader, MediaBackend, MediaSink, OpenedSource, SinkSpec, SourceInfo, TimeBase,
    VideoSample, VideoTrackReader,
};
use crate::geometry::CanvasSize;
use crate::pixel::{PixelBuffer, SourceTransform};

const DELIVERY_CONTAINER: &str = "mp4";
const FALLBACK_FRAME_RATE: f64 = 30.0;
const DISPLAY_MATRIX_BYTES: usize = 9 * std::mem::size_of::<i32>();

static FFMPEG_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize FFmpeg once and quiet its logging down to errors.
pub fn init() -> ShotcraftResult<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            ffmpeg::init().map_err(|e| e.to_string())?;
            // SAFETY: av_log_set_level only stores the global log level.
            unsafe {
                ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_ERROR);
            }
            Ok(())
        })
        .clone()
        .map_err(|e| ShotcraftError::unsupported(format!("FFmpeg initialization failed: {e}")))
}

/// Whether an H.264 encoder is linked in.
pub fn h264_encoder_available() -> bool {
    init().is_ok() && ffmpeg::encoder::find(codec::Id::H264).is_some()
}

/// Human-readable libavcodec / libavformat versions.
pub fn library_versions() -> String {
    let split = |v: u32| format!("{}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff);
    format!(
        "avcodec {}, avformat {}",
        split(ffmpeg::codec::version()),
        split(ffmpeg::format::version())
    )
}

fn rational(tb: TimeBase) -> Rational {
    Rational::new(tb.num, tb.den)
}

fn time_base(r: Rational) -> TimeBase {
    TimeBase::new(r.numerator(), r.denominator())
}

fn ratio_to_f64(r: Rational) -> Option<f64> {
    (r.numerator() > 0 && r.denominator() > 0).then(|| r.numerator() as f64 / r.denominator() as f64)
}

fn open_input(source: &Path) -> ShotcraftResult<format::context::Input> {
    init()?;
    format::input(&source)
        .map_err(|e| ShotcraftError::asset_access(format!("{}: {e}", source.display())))
}

/// Read the display matrix from the stream's coded side data.
fn display_matrix(params: &codec::Parameters) -> Option<[i32; 9]> {
    // SAFETY: the parameters outlive this call and FFmpeg guarantees
    // `coded_side_data` holds `nb_coded_side_data` initialized entries.
    unsafe {
        let par = params.as_ptr();
        let entries = (*par).coded_side_data;
        let count = (*par).nb_coded_side_data.max(0) as usize;
        if entries.is_null() {
            return None;
        }
        for i in 0..count {
            let entry = &*entries.add(i);
            if entry.type_ == ffmpeg::ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX
                && entry.size >= DISPLAY_MATRIX_BYTES
                && !entry.data.is_null()
            {
                let mut matrix = [0i32; 9];
                std::ptr::copy_nonoverlapping(
                    entry.data as *const u8,
                    matrix.as_mut_ptr() as *mut u8,
                    DISPLAY_MATRIX_BYTES,
                );
                return Some(matrix);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Video reader
// ---------------------------------------------------------------------------

struct FfmpegVideoReader {
    input: format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<(scaling::Context, Pixel, u32, u32)>,
    draining: bool,
    last_pts: Option<i64>,
}

// SAFETY: the demuxer, decoder and scaler are owned exclusively by this reader
// and only ever used from the one thread that currently owns it.
unsafe impl Send for FfmpegVideoReader {}

impl FfmpegVideoReader {
    fn open(source: &Path) -> ShotcraftResult<(Self, SourceInfo, i64)> {
        let input = open_input(source)?;
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| ShotcraftError::NoVideoTrack {
                path: source.to_path_buf(),
            })?;
        let stream_index = stream.index();
        let params = stream.parameters();
        let transform = display_matrix(&params)
            .map(|m| SourceTransform::from_display_matrix(&m))
            .unwrap_or_default();

        let decoder = codec::context::Context::from_parameters(params)
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| {
                ShotcraftError::asset_access(format!("{}: cannot open decoder: {e}", source.display()))
            })?;

        let tb = stream.time_base();
        let frame_rate = ratio_to_f64(stream.avg_frame_rate())
            .or_else(|| ratio_to_f64(stream.rate()))
            .unwrap_or(FALLBACK_FRAME_RATE);
        let duration_secs = if stream.duration() > 0 {
            time_base(tb).to_secs(stream.duration())
        } else if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };
        let start_pts = match stream.start_time() {
            t if t == ffmpeg::ffi::AV_NOPTS_VALUE => 0,
            t => t,
        };
        let has_audio = input.streams().best(Type::Audio).is_some();

        let info = SourceInfo {
            coded_width: decoder.width(),
            coded_height: decoder.height(),
            transform,
            frame_rate,
            duration_secs,
            time_base: time_base(tb),
            has_audio,
        };

        Ok((
            Self {
                input,
                stream_index,
                decoder,
                scaler: None,
                draining: false,
                last_pts: None,
            },
            info,
            start_pts,
        ))
    }

    /// Seek to the keyframe at or before `seconds`.
    fn seek(&mut self, seconds: f64) {
        let ts = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        match self.input.seek(ts, ..ts) {
            Ok(()) => self.decoder.flush(),
            Err(e) => tracing::warn!(seconds, "Seek failed, decoding from start: {e}"),
        }
    }

    fn to_buffer(&mut self, decoded: &VideoFrame) -> ShotcraftResult<PixelBuffer> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let stale = !matches!(
            &self.scaler,
            Some((_, f, w, h)) if *f == format && *w == width && *h == height
        );
        if stale {
            let ctx = scaling::Context::get(
                format,
                width,
                height,
                Pixel::RGBA,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| ShotcraftError::stream(format!("cannot create scaler: {e}")))?;
            self.scaler = Some((ctx, format, width, height));
        }

        let mut rgba = VideoFrame::empty();
        if let Some((scaler, ..)) = self.scaler.as_mut() {
            scaler
                .run(decoded, &mut rgba)
                .map_err(|e| ShotcraftError::stream(format!("pixel conversion failed: {e}")))?;
        }

        // Decoded video is opaque, so straight RGBA is already premultiplied.
        PixelBuffer::from_raw(width, height, rgba.stride(0), rgba.data(0).to_vec())
            .ok_or_else(|| ShotcraftError::stream("decoded frame has an invalid layout"))
    }

    fn receive(&mut self) -> ShotcraftResult<Option<VideoFrame>> {
        let mut decoded = VideoFrame::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => Ok(Some(decoded)),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(ffmpeg::Error::Other {
                errno: ffmpeg::util::error::EAGAIN,
            }) => Ok(None),
            Err(e) => Err(ShotcraftError::stream(format!("video decode failed: {e}"))),
        }
    }
}

impl VideoTrackReader for FfmpegVideoReader {
    fn next_frame(&mut self) -> ShotcraftResult<Option<VideoSample>> {
        loop {
            if let Some(decoded) = self.receive()? {
                let pts = decoded
                    .timestamp()
                    .or_else(|| decoded.pts())
                    .unwrap_or_else(|| self.last_pts.map_or(0, |p| p + 1));
                self.last_pts = Some(pts);
                let frame = self.to_buffer(&decoded)?;
                return Ok(Some(VideoSample { pts, frame }));
            }
            if self.draining {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| ShotcraftError::stream(format!("video decode failed: {e}")))?;
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| ShotcraftError::stream(format!("decoder flush failed: {e}")))?;
                    self.draining = true;
                }
                Err(e) => return Err(ShotcraftError::stream(format!("demux failed: {e}"))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Audio reader
// ---------------------------------------------------------------------------

/// A compressed audio packet and the time base its timestamps are in.
pub struct FfmpegAudioPacket {
    packet: Packet,
    time_base: Rational,
}

struct FfmpegAudioReader {
    input: format::context::Input,
    stream_index: usize,
    time_base: Rational,
}

// SAFETY: the demuxer is owned exclusively by this reader.
unsafe impl Send for FfmpegAudioReader {}

impl FfmpegAudioReader {
    fn open(source: &Path) -> ShotcraftResult<Option<Self>> {
        let input = open_input(source)?;
        let Some(stream) = input.streams().best(Type::Audio) else {
            return Ok(None);
        };
        let stream_index = stream.index();
        let time_base = stream.time_base();
        Ok(Some(Self {
            input,
            stream_index,
            time_base,
        }))
    }
}

impl AudioTrackReader<FfmpegAudioPacket> for FfmpegAudioReader {
    fn next_packet(&mut self) -> ShotcraftResult<Option<FfmpegAudioPacket>> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => {
                    return Ok(Some(FfmpegAudioPacket {
                        packet,
                        time_base: self.time_base,
                    }))
                }
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => return Err(ShotcraftError::stream(format!("audio demux failed: {e}"))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

struct FfmpegSink {
    output: format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: scaling::Context,
    rgba: VideoFrame,
    canvas: CanvasSize,
    video_index: usize,
    encoder_time_base: Rational,
    video_time_base: Rational,
    audio: Option<(usize, Rational)>,
    path: PathBuf,
}

// SAFETY: the muxer, encoder and scaler are owned exclusively by the writer task.
unsafe impl Send for FfmpegSink {}

/// Largest even size not above `canvas`; H.264 with 4:2:0 chroma needs even dimensions.
fn even_dimensions(canvas: CanvasSize) -> ShotcraftResult<(u32, u32)> {
    let (w, h) = (canvas.width & !1, canvas.height & !1);
    if w == 0 || h == 0 {
        return Err(ShotcraftError::pipeline_setup(format!(
            "canvas {}x{} is too small to encode",
            canvas.width, canvas.height
        )));
    }
    if (w, h) != (canvas.width, canvas.height) {
        tracing::warn!(
            width = canvas.width,
            height = canvas.height,
            encoded_width = w,
            encoded_height = h,
            "Odd canvas size rounded down for encoding"
        );
    }
    Ok((w, h))
}

impl FfmpegSink {
    fn create(destination: &Path, source: &Path, spec: &SinkSpec) -> ShotcraftResult<Self> {
        init()?;
        let setup = |what: &str, e: ffmpeg::Error| {
            ShotcraftError::pipeline_setup(format!("{what}: {e}"))
        };

        let (enc_w, enc_h) = even_dimensions(spec.canvas)?;
        let mut output = format::output_as(&destination, DELIVERY_CONTAINER)
            .map_err(|e| setup("cannot create output container", e))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(codec::Id::H264)
            .ok_or_else(|| ShotcraftError::pipeline_setup("no H.264 encoder available"))?;
        let encoder_time_base = rational(spec.time_base);

        let mut stream = output
            .add_stream(codec)
            .map_err(|e| setup("cannot add video track", e))?;
        let video_index = stream.index();

        let mut config = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| setup("cannot configure video encoder", e))?;
        config.set_width(enc_w);
        config.set_height(enc_h);
        config.set_format(Pixel::YUV420P);
        config.set_time_base(encoder_time_base);
        if spec.frame_rate > 0.0 {
            config.set_frame_rate(Some(Rational::from(spec.frame_rate)));
        }
        if global_header {
            config.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut options = Dictionary::new();
        options.set("preset", &spec.preset);
        options.set("crf", &spec.crf.to_string());
        options.set("flags", "+bitexact");
        let encoder = config
            .open_with(options)
            .map_err(|e| setup("cannot open H.264 encoder", e))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        let audio = if spec.with_audio {
            let input = open_input(source)?;
            let source_stream = input.streams().best(Type::Audio).ok_or_else(|| {
                ShotcraftError::pipeline_setup("source audio track disappeared")
            })?;
            let mut audio_stream = output
                .add_stream(ffmpeg::encoder::find(codec::Id::None))
                .map_err(|e| setup("cannot add audio track", e))?;
            audio_stream.set_parameters(source_stream.parameters());
            // SAFETY: clearing the tag lets the MP4 muxer pick its own fourcc.
            unsafe {
                (*audio_stream.parameters().as_mut_ptr()).codec_tag = 0;
            }
            Some(audio_stream.index())
        } else {
            None
        };

        let mut header_options = Dictionary::new();
        header_options.set("fflags", "+bitexact");
        output
            .write_header_with(header_options)
            .map_err(|e| setup("cannot write container header", e))?;

        let stream_time_base = |index: usize| {
            output
                .stream(index)
                .map(|s| s.time_base())
                .unwrap_or(encoder_time_base)
        };
        let video_time_base = stream_time_base(video_index);
        let audio = audio.map(|index| (index, stream_time_base(index)));

        let scaler = scaling::Context::get(
            Pixel::RGBA,
            spec.canvas.width,
            spec.canvas.height,
            Pixel::YUV420P,
            enc_w,
            enc_h,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| setup("cannot create color converter", e))?;

        tracing::debug!(
            output = %destination.display(),
            width = enc_w,
            height = enc_h,
            crf = spec.crf,
            preset = %spec.preset,
            audio = audio.is_some(),
            "Opened H.264 sink"
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            rgba: VideoFrame::new(Pixel::RGBA, spec.canvas.width, spec.canvas.height),
            canvas: spec.canvas,
            video_index,
            encoder_time_base,
            video_time_base,
            audio,
            path: destination.to_path_buf(),
        })
    }

    fn drain_encoder(&mut self) -> ShotcraftResult<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.video_index);
            packet.rescale_ts(self.encoder_time_base, self.video_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| ShotcraftError::stream(format!("video mux failed: {e}")))?;
        }
        Ok(())
    }
}

impl MediaSink<FfmpegAudioPacket> for FfmpegSink {
    fn write_video(&mut self, sample: VideoSample) -> ShotcraftResult<()> {
        let frame = &sample.frame;
        if frame.width != self.canvas.width || frame.height != self.canvas.height {
            return Err(ShotcraftError::stream(format!(
                "frame is {}x{}, sink expects {}x{}",
                frame.width, frame.height, self.canvas.width, self.canvas.height
            )));
        }

        let dst_stride = self.rgba.stride(0);
        let row_bytes = frame.width as usize * 4;
        let dst = self.rgba.data_mut(0);
        for y in 0..frame.height {
            let start = y as usize * dst_stride;
            dst[start..start + row_bytes].copy_from_slice(frame.row(y));
        }

        let mut yuv = VideoFrame::empty();
        self.scaler
            .run(&self.rgba, &mut yuv)
            .map_err(|e| ShotcraftError::stream(format!("color conversion failed: {e}")))?;
        yuv.set_pts(Some(sample.pts));

        self.encoder
            .send_frame(&yuv)
            .map_err(|e| ShotcraftError::stream(format!("video encode failed: {e}")))?;
        self.drain_encoder()
    }

    fn write_audio(&mut self, audio: FfmpegAudioPacket) -> ShotcraftResult<()> {
        let Some((index, out_tb)) = self.audio else {
            return Ok(());
        };
        let mut packet = audio.packet;
        packet.rescale_ts(audio.time_base, out_tb);
        packet.set_position(-1);
        packet.set_stream(index);
        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| ShotcraftError::stream(format!("audio mux failed: {e}")))
    }

    fn finish_video(&mut self) -> ShotcraftResult<()> {
        self.encoder
            .send_eof()
            .map_err(|e| ShotcraftError::stream(format!("encoder flush failed: {e}")))?;
        self.drain_encoder()
    }

    fn finalize(mut self: Box<Self>) -> ShotcraftResult<()> {
        self.output
            .write_trailer()
            .map_err(|e| ShotcraftError::stream(format!("cannot finalize container: {e}")))?;
        tracing::debug!(output = %self.path.display(), "Container finalized");
        Ok(())
    }

    fn abandon(self: Box<Self>) {
        tracing::debug!(output = %self.path.display(), "Abandoning unfinished container");
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// [`MediaBackend`] backed by libavformat / libavcodec.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> ShotcraftResult<Self> {
        init()?;
        Ok(Self)
    }
}

impl MediaBackend for FfmpegBackend {
    type AudioPacket = FfmpegAudioPacket;

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, source: &Path) -> ShotcraftResult<OpenedSource<FfmpegAudioPacket>> {
        let (video, info, _) = FfmpegVideoReader::open(source)?;
        let audio = if info.has_audio {
            FfmpegAudioReader::open(source)?
                .map(|reader| Box::new(reader) as Box<dyn AudioTrackReader<FfmpegAudioPacket>>)
        } else {
            None
        };
        Ok(OpenedSource {
            info,
            video: Box::new(video),
            audio,
        })
    }

    fn create_sink(
        &self,
        destination: &Path,
        source: &Path,
        spec: &SinkSpec,
    ) -> ShotcraftResult<Box<dyn MediaSink<FfmpegAudioPacket>>> {
        Ok(Box::new(FfmpegSink::create(destination, source, spec)?))
    }

    fn decode_frame_at(
        &self,
        source: &Path,
        seconds: f64,
    ) -> ShotcraftResult<(PixelBuffer, SourceInfo)> {
        let (mut reader, info, start_pts) = FfmpegVideoReader::open(source)?;
        let seconds = seconds.max(0.0);
        if seconds > 0.0 {
            reader.seek(seconds);
        }
        let target = start_pts + info.time_base.from_secs(seconds);

        let mut last = None;
        while let Some(sample) = reader.next_frame()? {
            let reached = sample.pts >= target;
            last = Some(sample.frame);
            if reached {
                break;
            }
        }

        let frame = last.ok_or_else(|| {
            ShotcraftError::stream(format!("{}: no decodable video frame", source.display()))
        })?;
        Ok((frame, info))
    }

    fn probe(&self, source: &Path) -> ShotcraftResult<SourceInfo> {
        FfmpegVideoReader::open(source).map(|(_, info, _)| info)
    }
}

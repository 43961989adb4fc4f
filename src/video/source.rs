use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::ffmpeg::{self, StderrCollector, FFMPEG, FFPROBE};
use crate::video::types::{frame_from_bytes, parse_frame_rate, Frame, VideoProperties};

/// Sequential frame-by-frame reader
pub trait FrameSource {
    /// Properties reported when the source was opened
    fn properties(&self) -> VideoProperties;

    /// Next frame in decode order, or `None` once the source is exhausted.
    ///
    /// A read that fails after the source has produced frames counts as
    /// exhaustion. A source that fails before its first frame is an error.
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

#[derive(Debug, Default, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<ReportedStream>,
    #[serde(default)]
    format: Option<ReportedFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportedStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    #[serde(default)]
    tags: Option<StreamTags>,
}

#[derive(Debug, Default, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportedFormat {
    duration: Option<String>,
}

impl ReportedStream {
    /// Display rotation in degrees; display matrix first, legacy `rotate` tag second
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side_data| side_data.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|tags| tags.rotate.as_deref())
                    .and_then(|rotate| rotate.trim().parse::<f64>().ok())
            })
            .unwrap_or(0.0)
    }
}

impl StreamReport {
    /// Properties of the first video stream, `None` if there is no usable one
    ///
    /// Width and height are the displayed size: ffmpeg applies the rotation
    /// while decoding, so a quarter turn swaps them.
    fn video_properties(&self) -> Option<VideoProperties> {
        let stream = self.streams.first()?;
        let mut width = stream.width.filter(|&w| w > 0)?;
        let mut height = stream.height.filter(|&h| h > 0)?;

        let quarter_turns = (stream.rotation() / 90.0).round() as i64;
        if quarter_turns.rem_euclid(2) == 1 {
            std::mem::swap(&mut width, &mut height);
        }

        let mut fps = stream.avg_frame_rate.as_deref().map(parse_frame_rate).unwrap_or(0.0);
        if fps <= 0.0 {
            fps = stream.r_frame_rate.as_deref().map(parse_frame_rate).unwrap_or(0.0);
        }

        let frame_count = stream
            .nb_frames
            .as_deref()
            .and_then(|n| n.trim().parse::<i64>().ok())
            .unwrap_or_else(|| {
                let duration = stream
                    .duration
                    .as_deref()
                    .or_else(|| self.format.as_ref().and_then(|f| f.duration.as_deref()))
                    .and_then(|d| d.trim().parse::<f64>().ok())
                    .unwrap_or(0.0);
                (duration * fps).round() as i64
            });

        Some(VideoProperties { fps, width, height, frame_count })
    }
}

/// Splits a raw rgb24 byte stream into frames of one fixed size
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self { reader, width, height }
    }

    /// Next whole frame, `Ok(None)` at a clean end of stream
    ///
    /// A stream that stops part way into a frame is an `UnexpectedEof` error.
    pub fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut data = vec![0u8; Frame::byte_len(self.width, self.height)];
        let mut filled = 0;

        while filled < data.len() {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended {} bytes into a {}-byte frame", filled, data.len()),
            ));
        }

        frame_from_bytes(self.width, self.height, data)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

/// Error for a decoder that exited unsuccessfully, if its exit matters
///
/// A decoder failing after it produced frames only ends that source early.
/// Failing before the first frame means the input could not be decoded at all.
fn decoder_exit_error(path: &Path, success: bool, frames_read: u64, detail: &str) -> Option<VideoError> {
    if success || frames_read > 0 {
        return None;
    }
    Some(VideoError::DecodingFailed {
        reason: if detail.is_empty() {
            format!("ffmpeg could not decode {}", path.display())
        } else {
            format!("ffmpeg could not decode {}: {}", path.display(), detail)
        },
    })
}

/// ffmpeg invocation decoding the first video stream of `path` to raw rgb24
/// frames of exactly `width` x `height`
fn decoder_command(path: &Path, width: u32, height: u32) -> Command {
    let mut cmd = Command::new(FFMPEG);
    cmd.args(["-hide_banner", "-nostdin", "-v", "error", "-i"])
        .arg(path)
        .args(["-map", "0:v:0", "-an", "-sn"])
        .args(["-vf", format!("scale={}:{}:flags=area", width, height).as_str()])
        .args([
            "-vsync", "passthrough",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "pipe:1",
        ]);
    cmd
}

/// Decoder backed by an `ffmpeg` child process emitting raw rgb24 frames
///
/// ffmpeg scales every frame to the size the source was opened with, so
/// rotated inputs and mid-stream resolution changes still arrive whole.
/// The child is killed and reaped when the source is dropped, so a source
/// opened before a later failure never outlives the failed call.
pub struct FfmpegSource {
    path: PathBuf,
    properties: VideoProperties,
    child: Child,
    frames: Option<RawFrameReader<BufReader<ChildStdout>>>,
    stderr: StderrCollector,
    frames_read: u64,
}

impl FfmpegSource {
    /// Query the first video stream of `path` with ffprobe
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<VideoProperties> {
        let path = path.as_ref();
        let open_failed = |reason: String| VideoError::OpenFailed {
            path: path.display().to_string(),
            reason,
        };

        let mut cmd = Command::new(FFPROBE);
        cmd.args([
            "-v", "error",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
            "-select_streams", "v:0",
        ])
        .arg(path);

        ffmpeg::log_command(&cmd);

        let output = cmd
            .output()
            .map_err(|e| open_failed(format!("failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(open_failed(String::from_utf8_lossy(&output.stderr).trim().to_string()).into());
        }

        let report: StreamReport = serde_json::from_slice(&output.stdout)
            .map_err(|e| open_failed(format!("unreadable ffprobe output: {}", e)))?;

        let properties = report
            .video_properties()
            .ok_or_else(|| open_failed("no decodable video stream".to_string()))?;

        debug!(
            "Source {}: {}x{} @ {:.3} fps, ~{} frames",
            path.display(), properties.width, properties.height, properties.fps, properties.frame_count
        );
        Ok(properties)
    }

    /// Start decoding `path` into `width` x `height` frames
    ///
    /// `properties` are what [`FfmpegSource::inspect`] reported for `path`.
    pub fn open<P: AsRef<Path>>(path: P, properties: VideoProperties, width: u32, height: u32) -> Result<Self> {
        let path = path.as_ref();
        if width == 0 || height == 0 {
            return Err(VideoError::InvalidParameters {
                details: format!("cannot decode {} into {}x{} frames", path.display(), width, height),
            }.into());
        }

        let mut cmd = decoder_command(path, width, height);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        ffmpeg::log_command(&cmd);

        let mut child = cmd.spawn().map_err(|e| VideoError::OpenFailed {
            path: path.display().to_string(),
            reason: format!("failed to spawn ffmpeg: {}", e),
        })?;

        let frames = child
            .stdout
            .take()
            .map(|stdout| RawFrameReader::new(BufReader::new(stdout), width, height));
        let stderr = StderrCollector::spawn(child.stderr.take());

        info!(
            "Opened {} ({}x{}, decoding at {}x{})",
            path.display(), properties.width, properties.height, width, height
        );

        Ok(Self {
            path: path.to_path_buf(),
            properties,
            child,
            frames,
            stderr,
            frames_read: 0,
        })
    }

    /// Stop the decoder and report how it ended
    fn finish_stream(&mut self) -> Result<()> {
        self.frames = None;
        let status = self.child.wait();
        let stderr = self.stderr.collect();

        match status {
            Ok(status) if status.success() => {
                debug!("{} exhausted after {} frames", self.path.display(), self.frames_read);
                Ok(())
            }
            Ok(status) => {
                let detail = if stderr.is_empty() { status.to_string() } else { stderr };
                if let Some(err) = decoder_exit_error(&self.path, false, self.frames_read, &detail) {
                    return Err(err.into());
                }
                warn!(
                    "Decoder for {} exited with {} after {} frames: {}",
                    self.path.display(), status, self.frames_read, detail
                );
                Ok(())
            }
            Err(e) => {
                warn!("Could not reap decoder for {}: {}", self.path.display(), e);
                Ok(())
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(frames) = self.frames.as_mut() else {
            return Ok(None);
        };

        match frames.next_frame() {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                Ok(Some(frame))
            }
            Ok(None) => {
                self.finish_stream()?;
                Ok(None)
            }
            Err(e) => {
                warn!("Read from {} failed: {}", self.path.display(), e);
                self.finish_stream()?;
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.frames = None;
        ffmpeg::terminate(&mut self.child);
    }
}

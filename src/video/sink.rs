use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info};

use crate::error::{Result, VideoError};
use crate::video::ffmpeg::{self, StderrCollector, FFMPEG};
use crate::video::types::Frame;

/// Sequential frame-by-frame writer with a frame size fixed at open time
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
}

/// Map a four-character code onto the ffmpeg encoder that produces it.
///
/// Unknown codes are assumed to already be ffmpeg encoder names.
pub fn encoder_for_codec(codec: &str) -> String {
    let encoder = match codec.to_ascii_lowercase().as_str() {
        "mp4v" | "xvid" | "divx" | "fmp4" | "dx50" => "mpeg4",
        "avc1" | "h264" | "x264" => "libx264",
        "hvc1" | "hev1" | "hevc" | "h265" => "libx265",
        "mjpg" => "mjpeg",
        "vp80" | "vp8" => "libvpx",
        "vp90" | "vp09" | "vp9" => "libvpx-vp9",
        "av01" => "libaom-av1",
        _ => return codec.to_string(),
    };
    encoder.to_string()
}

/// Whether `ffmpeg -encoders` output lists `encoder`
pub fn encoder_listed(listing: &str, encoder: &str) -> bool {
    listing.lines().any(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(flags), Some(name)) => flags.len() == 6 && name == encoder,
            _ => false,
        }
    })
}

/// Output pixel format to request from `encoder`, `None` to let ffmpeg choose
///
/// 4:2:0 chroma needs even dimensions. The mjpeg encoder only takes
/// full-range YUV.
pub fn output_pix_fmt(encoder: &str, width: u32, height: u32) -> Option<&'static str> {
    if width % 2 != 0 || height % 2 != 0 {
        return None;
    }
    match encoder {
        "mjpeg" => Some("yuvj420p"),
        _ => Some("yuv420p"),
    }
}

/// Error for an encoder that died, given how many frames it had accepted
///
/// ffmpeg only opens its muxer and encoder once the first frame arrives, so
/// a failure before any frame got through is an open failure.
fn encoder_failure(path: &Path, codec: &str, frames_written: u64, reason: String) -> VideoError {
    if frames_written == 0 {
        VideoError::EncoderOpenFailed {
            path: path.display().to_string(),
            codec: codec.to_string(),
            reason,
        }
    } else {
        VideoError::EncodingFailed {
            reason: format!("after {} frames: {}", frames_written, reason),
        }
    }
}

fn encoder_available(encoder: &str) -> Result<bool> {
    let output = Command::new(FFMPEG)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()?;
    Ok(output.status.success() && encoder_listed(&String::from_utf8_lossy(&output.stdout), encoder))
}

/// Encoder backed by an `ffmpeg` child process reading raw rgb24 frames
pub struct FfmpegSink {
    path: PathBuf,
    codec: String,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: StderrCollector,
    frames_written: u64,
    finished: bool,
}

impl FfmpegSink {
    /// Start an encoder writing `width` x `height` frames at `fps` to `path`
    pub fn open<P: AsRef<Path>>(path: P, codec: &str, width: u32, height: u32, fps: f64) -> Result<Self> {
        let path = path.as_ref();
        let encoder = encoder_for_codec(codec);
        let open_failed = |reason: String| VideoError::EncoderOpenFailed {
            path: path.display().to_string(),
            codec: codec.to_string(),
            reason,
        };

        if width == 0 || height == 0 {
            return Err(open_failed(format!("invalid frame size {}x{}", width, height)).into());
        }

        if !encoder_available(&encoder)? {
            return Err(open_failed(format!("encoder '{}' is not available in ffmpeg", encoder)).into());
        }

        let mut cmd = Command::new(FFMPEG);
        cmd.args(["-hide_banner", "-nostdin", "-v", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", format!("{}x{}", width, height).as_str()])
            .args(["-r", fps.to_string().as_str()])
            .args(["-i", "pipe:0", "-an", "-c:v", encoder.as_str()]);

        if let Some(pix_fmt) = output_pix_fmt(&encoder, width, height) {
            cmd.args(["-pix_fmt", pix_fmt]);
        }
        if encoder == "mpeg4" {
            cmd.args(["-tag:v", "mp4v"]);
        }

        cmd.arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        ffmpeg::log_command(&cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| open_failed(format!("failed to spawn ffmpeg: {}", e)))?;

        let stdin = child.stdin.take().map(BufWriter::new);
        let stderr = StderrCollector::spawn(child.stderr.take());

        info!("Encoder open: {} ({} via {}, {}x{} @ {:.3} fps)",
              path.display(), codec, encoder, width, height, fps);

        Ok(Self {
            path: path.to_path_buf(),
            codec: codec.to_string(),
            width,
            height,
            child,
            stdin,
            stderr,
            frames_written: 0,
            finished: false,
        })
    }

    /// Flush, close the pipe and wait for ffmpeg to finalise the container
    pub fn finish(mut self) -> Result<()> {
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };

        let status = self.child.wait()?;
        self.finished = true;
        let stderr = self.stderr.collect();

        if !status.success() {
            let reason = format!("ffmpeg exited with {}: {}", status, stderr);
            return Err(encoder_failure(&self.path, &self.codec, self.frames_written, reason).into());
        }
        if let Err(e) = flushed {
            let reason = format!("failed to flush frames to ffmpeg: {}", e);
            return Err(encoder_failure(&self.path, &self.codec, self.frames_written, reason).into());
        }

        debug!("Encoder for {} finished after {} frames", self.path.display(), self.frames_written);
        Ok(())
    }

    /// Tear the encoder down after a failed write and explain why
    fn abort(&mut self, cause: std::io::Error) -> VideoError {
        self.stdin = None;
        ffmpeg::terminate(&mut self.child);
        self.finished = true;
        let stderr = self.stderr.collect();

        let reason = if stderr.is_empty() {
            format!("write to ffmpeg failed: {}", cause)
        } else {
            format!("write to ffmpeg failed: {}: {}", cause, stderr)
        };
        encoder_failure(&self.path, &self.codec, self.frames_written, reason)
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(VideoError::InvalidParameters {
                details: format!(
                    "frame is {}x{}, encoder expects {}x{}",
                    frame.width(), frame.height(), self.width, self.height
                ),
            }.into());
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VideoError::EncodingFailed {
                reason: "encoder already closed".to_string(),
            }.into());
        };

        if let Err(e) = stdin.write_all(frame.as_rgb_bytes()) {
            return Err(self.abort(e).into());
        }
        self.frames_written += 1;
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if !self.finished {
            self.stdin = None;
            ffmpeg::terminate(&mut self.child);
        }
    }
}

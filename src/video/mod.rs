//! # Video I/O Module
//!
//! Frame type, resampling, and the ffmpeg-backed decoder and encoder.

pub mod types;
pub mod resize;
pub mod source;
pub mod sink;

mod ffmpeg;

pub use types::{Frame, PadColor, VideoProperties};
pub use resize::resize_area;
pub use source::{FfmpegSource, FrameSource, RawFrameReader};
pub use sink::{encoder_for_codec, FfmpegSink, FrameSink};

pub(crate) use ffmpeg::{ensure_tool, FFMPEG, FFPROBE};

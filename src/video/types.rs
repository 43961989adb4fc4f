use std::fmt;
use std::str::FromStr;

use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Represents a single video frame
///
/// A thin wrapper around an RGB8 image buffer. Decoders produce these,
/// the collage loop resizes and stacks them, encoders consume them.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: PadColor) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color.0));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    ///
    /// Returns `None` when `data` is not exactly `width * height * 3` bytes.
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Number of bytes one frame of this size occupies in rgb24
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Solid color used for separator strips and for filler frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PadColor(pub [u8; 3]);

impl PadColor {
    pub const BLACK: PadColor = PadColor([0, 0, 0]);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }
}

impl fmt::Display for PadColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl FromStr for PadColor {
    type Err = ConfigError;

    /// Accepts `#RRGGBB`, `RRGGBB` or `R,G,B`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ConfigError::InvalidValue {
            key: "layout.pad_color".to_string(),
            value: s.to_string(),
        };

        if s.contains(',') {
            let channels: Vec<u8> = s
                .split(',')
                .map(|part| part.trim().parse::<u8>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| invalid())?;
            return match channels.as_slice() {
                [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
                _ => Err(invalid()),
            };
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Properties a decoder reports when it is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    /// Native frame rate; 0.0 when the container does not report one
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Reported frame count, informational only (may be an estimate)
    pub frame_count: i64,
}

/// Parse an ffmpeg style rational (`30000/1001`, `25`) into frames per second
///
/// Unknown rates (`0/0`, garbage) come back as 0.0.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let rate = rate.trim();
    let value = match rate.split_once('/') {
        Some((num, den)) => match (num.parse::<f64>(), den.parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => num / den,
            _ => 0.0,
        },
        None => rate.parse::<f64>().unwrap_or(0.0),
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub(crate) fn frame_from_bytes(width: u32, height: u32, data: Vec<u8>) -> Result<Frame> {
    let len = data.len();
    Frame::from_rgb_bytes(width, height, data).ok_or_else(|| {
        crate::error::VideoError::DecodingFailed {
            reason: format!("{} bytes do not make a {}x{} rgb24 frame", len, width, height),
        }
        .into()
    })
}

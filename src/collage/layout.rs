//! Output geometry and frame-rate selection.
//!
//! Everything here is decided once, before the encoder is opened: the
//! encoder needs its frame size and rate up front and cannot change them.

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, VideoError};
use crate::video::{PadColor, VideoProperties};

/// Frame rate used when neither a forced rate nor a usable source rate exists
pub const DEFAULT_FPS: f64 = 30.0;

/// Forced rate if given, else the slowest source, else [`DEFAULT_FPS`].
///
/// Sources that do not know their rate report 0 (or less), which also lands
/// on the default.
pub fn select_fps(force_fps: Option<f64>, source_fps: [f64; 3]) -> f64 {
    let fps = force_fps.unwrap_or_else(|| source_fps.into_iter().fold(f64::INFINITY, f64::min));
    if fps.is_nan() || fps <= 0.0 || fps.is_infinite() {
        warn!("No usable frame rate (got {}), falling back to {} fps", fps, DEFAULT_FPS);
        DEFAULT_FPS
    } else {
        fps
    }
}

/// Requested height if given, else the shortest source; never below 1
pub fn select_target_height(target_height: Option<u32>, source_heights: [u32; 3]) -> u32 {
    target_height
        .unwrap_or_else(|| source_heights.into_iter().min().unwrap_or(1))
        .max(1)
}

/// Width that keeps `width:height` when scaled to `target_height`
///
/// Halfway cases round to even. The result is at least 1 so every panel can
/// be encoded, and saturates at `u32::MAX`.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    let aspect = width as f64 / height.max(1) as f64;
    let scaled = (aspect * target_height as f64).round_ties_even();
    (scaled as u32).max(1)
}

/// Reject frame sizes ffmpeg refuses to allocate
///
/// Same bound as libavutil's `av_image_check_size`:
/// `(w + 128) * (h + 128)` must stay below `i32::MAX / 8`.
pub fn check_frame_size(width: u32, height: u32) -> Result<()> {
    let area = (width as u64 + 128) * (height as u64 + 128);
    if area >= (i32::MAX / 8) as u64 {
        return Err(VideoError::InvalidParameters {
            details: format!("output frame {}x{} is too large to encode", width, height),
        }
        .into());
    }
    Ok(())
}

/// Size of one panel in the composite row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSize {
    pub width: u32,
    pub height: u32,
}

/// Geometry and rate of the output video, fixed for the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct CollagePlan {
    pub panels: [PanelSize; 3],
    pub pad_px: u32,
    pub pad_color: PadColor,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl CollagePlan {
    /// Work out panel sizes, output size and output rate for three sources
    ///
    /// Fails with [`VideoError::InvalidParameters`] when the requested height
    /// or padding makes a frame too large to encode.
    pub fn new(sources: &[VideoProperties; 3], config: &Config) -> Result<Self> {
        let fps = select_fps(config.output.force_fps, sources.map(|s| s.fps));
        let height = select_target_height(config.layout.target_height, sources.map(|s| s.height));

        let panels = sources.map(|s| PanelSize {
            width: scaled_width(s.width, s.height, height),
            height,
        });

        let pad_px = config.layout.pad_px;
        // Separators sit between panels only, never on the outer edges
        let width = panels
            .iter()
            .try_fold(0u32, |total, p| total.checked_add(p.width))
            .and_then(|total| pad_px.checked_mul(2).and_then(|pads| total.checked_add(pads)))
            .ok_or_else(|| VideoError::InvalidParameters {
                details: format!(
                    "output width overflows: panels {:?} with {}px padding",
                    panels.map(|p| p.width), pad_px
                ),
            })?;
        check_frame_size(width, height)?;

        let plan = Self {
            panels,
            pad_px,
            pad_color: config.layout.pad_color,
            fps,
            width,
            height,
        };
        debug!("Collage plan: {:?}", plan);
        Ok(plan)
    }

    /// Left edge of each panel inside the composite row
    pub fn panel_offsets(&self) -> [u32; 3] {
        let first = 0;
        let second = first + self.panels[0].width + self.pad_px;
        let third = second + self.panels[1].width + self.pad_px;
        [first, second, third]
    }
}

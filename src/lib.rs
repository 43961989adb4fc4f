//! # Video Collage
//!
//! Stitch three videos into one side-by-side comparison video.
//!
//! Each input is scaled to a common height (keeping its aspect ratio), the
//! three panels are laid out left to right with optional separator strips,
//! and the result is encoded at a single frame rate. Inputs that end early
//! are shown as solid filler panels until the longest input finishes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use video_collage::{CollageBuilder, Config, PadColor};
//!
//! # fn main() -> video_collage::Result<()> {
//! let mut config = Config::default();
//! config.layout.pad_px = 12;
//! config.layout.pad_color = PadColor::BLACK;
//!
//! let summary = CollageBuilder::new(config).build(
//!     ["render_a.mp4", "render_b.mp4", "render_c.mp4"],
//!     "comparison.mp4",
//! )?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frame type, area resampling, ffmpeg decoder and encoder
//! - [`collage`] - Output planning and the frame loop
//! - [`config`] - Configuration management
//!
//! Decoding and encoding go through the `ffmpeg` and `ffprobe` executables,
//! which must be on `PATH`.

pub mod collage;
pub mod config;
pub mod error;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    collage::{CollageBuilder, CollagePlan, CollageSummary},
    config::Config,
    error::{CollageError, Result},
    video::{Frame, PadColor},
};

//! # Collage Module
//!
//! Plans the output geometry and drives the decode, stack, encode loop.

pub mod builder;
pub mod layout;

pub use builder::{compose_row, render, CollageBuilder, CollageSummary};
pub use layout::{CollagePlan, PanelSize, DEFAULT_FPS};

//! Renderers built on the graphics device.
//!
//! - `forward`: single-pass forward shading of a `Scene`

pub mod forward;

pub use forward::{ForwardRenderer, FrameReport, forward_layout};

//! Ember engine crate.
//!
//! This crate owns the graphics device abstraction, the forward renderer and the
//! platform runtime pieces used by applications built on top of it.

pub mod error;
pub mod gfx;

pub mod app;
pub mod assets;
pub mod config;
pub mod input;
pub mod logging;
pub mod render;
pub mod scene;
pub mod time;
pub mod window;

pub use error::{GraphicsError, Result};

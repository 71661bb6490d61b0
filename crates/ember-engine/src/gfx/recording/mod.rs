//! Headless backend.
//!
//! `RecordingDevice` implements the full device contract without a GPU. Every
//! command that reaches it is appended to an inspectable log, which makes it the
//! backend of choice for tests and for running scenes without a window.

mod commands;
mod device;
mod resources;

pub use commands::{Command, CommandLog, DrawRecord};
pub use device::RecordingDevice;
pub use resources::{
    RecordingBuffer, RecordingCanvas, RecordingCompute, RecordingCubemap, RecordingFramebuffer,
    RecordingProgram, RecordingTexture,
};

//! Application contract.
//!
//! This module defines the interface between the runtime (platform loop) and
//! the application built on the engine. The runtime owns the window and the
//! graphics device; the application owns its scene, renderer and assets and
//! receives borrowed handles through the per-callback contexts.

use winit::event::WindowEvent;
use winit::window::Window;

use crate::gfx::{Canvas, GraphicsDevice};
use crate::gfx::wgpu_backend::WgpuDevice;
use crate::input::{InputFrame, InputState};
use crate::time::FrameTime;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Handles available while the application sets itself up.
pub struct StartCtx<'a> {
    pub window: &'a Window,
    pub device: &'a mut WgpuDevice,
}

impl StartCtx<'_> {
    /// Canvas aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.device.canvas().aspect_ratio()
    }
}

/// Per-frame context passed to [`App::on_frame`].
///
/// The frame is already open on `device` when the callback runs; the runtime
/// closes and presents it after the callback returns.
pub struct FrameCtx<'a> {
    pub window: &'a Window,
    pub device: &'a mut WgpuDevice,
    pub input: &'a InputState,
    pub input_frame: &'a InputFrame,
    pub time: FrameTime,
}

impl FrameCtx<'_> {
    /// Device description, as logged at startup.
    pub fn device_info(&self) -> String {
        self.device.device_info()
    }
}

/// Application contract implemented by higher layers.
pub trait App {
    /// Called once, after the window and graphics device exist. An error aborts
    /// the runtime before the first frame.
    fn on_start(&mut self, ctx: &mut StartCtx<'_>) -> anyhow::Result<()>;

    /// Called for every window event, before the runtime handles it.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called after the surface was resized, in physical pixels.
    fn on_resize(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }

    /// Called once per rendered frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;
}

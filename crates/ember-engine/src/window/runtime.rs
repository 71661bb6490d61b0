use std::sync::Arc;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::app::{App, AppControl, FrameCtx, StartCtx};
use crate::error::GraphicsError;
use crate::gfx::wgpu_backend::{GpuInit, WgpuDevice};
use crate::gfx::{Canvas, GraphicsDevice};
use crate::input::platform::{translate_device_event, translate_window_event};
use crate::input::{InputFrame, InputState};
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Lock (or confine) and hide the cursor while the window has focus.
    pub grab_cursor: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "ember".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            grab_cursor: true,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window, creates the graphics device and drives `app` until
    /// it exits or the window is closed.
    ///
    /// A failure while starting up (window, device or `App::on_start`) is
    /// returned once the event loop has shut down.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.startup_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Window and everything tied to its lifetime.
struct Running {
    window: Arc<Window>,
    device: WgpuDevice,
    input_state: InputState,
    input_frame: InputFrame,
    clock: FrameClock,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    running: Option<Running>,
    startup_error: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            running: None,
            startup_error: None,
            exit_requested: false,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let mut device = WgpuDevice::create(window.clone(), &self.gpu_init, &self.config.title)
            .context("graphics device initialization failed")?;

        {
            let mut ctx = StartCtx {
                window: &window,
                device: &mut device,
            };
            self.app
                .on_start(&mut ctx)
                .context("application failed to start")?;
        }

        if self.config.grab_cursor {
            grab_cursor(&window, true);
        }

        let size = window.inner_size();
        log::info!(
            "window `{}` ready ({}x{})",
            self.config.title,
            size.width,
            size.height
        );

        window.request_redraw();
        self.running = Some(Running {
            window,
            device,
            input_state: InputState::default(),
            input_frame: InputFrame::default(),
            clock: FrameClock::default(),
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let Some(run) = self.running.as_mut() else {
            return;
        };
        run.device.resize(width, height);
        if width > 0 && height > 0 {
            self.app.on_resize(width, height);
        }
        run.window.request_redraw();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(run) = self.running.as_mut() else {
            return;
        };

        match frame_start(run.device.begin_frame(), &mut run.input_frame) {
            FrameStart::Render => {}
            FrameStart::Skip => return,
            FrameStart::Exit => {
                self.request_exit(event_loop);
                return;
            }
        }

        let time = run.clock.tick();
        let control = {
            let mut ctx = FrameCtx {
                window: &run.window,
                device: &mut run.device,
                input: &run.input_state,
                input_frame: &run.input_frame,
                time,
            };
            self.app.on_frame(&mut ctx)
        };

        if let Err(err) = run.device.end_frame() {
            log::error!("failed to submit frame {}: {err}", time.frame_index);
        }

        // Per-frame deltas are consumed by now.
        run.input_frame.clear();

        if control == AppControl::Exit || run.device.canvas().should_close() {
            self.request_exit(event_loop);
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FrameStart {
    Render,
    Skip,
    Exit,
}

/// Classifies the outcome of `begin_frame`. A skipped frame drops the input
/// gathered for it so deltas do not pile up while nothing is drawn.
fn frame_start(
    begun: std::result::Result<(), GraphicsError>,
    input_frame: &mut InputFrame,
) -> FrameStart {
    match begun {
        Ok(()) => FrameStart::Render,
        Err(GraphicsError::Surface {
            fatal: true,
            message,
        }) => {
            log::error!("surface lost for good: {message}");
            FrameStart::Exit
        }
        Err(err) => {
            log::debug!("frame skipped: {err}");
            input_frame.clear();
            FrameStart::Skip
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.exit_requested {
            return;
        }

        if let Err(err) = self.start(event_loop) {
            log::error!("startup failed: {err:#}");
            self.startup_error = Some(err);
            self.request_exit(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw.
        if let Some(run) = &self.running {
            run.window.request_redraw();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        let Some(run) = self.running.as_mut() else {
            return;
        };
        if !run.window.has_focus() {
            return;
        }
        if let Some(ev) = translate_device_event(&event) {
            run.input_state.apply_event(&mut run.input_frame, ev);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some(run) = self.running.as_mut() else {
            return;
        };
        if run.window.id() != window_id {
            return;
        }

        if let Some(ev) = translate_window_event(&event, run.window.scale_factor()) {
            run.input_state.apply_event(&mut run.input_frame, ev);
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                run.device.canvas_mut().request_close();
                self.request_exit(event_loop);
            }

            WindowEvent::Focused(focused) => {
                if self.config.grab_cursor {
                    grab_cursor(&run.window, *focused);
                }
            }

            WindowEvent::Resized(new_size) => {
                self.resize(new_size.width, new_size.height);
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = run.window.inner_size();
                self.resize(new_size.width, new_size.height);
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}

fn grab_cursor(window: &Window, grab: bool) {
    if grab {
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        if let Err(err) = grabbed {
            log::warn!("cursor grab unavailable: {err}");
        }
        window.set_cursor_visible(false);
    } else {
        if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
            log::debug!("cursor release failed: {err}");
        }
        window.set_cursor_visible(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;

    #[test]
    fn default_config_grabs_cursor() {
        let config = RuntimeConfig::default();
        assert_eq!(config.title, "ember");
        assert_eq!(config.initial_size, LogicalSize::new(1280.0, 720.0));
        assert!(config.grab_cursor);
    }

    #[test]
    fn skipped_frames_drop_their_input() {
        let mut input = InputFrame::default();
        input.mouse_delta = glam::Vec2::new(12.0, -4.0);
        input.keys_pressed.insert(Key::W);

        let outdated = GraphicsError::Surface {
            fatal: false,
            message: "outdated".to_owned(),
        };
        assert_eq!(frame_start(Err(outdated), &mut input), FrameStart::Skip);
        assert_eq!(input.mouse_delta, glam::Vec2::ZERO);
        assert!(!input.pressed(Key::W));
    }

    #[test]
    fn rendered_frames_keep_input_and_fatal_errors_exit() {
        let mut input = InputFrame::default();
        input.mouse_delta = glam::Vec2::ONE;
        assert_eq!(frame_start(Ok(()), &mut input), FrameStart::Render);
        assert_eq!(input.mouse_delta, glam::Vec2::ONE);

        let lost = GraphicsError::Surface {
            fatal: true,
            message: "out of memory".to_owned(),
        };
        assert_eq!(frame_start(Err(lost), &mut input), FrameStart::Exit);
    }
}

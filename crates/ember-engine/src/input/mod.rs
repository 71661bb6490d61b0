//! Input subsystem.
//!
//! The public API does not expose winit types. The runtime translates platform
//! events into `InputEvent`s (see `platform`), `InputState` folds them into
//! held keys and per-frame deltas, and `AxisBindings` turns held keys into the
//! movement axes the camera consumes.

mod bindings;
mod frame;
pub(crate) mod platform;
mod state;
mod types;

pub use bindings::{Axis, AxisBinding, AxisBindings};
pub use frame::InputFrame;
pub use state::InputState;
pub use types::{InputEvent, Key, KeyState, Modifiers, MouseButton, MouseButtonState};

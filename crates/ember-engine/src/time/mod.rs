//! Time subsystem.
//!
//! Frame timing for the runtime loop plus a small stopwatch for one-off
//! measurements such as asset loading.
//!
//! - one `FrameClock` per render loop; call `tick()` once per presented frame
//! - `Stopwatch` measures a span without touching the frame clock

mod frame_clock;
mod stopwatch;

pub use frame_clock::{FrameClock, FrameTime};
pub use stopwatch::Stopwatch;

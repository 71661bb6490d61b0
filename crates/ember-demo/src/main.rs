//! ember demo: a textured prop over a compute-patterned floor, lit by a point
//! light and a spotlight. WASD/QE move, the mouse looks around, Escape quits.
//!
//! Settings are read from `ember.json` in the working directory, or from the
//! path given as the first argument.

mod demo;
mod pattern;

use anyhow::Result;

use ember_engine::config::EngineConfig;
use ember_engine::logging::init_logging;
use ember_engine::window::Runtime;

use crate::demo::Demo;

const DEFAULT_CONFIG: &str = "ember.json";

fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_owned());
    let config = EngineConfig::load_or_default(&path);

    init_logging(config.logging_config());
    log::info!("starting ember demo (config: {path})");

    let runtime = config.runtime_config();
    let gpu_init = config.gpu_init();
    Runtime::run(runtime, gpu_init, Demo::new(config))
}

use std::sync::Once;

use log::LevelFilter;

/// Crates that are noisy at `info` and only matter when something breaks.
const QUIET_TARGETS: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

static INIT: Once = Once::new();

/// Logger configuration.
///
/// Filter precedence: `filter`, then `RUST_LOG`, then `default_level` with the
/// wgpu internals held at `warn`. Filters use the `env_logger` syntax, e.g.
/// `"ember_engine=debug,wgpu_core=warn"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub default_level: LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            default_level: LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    fn builder(&self, env_filter: Option<String>) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        match self.filter.clone().or(env_filter) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(self.default_level);
                for target in QUIET_TARGETS {
                    builder.filter_module(target, LevelFilter::Warn);
                }
            }
        }
        builder.write_style(self.write_style);
        builder
    }
}

/// Installs the global logger. Only the first call has an effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = config.builder(std::env::var("RUST_LOG").ok());
        // A logger installed by a test harness or host app wins.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_beats_environment() {
        let config = LoggingConfig {
            filter: Some("debug".to_owned()),
            ..LoggingConfig::default()
        };
        let logger = config.builder(Some("error".to_owned())).build();
        assert_eq!(logger.filter(), LevelFilter::Debug);
    }

    #[test]
    fn environment_beats_default_level() {
        let logger = LoggingConfig::default().builder(Some("trace".to_owned())).build();
        assert_eq!(logger.filter(), LevelFilter::Trace);
    }

    #[test]
    fn default_level_applies_without_filters() {
        let config = LoggingConfig {
            default_level: LevelFilter::Warn,
            ..LoggingConfig::default()
        };
        assert_eq!(config.builder(None).build().filter(), LevelFilter::Warn);
    }
}

//! Logging setup.
//!
//! Initializes `tracing` with an `EnvFilter` driven by `RUST_LOG`, falling
//! back to a level derived from the CLI's `--verbose`/`--silent` flags.
//! There is no distributed trace consumer for an offline CLI pipeline, so
//! unlike some sibling tools in this codebase this stays console-only.

use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

pub fn init_logging(config: LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
    }
}

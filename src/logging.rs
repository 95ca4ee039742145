use std::io::Write;

use log::LevelFilter;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application (default: INFO)
    pub level: LevelFilter,
    /// Let `RUST_LOG` override `level` when it is set (default: true)
    pub respect_env: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            respect_env: true,
        }
    }
}

/// Install the global logger. Returns false if one was already installed,
/// which makes repeated calls from tests harmless.
pub fn init_logging(config: LoggingConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, config.level);

    if config.respect_env {
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
    }

    builder.try_init().is_ok()
}

/// Parse a level name as accepted on the command line.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.parse().ok()
}

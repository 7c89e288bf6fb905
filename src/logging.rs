use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level; output goes to `config.file` when set, stderr otherwise.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level '{}'", config.level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match (&config.file, config.format) {
        (Some(path), format) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let builder = builder.with_writer(Mutex::new(file)).with_ansi(false);
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Pretty => builder.try_init(),
            }
        }
        (None, LogFormat::Json) => builder.with_writer(std::io::stderr).json().try_init(),
        (None, LogFormat::Pretty) => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("installing tracing subscriber: {}", e))
}

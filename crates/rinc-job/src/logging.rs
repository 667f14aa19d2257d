use crate::config::{LogConfig, LogFormat};
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse_filter(level),
    }
}

fn parse_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}

/// Installs the global `tracing` subscriber.
pub fn init(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(&config.level)?);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_levels_and_directives() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("rinc_job=debug,kube=warn").is_ok());
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_filter("rinc_job=chatty").is_err());
    }
}

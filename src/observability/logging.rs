//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and to tower-http.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("gateway_manager={level},gateway_cli={level},tower_http={level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_names_crate() {
        let filter = default_filter("debug").to_string();
        assert!(filter.contains("gateway_manager=debug"));
        assert!(filter.contains("tower_http=debug"));
    }
}

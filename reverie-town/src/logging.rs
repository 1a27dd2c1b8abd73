//! Tracing subscriber setup.

use reverie_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level. Calling it again is harmless.
pub fn init_tracing(config: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_logs {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        let config = GeneralConfig::default();
        init_tracing(&config);
        init_tracing(&config);
        tracing::info!("still logging");
    }
}

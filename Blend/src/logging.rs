//! Log subscriber setup
//!
//! Logs go to stderr so that stdout only carries results. `RUST_LOG` takes
//! precedence over `host.logger.min_level`.

use blendconfig::Config;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config
            .get_log_min_level()
            .map(|l| level_from_config(&l))
            .unwrap_or(LevelFilter::INFO);
        EnvFilter::default().add_directive(level.into())
    });

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Unknown values fall back to INFO
fn level_from_config(value: &str) -> LevelFilter {
    value.trim().parse().unwrap_or(LevelFilter::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_config() {
        assert_eq!(level_from_config("debug"), LevelFilter::DEBUG);
        assert_eq!(level_from_config("WARN"), LevelFilter::WARN);
        assert_eq!(level_from_config(" trace "), LevelFilter::TRACE);
        assert_eq!(level_from_config("off"), LevelFilter::OFF);
        assert_eq!(level_from_config("chatty"), LevelFilter::INFO);
    }
}

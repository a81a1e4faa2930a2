//! tracing subscriber setup

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` when a subscriber
/// was already installed, which is not an error.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let _ = init_logging("debug");
        assert!(!init_logging("debug"));
    }

    #[test]
    fn test_bad_filter_falls_back() {
        // must not panic on a malformed directive
        let _ = init_logging("[[not a filter");
    }
}

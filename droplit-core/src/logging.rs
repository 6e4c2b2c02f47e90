//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

/// Installs a stderr fmt subscriber.
///
/// `RUST_LOG` takes precedence, then `filter`, then `info`. Safe to call more
/// than once; returns whether this call installed the subscriber.
pub fn init_logging(filter: Option<&str>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_logging(Some("debug"));
        assert!(!init_logging(Some("warn")));
    }

    #[test]
    fn bad_filter_does_not_panic() {
        init_logging(Some("[[not a filter"));
    }
}

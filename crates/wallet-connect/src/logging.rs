use tracing_subscriber::{fmt, EnvFilter};

/// Env var switching log output to JSON lines when set to `1`.
pub const LOG_JSON_ENV: &str = "WALLET_CONNECT_LOG_JSON";

/// Installs the global subscriber. `RUST_LOG` filters (default `info`); output
/// goes to stderr. Calling it again is a no-op.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var(LOG_JSON_ENV)
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

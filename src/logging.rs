//! Logging setup: `RUST_LOG` filter (default `info`), pretty or JSON on stderr.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_JSON_ENV: &str = "ALPHA_DASHBOARD_LOG_JSON";

pub fn init_logging() {
    let json = std::env::var(LOG_JSON_ENV).map(|value| value == "1").unwrap_or(false);
    init_logging_with(json);
}

/// `json` forces JSON output regardless of the environment.
pub fn init_logging_with(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

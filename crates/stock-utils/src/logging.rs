//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Level used when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the tracing subscriber.
///
/// Filter precedence: `RUST_LOG`, then `LOG_LEVEL` (a bare level such as
/// `DEBUG`), then [`DEFAULT_LEVEL`].
pub fn init_tracing() {
    let log_level = std::env::var("LOG_LEVEL").ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(fallback_directive(log_level.as_deref()))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn fallback_directive(log_level: Option<&str>) -> String {
    match log_level.map(str::trim) {
        Some(level) if !level.is_empty() => level.to_ascii_lowercase(),
        _ => DEFAULT_LEVEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_directive() {
        assert_eq!(fallback_directive(None), "info");
        assert_eq!(fallback_directive(Some("")), "info");
        assert_eq!(fallback_directive(Some("DEBUG")), "debug");
        assert_eq!(fallback_directive(Some(" warn ")), "warn");
    }
}

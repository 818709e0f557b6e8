use tracing_subscriber::EnvFilter;

/// Initialize tracing. `RUST_LOG` takes precedence over the configured
/// level; format is `json` (default) or `pretty`.
pub fn init(log_format: &str, log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_format.to_lowercase().as_str() {
        "pretty" | "compact" | "text" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .compact()
                .init();
        }
        other => {
            if other != "json" {
                eprintln!(
                    "WARN: Invalid log format '{}', defaulting to 'json'. Valid options: json, pretty",
                    other
                );
            }
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .json()
                .flatten_event(true)
                .init();
        }
    }

    tracing::debug!(
        log_format = log_format,
        log_level = log_level,
        "Logging system initialized"
    );
}

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. JSON lines by default; `SN_LOG_FORMAT=pretty`
/// switches to human-readable output for local runs. Safe to call more than
/// once: later calls are ignored.
pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let pretty = std::env::var("SN_LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    let installed = if pretty {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(false)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(service = service_name, "logging initialized");
    }
}

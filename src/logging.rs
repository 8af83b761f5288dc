use tracing_subscriber::EnvFilter;

/// Initialize structured logging for an embedding application.
///
/// A `RUST_LOG` environment filter takes precedence over the default.
/// Call once per process; tests and hosts with their own subscriber
/// should skip this.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vkstudio=debug")),
        )
        .init();
}

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub(crate) fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

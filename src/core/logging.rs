//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// Level used when nothing is configured
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Pick the filter directive: `-v` flags win over the configured level
pub fn directive(verbose: u8, configured: Option<&str>) -> String {
    match verbose {
        0 => configured
            .filter(|level| !level.trim().is_empty())
            .unwrap_or(DEFAULT_DIRECTIVE)
            .to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global stderr subscriber
///
/// An unparseable directive falls back to `warn`. Calling this twice is
/// harmless; the second install is ignored.
pub fn init(verbose: u8, configured: Option<&str>) {
    let directive = directive(verbose, configured);
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for structured logging.
///
/// Configured with:
/// - JSON formatting for log aggregation systems
/// - `RUST_LOG`-style filtering, defaulting to `info`
/// - Output to stdout
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber() -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_subscriber_is_idempotent_enough_for_tests() {
        // First call installs, later calls report the conflict; neither
        // panics.
        let _ = init_subscriber();
        let _ = init_subscriber();
    }
}

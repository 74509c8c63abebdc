//! Diagnostic logging to stderr

use crate::config::{LogFormat, Verbosity};
use crate::error::{CliError, CliResult};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise the verbosity default
#[must_use]
pub fn filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()))
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already set
pub fn init(verbosity: Verbosity, format: LogFormat, ansi: bool) -> CliResult<()> {
    let registry = tracing_subscriber::registry().with(filter(verbosity));

    let result = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(verbosity.is_debug())
                    .with_ansi(ansi)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| CliError::logging(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // One global subscriber per process
        let _ = init(Verbosity::Quiet, LogFormat::Text, false);
        let err = init(Verbosity::Quiet, LogFormat::Json, false).unwrap_err();
        assert!(err.to_string().contains("Logging"));
    }
}

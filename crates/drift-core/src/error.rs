//! Simulation error types

use thiserror::Error;

/// Errors surfaced by the simulation engine
///
/// Routers never produce errors; they communicate through
/// [`TransferResult`](crate::connection::TransferResult) codes. Errors exist
/// for configuration problems (fatal before tick 0), external event parse
/// failures, and invariant violations that make results meaningless.
#[derive(Debug, Error)]
pub enum SimError {
    /// Missing, malformed or inconsistent configuration value
    #[error("configuration error for '{key}': {reason}")]
    Config { key: String, reason: String },

    /// Malformed line in an external events trace
    #[error("{path}:{line}: invalid external event: {reason}")]
    EventParse {
        path: String,
        line: usize,
        reason: String,
    },

    /// A simulation invariant was violated; the run must halt
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// I/O failure (settings files, traces, report output)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Create a configuration error naming the offending key
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_key() {
        let err = SimError::config("Scenario.endTime", "missing required value");
        let text = err.to_string();
        assert!(text.contains("Scenario.endTime"));
        assert!(text.contains("missing required value"));
    }

    #[test]
    fn test_event_parse_error_has_line() {
        let err = SimError::EventParse {
            path: "trace.txt".into(),
            line: 17,
            reason: "unknown action".into(),
        };
        assert!(err.to_string().contains("trace.txt:17"));
    }
}

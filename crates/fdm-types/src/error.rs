// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all kernel failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FdmError {
    /// Caller broke an input contract (mismatched lengths or rates,
    /// empty arrays, incompatible blend inputs, missing formula input).
    #[error("contract violation: {0}")]
    Contract(String),

    /// Two timebases cannot be aligned (unsupported rate, ratio/offset
    /// combination, timing mismatch, non-integral output length).
    #[error("alignment error: {0}")]
    Alignment(String),

    /// Data too degraded for the requested operation.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Node registry or dependency graph is malformed.
    #[error("graph error: {0}")]
    Graph(String),

    /// A node's derivation failed.
    #[error("node '{node}' failed: {reason}")]
    Derive { node: String, reason: String },
}

pub type FdmResult<T> = Result<T, FdmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = FdmError::Alignment("frequency 3 Hz not supported".into());
        assert_eq!(err.to_string(), "alignment error: frequency 3 Hz not supported");

        let err = FdmError::Derive {
            node: "Airspeed Minus V2".into(),
            reason: "missing input".into(),
        };
        assert_eq!(err.to_string(), "node 'Airspeed Minus V2' failed: missing input");
    }
}

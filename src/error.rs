//! Error types for graph loading, model building and the oracle boundary.

use thiserror::Error;

/// Failures reported by a relaxation or branch-and-bound oracle.
///
/// `Fatal` aborts the running phase. `ValueUnavailable` is the recoverable
/// case: callers that read values treat the variable as `0.0`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// The solver cannot continue.
    #[error("oracle failure: {0}")]
    Fatal(String),

    /// No value is available for the edge variable `(i, j)`.
    #[error("value unavailable for edge ({0}, {1})")]
    ValueUnavailable(usize, usize),

    /// The model has no feasible point.
    #[error("model is infeasible")]
    Infeasible,

    /// A removal referenced a handle the model does not own.
    #[error("unknown model handle {0}")]
    UnknownHandle(usize),
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("self loop on vertex {0}")]
    SelfLoop(usize),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_error_converts() {
        let err: Error = OracleError::Infeasible.into();
        assert!(matches!(err, Error::Oracle(OracleError::Infeasible)));
        assert_eq!(err.to_string(), "model is infeasible");
    }

    #[test]
    fn test_parse_error_message() {
        let err = Error::Parse {
            line: 3,
            message: "missing weight".to_string(),
        };
        assert_eq!(err.to_string(), "parse error on line 3: missing weight");
    }
}

//! Error types.
//!
//! Contract violations (mismatched widths, reading a non-existent array,
//! binding an array twice) panic. The enums here cover failures a caller can
//! reasonably handle: an external solver giving up, malformed persisted
//! assignments, and a solver answer that does not satisfy its own query.

use thiserror::Error;

/// Failures reported by a [`Solver`][crate::solver::Solver].
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver timed out")]
    Timeout,

    #[error("solver crashed: {0}")]
    Crash(String),

    #[error("solver returned a malformed answer: {0}")]
    Malformed(String),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// A model that does not satisfy the query it was computed for.
#[derive(Debug, Error)]
#[error("assignment does not satisfy {expr}\n{assignment}")]
pub struct ConsistencyError {
    /// The offending constraint, in textual form.
    pub expr: String,
    /// The model, one array per line.
    pub assignment: String,
}

/// Failures while reading or writing persisted assignments.
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("binding for '{name}' is truncated: expected {expected} bytes, found {found}")]
    Truncated {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate binding for '{0}'")]
    DuplicateName(String),

    #[error("unknown array '{0}'")]
    UnknownArray(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = AssignmentError::Truncated {
            name: "x".to_string(),
            expected: 4,
            found: 2,
        };
        assert_eq!(
            e.to_string(),
            "binding for 'x' is truncated: expected 4 bytes, found 2"
        );
        let e = AssignmentError::Parse {
            line: 3,
            reason: "missing length".to_string(),
        };
        assert_eq!(e.to_string(), "line 3: missing length");
    }

    #[test]
    fn test_consistency_converts() {
        let c = ConsistencyError {
            expr: "(ult (w8 1) x)".to_string(),
            assignment: "x = [0]".to_string(),
        };
        let e: SolverError = c.into();
        assert!(matches!(e, SolverError::Consistency(_)));
        assert!(e.to_string().starts_with("assignment does not satisfy (ult (w8 1) x)"));
    }
}

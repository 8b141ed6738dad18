//! Error types for MATILDA

use std::fmt;
use thiserror::Error;

/// Failure class of a database query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Per-statement timeout tripped
    Timeout,
    /// Driver-level I/O failure
    Driver,
    /// Schema mismatch (missing table/column)
    Schema,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::Timeout => write!(f, "timeout"),
            QueryErrorKind::Driver => write!(f, "driver"),
            QueryErrorKind::Schema => write!(f, "schema"),
        }
    }
}

/// What tripped the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Wall-clock budget exhausted
    Timeout,
    /// Resident memory exceeded the configured ceiling
    Memory,
    /// Too many consecutive query timeouts
    QueryTimeouts,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Timeout => write!(f, "timeout"),
            CancelReason::Memory => write!(f, "memory"),
            CancelReason::QueryTimeouts => write!(f, "query timeouts"),
        }
    }
}

/// Main error type for MATILDA operations
#[derive(Error, Debug)]
pub enum MatildaError {
    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog introspection failed
    #[error("Schema error: {0}")]
    Schema(String),

    /// A database query failed
    #[error("Query error ({kind}): {context}")]
    Query {
        /// Failure class
        kind: QueryErrorKind,
        /// Offending SQL text or entity
        context: String,
    },

    /// Discovery was cancelled by the monitor
    #[error("Discovery cancelled ({0})")]
    Cancelled(CancelReason),

    /// Canonicalization or fingerprint defect
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MatildaError {
    /// Shorthand for a query error with context
    pub fn query(kind: QueryErrorKind, context: impl Into<String>) -> Self {
        MatildaError::Query {
            kind,
            context: context.into(),
        }
    }

    /// Process exit code mandated for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            MatildaError::Cancelled(_) => 2,
            MatildaError::Config(_) => 3,
            MatildaError::Schema(_) => 4,
            MatildaError::Query { .. } => 4,
            MatildaError::Invariant(_) => 4,
            MatildaError::Io(_) => 4,
            MatildaError::Serialization(_) => 4,
        }
    }
}

/// Result type alias for MATILDA operations
pub type Result<T> = std::result::Result<T, MatildaError>;

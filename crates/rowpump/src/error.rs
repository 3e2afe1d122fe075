//! Error types for the transfer library.

use thiserror::Error;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Endpoint URL could not be parsed or its scheme is not supported
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connecting or pinging the database failed
    #[error("Connect failed for {kind}: {message}")]
    ConnectFailed { kind: String, message: String },

    /// A query failed; the SQL is retained with secrets redacted
    #[error("Query failed: {message}\n  SQL: {sql}")]
    QueryFailed { sql: String, message: String },

    /// A query with no text was submitted
    #[error("Empty query")]
    EmptyQuery,

    /// The vendor CLI needed for a bulk path is not on PATH
    #[error("Bulk tool '{0}' not found on PATH")]
    BulkToolMissing(String),

    /// A template lookup by dotted path found nothing
    #[error("Template entry missing: {0}")]
    TemplateMissing(String),

    /// No general type mapping exists for an inferred column type
    #[error("No type mapping defined for '{abstract_type}' for '{vendor}'")]
    UnknownTypeMapping {
        abstract_type: String,
        vendor: String,
    },

    /// IO error (files, pipes, process stdio)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller cancelled the stream or adapter
    #[error("Cancelled by caller")]
    Cancelled,

    /// An external process (psql, mysql, sqlldr) exited with failure.
    /// The argv is redacted before construction.
    #[error("External process failed: {argv}\n  stderr: {stderr}")]
    ExternalProcessFailed { argv: String, stderr: String },

    /// An object-store operation failed
    #[error("Object store {op} failed for '{key}': {message}")]
    ObjectStoreError {
        op: String,
        key: String,
        message: String,
    },

    /// CSV encode/decode error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Template YAML could not be parsed
    #[error("Template parse error: {0}")]
    TemplateParse(#[from] serde_yaml::Error),

    /// Operation attempted in an illegal adapter state
    #[error("Adapter is {state}, cannot {operation}")]
    BadState { state: String, operation: String },
}

impl TransferError {
    /// Wrap a driver error with the offending SQL, redacting `secrets`.
    pub fn query(err: impl std::fmt::Display, sql: &str, secrets: &[String]) -> Self {
        TransferError::QueryFailed {
            sql: crate::redact::redact(sql, secrets),
            message: crate::redact::redact(&err.to_string(), secrets),
        }
    }

    pub fn connect(kind: impl Into<String>, err: impl std::fmt::Display) -> Self {
        TransferError::ConnectFailed {
            kind: kind.into(),
            message: err.to_string(),
        }
    }

    pub fn object_store(
        op: impl Into<String>,
        key: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        TransferError::ObjectStoreError {
            op: op.into(),
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Format error with full details including the source chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_redacts_secrets() {
        let err = TransferError::query(
            "password authentication failed for hunter2",
            "copy t from 's3://b/k' credentials 'aws_secret_access_key=hunter2'",
            &["hunter2".to_string()],
        );
        let text = err.to_string();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("*****"));
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = TransferError::Io(io);
        let text = err.format_detailed();
        assert!(text.starts_with("Error: IO error"));
    }
}

use thiserror::Error;

/// Core error type shared across Rowforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema metadata store is unreachable or returned unusable data.
    #[error("schema introspection failed: {0}")]
    Introspection(String),
    /// A destination store operation failed.
    #[error("destination error: {0}")]
    Destination(String),
    /// The catalog violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A generated row does not conform to its table metadata.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Convenience alias for results returned by Rowforge crates.
pub type Result<T> = std::result::Result<T, Error>;

//! Common error types for Stacks

use thiserror::Error;

/// Common result type for Stacks operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Stacks crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_their_context() {
        let err = Error::Config("no [policy] table".to_string());
        assert_eq!(err.to_string(), "Configuration error: no [policy] table");

        let err = Error::Internal("bad guid".to_string());
        assert_eq!(err.to_string(), "Internal error: bad guid");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io);
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "IO error: gone");
    }
}

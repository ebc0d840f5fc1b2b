//! Crate-level error type
//!
//! Registry and protocol failures are handled where they occur and never
//! leave the server, so the only thing surfaced to callers is a socket or
//! listener failure.

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for relay operations
#[derive(Debug)]
pub enum Error {
    /// Socket or listener failure
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[tokio::test]
    async fn test_bind_failure_is_io() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let server = crate::RelayServer::new(crate::ServerConfig::with_addr(addr));
        let err = server.run().await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
        assert!(err.source().is_some());
    }
}

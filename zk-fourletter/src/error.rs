use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single four-letter-word exchange.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unable to open connection to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Exchange with {addr} did not complete within {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[error("Error sending command to {addr}: {source}")]
    Write {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading response from {addr}: {source}")]
    Read {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A response body that does not have the expected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Unexpected wchs layout: expected {expected} fields, got {actual}")]
    UnexpectedWchsLayout { expected: usize, actual: usize },
}

/// Result type alias for four-letter-word exchanges.
pub type Result<T> = std::result::Result<T, CommandError>;

//! Line-protocol client for four-letter-word exchanges.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::command::FourLetterWord;
use crate::error::{CommandError, Result};

/// Deadline for one complete exchange (connect, write and read).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends four-letter words to a ZooKeeper server.
///
/// Every call opens its own connection and drops it before returning, so a
/// client can be cloned freely and shared between concurrent scrapes.
#[derive(Debug, Clone, Copy)]
pub struct FourLetterClient {
    timeout: Duration,
}

impl FourLetterClient {
    /// Create a client with the given per-exchange deadline.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Send `command` to `addr` and return the full reply.
    ///
    /// The reply is read until the server closes the connection. Lines are
    /// re-joined with a single `\n` after each one. Failures are logged here
    /// and returned to the caller, which treats any error as "unavailable".
    pub async fn send(&self, addr: SocketAddr, command: FourLetterWord) -> Result<String> {
        debug!(%addr, %command, "Connecting to ZooKeeper");

        let outcome = match tokio::time::timeout(self.timeout, exchange(addr, command)).await {
            Ok(result) => result,
            Err(_) => Err(CommandError::Timeout {
                addr,
                timeout: self.timeout,
            }),
        };

        match &outcome {
            Ok(reply) => debug!(%addr, %command, bytes = reply.len(), "Successfully retrieved reply"),
            Err(e) => error!(%addr, %command, error = %e, "Four-letter-word exchange failed"),
        }

        outcome
    }
}

impl Default for FourLetterClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

async fn exchange(addr: SocketAddr, command: FourLetterWord) -> Result<String> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| CommandError::Connect { addr, source })?;

    stream
        .write_all(command.as_str().as_bytes())
        .await
        .map_err(|source| CommandError::Write { addr, source })?;

    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .await
        .map_err(|source| CommandError::Read { addr, source })?;

    Ok(join_lines(&String::from_utf8_lossy(&raw)))
}

fn join_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    for line in text.lines() {
        out.push_str(line);
        out.push('\n');
    }
    out
}

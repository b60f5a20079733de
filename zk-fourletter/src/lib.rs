//! ZooKeeper four-letter-word protocol.
//!
//! This crate talks to a ZooKeeper server over its administrative line
//! protocol and shapes the replies into key/value lines:
//!
//! - [`command`] - The four-letter words (`mntr`, `wchs`, `srst`, `ruok`)
//! - [`client`] - One-shot TCP exchanges with a bounded deadline
//! - [`response`] - Parsing of `mntr` and `wchs` replies
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```ignore
//! use zk_fourletter::{FourLetterClient, FourLetterWord, parse};
//!
//! let client = FourLetterClient::default();
//! let addr = "127.0.0.1:2181".parse()?;
//! let mntr = client.send(addr, FourLetterWord::Mntr).await?;
//! let wchs = client.send(addr, FourLetterWord::Wchs).await.ok();
//! let response = parse(&mntr, wchs.as_deref());
//! ```

pub mod client;
pub mod command;
pub mod error;
pub mod response;

// Re-export commonly used types at the crate root
pub use client::{DEFAULT_TIMEOUT, FourLetterClient};
pub use command::FourLetterWord;
pub use error::{CommandError, ResponseError, Result};
pub use response::{ParsedLine, ParsedResponse, parse, parse_mntr, parse_wchs};

//! The four-letter words understood by a ZooKeeper server.

use std::fmt;
use std::str::FromStr;

/// A short status command sent over a raw connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourLetterWord {
    /// Server statistics as `key<TAB>value` lines.
    Mntr,
    /// Summary of watches on the server.
    Wchs,
    /// Reset server statistics.
    Srst,
    /// Liveness probe, answered with `imok`.
    Ruok,
}

impl FourLetterWord {
    /// All known commands.
    pub fn all() -> &'static [FourLetterWord] {
        &[
            FourLetterWord::Mntr,
            FourLetterWord::Wchs,
            FourLetterWord::Srst,
            FourLetterWord::Ruok,
        ]
    }

    /// The bytes written on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FourLetterWord::Mntr => "mntr",
            FourLetterWord::Wchs => "wchs",
            FourLetterWord::Srst => "srst",
            FourLetterWord::Ruok => "ruok",
        }
    }
}

impl fmt::Display for FourLetterWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FourLetterWord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mntr" => Ok(FourLetterWord::Mntr),
            "wchs" => Ok(FourLetterWord::Wchs),
            "srst" => Ok(FourLetterWord::Srst),
            "ruok" => Ok(FourLetterWord::Ruok),
            other => Err(format!("Unknown four-letter word: {}", other)),
        }
    }
}

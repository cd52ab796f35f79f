//! Board identifiers.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Four-digit board number used to name the CSV logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardId(String);

impl BoardId {
    /// Number of digits in a board number.
    pub const DIGITS: usize = 4;

    /// Parse a board number, ignoring surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.len() == Self::DIGITS && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::InvalidBoard(trimmed.to_string()))
        }
    }

    /// The digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BoardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use crate::error::{Error, Result};
use crate::utils::random_suffix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits after the role prefix
pub const ID_DIGITS: usize = 6;

/// Identity registered on the signaling server: role prefix + digits
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Mint `<prefix><6 zero-padded digits>`. Collisions are left to the
    /// signaling server, which rejects ids already taken.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}{}", prefix, random_suffix()))
    }

    /// Accept an id only if it is `prefix` followed by at least one digit
    pub fn parse(prefix: &str, raw: &str) -> Result<Self> {
        match raw.strip_prefix(prefix) {
            Some(code) if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(Error::Protocol(format!(
                "'{}' is not a '{}' peer id",
                raw, prefix
            ))),
        }
    }

    /// Wrap an id reported by the signaling layer without checking its shape
    pub fn from_remote(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits a user reads out or types in
    pub fn code<'a>(&'a self, prefix: &str) -> &'a str {
        self.0.strip_prefix(prefix).unwrap_or(&self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sequence number of a data connection within one session
pub type Epoch = u64;

/// Inbound payload on a data channel, keyed by its `type` field
pub type DataPayload = serde_json::Value;

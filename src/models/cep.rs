//! Postal code (CEP) identifier and its shape check

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of digits in a CEP
pub const CEP_LENGTH: usize = 8;

/// Returned when a raw identifier is not exactly eight ASCII digits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid zipcode: expected {CEP_LENGTH} digits, got {received:?}")]
pub struct InvalidShape {
    pub received: String,
}

/// A postal code that passed [`Cep::parse`]. Holding one is proof of validity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cep(String);

impl Cep {
    /// Check the shape of `raw` without touching the network.
    ///
    /// Dashes, spaces and surrounding whitespace are rejected rather than
    /// normalised.
    pub fn parse(raw: &str) -> Result<Self, InvalidShape> {
        if raw.len() == CEP_LENGTH && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidShape {
                received: raw.to_owned(),
            })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cep {
    type Error = InvalidShape;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cep> for String {
    fn from(cep: Cep) -> Self {
        cep.0
    }
}

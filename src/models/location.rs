//! Locality model resolved from a postal code

use serde::{Deserialize, Serialize};

/// Address data for one postal code. Only `locality` feeds the next stage;
/// the rest is carried along for logging and callers that want it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocalityRecord {
    /// City name (`localidade`)
    pub locality: String,
    /// Two-letter state code (`uf`)
    pub state: Option<String>,
    /// Street name (`logradouro`)
    pub street: Option<String>,
    /// Neighborhood (`bairro`)
    pub neighborhood: Option<String>,
    /// IBGE municipality code
    pub ibge: Option<String>,
}

impl LocalityRecord {
    /// Create a record with just the locality name
    #[must_use]
    pub fn new(locality: impl Into<String>) -> Self {
        Self {
            locality: locality.into(),
            state: None,
            street: None,
            neighborhood: None,
            ibge: None,
        }
    }

    /// Attach the state code
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Format as "City/UF" for log lines
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.state {
            Some(state) => format!("{}/{}", self.locality, state),
            None => self.locality.clone(),
        }
    }
}

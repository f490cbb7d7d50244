//! Location Resolution Module
//!
//! This module resolves a validated postal code into a [`LocalityRecord`]
//! through the ViaCEP directory.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::config::DirectoryConfig;
use crate::context::RequestContext;
use crate::http_client::TracedClient;
use crate::models::{Cep, LocalityRecord};
use crate::upstream::{ResolveError, classify_status, decode_json};

/// Resolves postal codes to localities
#[async_trait]
pub trait LocalityResolver: Send + Sync {
    async fn resolve(&self, cep: &Cep, ctx: &RequestContext)
    -> Result<LocalityRecord, ResolveError>;
}

/// Service for resolving postal codes via ViaCEP
pub struct ViaCepResolver {
    client: TracedClient,
    base_url: String,
}

impl ViaCepResolver {
    #[must_use]
    pub fn new(config: &DirectoryConfig, client: TracedClient) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn lookup_url(&self, cep: &Cep) -> String {
        format!("{}/ws/{}/json/", self.base_url, cep)
    }
}

#[async_trait]
impl LocalityResolver for ViaCepResolver {
    #[instrument(name = "directory.resolve", skip(self, ctx), fields(cep = %cep))]
    async fn resolve(
        &self,
        cep: &Cep,
        ctx: &RequestContext,
    ) -> Result<LocalityRecord, ResolveError> {
        debug!("Resolving postal code");

        let reply = self.client.get(&self.lookup_url(cep), ctx).await?;
        classify_status(&reply).inspect_err(|e| {
            warn!(
                status = reply.status.as_u16(),
                outcome = e.error_type(),
                "Directory rejected lookup"
            );
        })?;

        let body: viacep::AddressBody = decode_json(&reply).inspect_err(|e| {
            warn!(error = %e, body = %reply.body_excerpt(), "Malformed directory response");
        })?;

        match body.into_reply()? {
            viacep::DirectoryReply::Address(record) => {
                debug!("Resolved postal code to {}", record.display_name());
                Ok(record)
            }
            viacep::DirectoryReply::Missing => {
                debug!("Directory reported unknown postal code");
                Err(ResolveError::NotFound)
            }
        }
    }
}

/// ViaCEP response structures
mod viacep {
    use serde::Deserialize;

    use crate::models::LocalityRecord;
    use crate::upstream::UpstreamError;

    /// A decoded 200 reply, before it is classified
    #[derive(Debug, PartialEq)]
    pub enum DirectoryReply {
        Address(LocalityRecord),
        /// The `erro` sentinel: unknown postal code reported with status 200
        Missing,
    }

    /// ViaCEP has sent the sentinel both as a JSON bool and as a string
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum Flag {
        Bool(bool),
        Text(String),
    }

    impl Flag {
        pub fn is_set(&self) -> bool {
            match self {
                Flag::Bool(b) => *b,
                Flag::Text(s) => s.eq_ignore_ascii_case("true"),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct AddressBody {
        pub localidade: Option<String>,
        pub uf: Option<String>,
        pub logradouro: Option<String>,
        pub bairro: Option<String>,
        pub ibge: Option<String>,
        pub erro: Option<Flag>,
    }

    fn non_empty(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    impl AddressBody {
        pub fn into_reply(self) -> Result<DirectoryReply, UpstreamError> {
            if self.erro.as_ref().is_some_and(Flag::is_set) {
                return Ok(DirectoryReply::Missing);
            }
            let locality = non_empty(self.localidade)
                .ok_or_else(|| UpstreamError::Decode("response has no localidade".into()))?;
            Ok(DirectoryReply::Address(LocalityRecord {
                locality,
                state: non_empty(self.uf),
                street: non_empty(self.logradouro),
                neighborhood: non_empty(self.bairro),
                ibge: non_empty(self.ibge),
            }))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TracePropagator;

    #[test]
    fn test_lookup_url() {
        let config = DirectoryConfig {
            base_url: "https://viacep.com.br/".to_string(),
        };
        let client = TracedClient::new(TracePropagator::w3c()).unwrap();
        let resolver = ViaCepResolver::new(&config, client);
        let cep = Cep::parse("01310100").unwrap();
        assert_eq!(
            resolver.lookup_url(&cep),
            "https://viacep.com.br/ws/01310100/json/"
        );
    }
}

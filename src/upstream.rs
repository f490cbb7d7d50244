//! Outcome classification shared by the directory and weather clients

use reqwest::StatusCode;
use thiserror::Error;

use crate::http_client::{RawReply, TransportError};

/// Failure of a single third-party lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The upstream confirms the resource does not exist, either by status
    /// code or by an in-body sentinel on a 200
    #[error("not found upstream")]
    NotFound,

    /// The upstream rejected the shape of the request
    #[error("upstream rejected the request")]
    BadRequest,

    /// Connection, timeout, cancellation or an unusable status
    #[error("transport failure: {0}")]
    Transport(String),

    /// The body did not have the expected structure
    #[error("decode failure: {0}")]
    Decode(String),
}

/// Failure of [`crate::location_resolver::LocalityResolver::resolve`]
pub type ResolveError = UpstreamError;

/// Failure of [`crate::weather::WeatherFetcher::fetch`]
pub type FetchError = UpstreamError;

impl UpstreamError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Transport(_) => "transport_failure",
            Self::Decode(_) => "decode_failure",
        }
    }
}

impl From<TransportError> for UpstreamError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Map a reply status to the classification every upstream shares:
/// 200 means "decode the body", 400 and 404 are client-visible, anything
/// else is treated as the upstream being unusable.
pub fn classify_status(reply: &RawReply) -> Result<(), UpstreamError> {
    match reply.status {
        StatusCode::OK => Ok(()),
        StatusCode::BAD_REQUEST => Err(UpstreamError::BadRequest),
        StatusCode::NOT_FOUND => Err(UpstreamError::NotFound),
        other => Err(UpstreamError::Transport(format!(
            "unexpected status {other}"
        ))),
    }
}

/// Decode a JSON body, mapping parse errors to [`UpstreamError::Decode`]
pub fn decode_json<T: serde::de::DeserializeOwned>(reply: &RawReply) -> Result<T, UpstreamError> {
    serde_json::from_slice(&reply.body).map_err(|e| UpstreamError::Decode(e.to_string()))
}

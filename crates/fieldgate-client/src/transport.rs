//! Validation transport
//!
//! The controllers talk to the server through [`ValidationTransport`]. Futures
//! are `?Send`: controllers live on a single-threaded event loop.

use async_trait::async_trait;
use fieldgate_core::{codes, ErrorSet, FieldValidationRequest, FieldValidationResponse, ValidationError};
use reqwest::StatusCode;
use thiserror::Error;

use crate::cancel::CancelToken;

/// What the server said about a field
#[derive(Debug, Clone, PartialEq)]
pub enum TransportReply {
    Valid,
    Invalid(ErrorSet),
    /// Back off; this is not a field error
    RateLimited,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("validation request timed out")]
    Timeout,

    #[error("validation request was superseded")]
    Cancelled,

    #[error("server error (status {0})")]
    Server(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("unreadable response: {0}")]
    Decode(String),
}

#[async_trait(?Send)]
pub trait ValidationTransport {
    async fn validate(
        &self,
        field: &str,
        request: &FieldValidationRequest,
        cancel: &CancelToken,
    ) -> Result<TransportReply, TransportError>;
}

/// Posts to `{base_url}/api/validate/{field}`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    client_id: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: None,
        }
    }

    /// Sent as `X-Client-ID`, which the server prefers over the peer address
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn endpoint(&self, field: &str) -> String {
        format!("{}/api/validate/{}", self.base_url, urlencoding::encode(field))
    }
}

#[async_trait(?Send)]
impl ValidationTransport for HttpTransport {
    async fn validate(
        &self,
        field: &str,
        request: &FieldValidationRequest,
        cancel: &CancelToken,
    ) -> Result<TransportReply, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let mut builder = self.client.post(self.endpoint(field)).json(request);
        if let Some(id) = &self.client_id {
            builder = builder.header("X-Client-ID", id);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        match response.status() {
            StatusCode::OK => Ok(TransportReply::Valid),
            StatusCode::TOO_MANY_REQUESTS => Ok(TransportReply::RateLimited),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body: FieldValidationResponse = response
                    .json()
                    .await
                    .map_err(|e| TransportError::Decode(e.to_string()))?;
                Ok(TransportReply::Invalid(invalid_errors(field, body)))
            }
            status => Err(TransportError::Server(status.as_u16())),
        }
    }
}

/// A 422 always yields at least one error, even if the body only has `error`
fn invalid_errors(field: &str, body: FieldValidationResponse) -> ErrorSet {
    if !body.errors.is_empty() {
        return body.errors;
    }
    let message = body.error.unwrap_or_else(|| format!("{} is invalid", field));
    ErrorSet::new().with(ValidationError::new(field, codes::VALIDATION_ERROR, message))
}

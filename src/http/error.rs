//! Errors surfaced by request building and transport.

use std::error::Error as StdError;
use std::fmt;

use super::response::ApiResponse;

/// A transport-level failure.
///
/// When the server did answer (e.g. a non-2xx status) the response is kept
/// alongside the error so the resolver can still classify it.
#[derive(Debug)]
pub struct TransportError {
    message: String,
    response: Option<ApiResponse>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            response: None,
            source: Some(Box::new(source)),
        }
    }

    /// An HTTP-layer error that still carries the server's answer.
    pub fn with_response(message: impl Into<String>, response: ApiResponse) -> Self {
        Self {
            message: message.into(),
            response: Some(response),
            source: None,
        }
    }

    pub fn response(&self) -> Option<&ApiResponse> {
        self.response.as_ref()
    }

    /// Splits out the embedded response, or gives the error back if there is none.
    pub fn try_into_response(self) -> Result<ApiResponse, TransportError> {
        match self.response {
            Some(response) => Ok(response),
            None => Err(self),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(response) = &self.response {
            write!(f, " (HTTP {})", response.status.as_u16())?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Failures visible to callers of the client.
///
/// A retryable status code never shows up here: once attempts run out the
/// last response is returned instead.
#[derive(Debug)]
pub enum RequestError {
    /// Connection-level failure with no response, after all attempts.
    Transport(TransportError),
    /// Malformed URL, invalid header, or an unusable retry policy. Never retried.
    InvalidConfiguration(String),
}

impl RequestError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RequestError::InvalidConfiguration(message.into())
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(e) => write!(f, "Request failed: {}", e),
            RequestError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl StdError for RequestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RequestError::Transport(e) => Some(e),
            RequestError::InvalidConfiguration(_) => None,
        }
    }
}

impl From<TransportError> for RequestError {
    fn from(e: TransportError) -> Self {
        RequestError::Transport(e)
    }
}

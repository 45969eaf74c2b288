//! Client error types for the Shortlink SDK

use reqwest::StatusCode;

use crate::model::ApiErrorBody;

/// Error type for Shortlink HTTP client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request timeout")]
    Timeout,

    #[error("request failed with status {status}: {body}")]
    Http {
        status: StatusCode,
        body: ApiErrorBody,
    },

    #[error("session expired")]
    SessionExpired,

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed server error body, if any.
    pub fn body(&self) -> Option<&ApiErrorBody> {
        match self {
            ClientError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Message suitable for a user-facing notice.
    ///
    /// Server supplied messages win over `fallback`; see [`ApiErrorBody::user_message`].
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Http { body, .. } => body.user_message(fallback),
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

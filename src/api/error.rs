use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong with a backend call.
///
/// Every variant renders as a message fit for the status bar. None of them
/// are retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot reach the backend at {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("the backend did not answer in time ({url})")]
    Timeout { url: String },

    #[error("{}", .message.as_deref().unwrap_or("wrong name or password, or not allowed"))]
    Unauthorized { status: u16, message: Option<String> },

    #[error("{}", .message.as_deref().unwrap_or("not found"))]
    NotFound { message: Option<String> },

    #[error("{}", .message.as_deref().unwrap_or("invalid data"))]
    Validation { message: Option<String> },

    #[error("{}", .message.as_deref().unwrap_or("already exists"))]
    Conflict { message: Option<String> },

    #[error("server error {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server { status: u16, message: Option<String> },

    #[error("unexpected response from the backend: {0}")]
    Decode(#[source] reqwest::Error),

    /// Refused locally; no request was sent.
    #[error("{0}")]
    Rejected(String),

    /// Adding photos needs an unlocked entry; no request was sent.
    #[error("entry {entry_id} is not unlocked yet")]
    NotUnlocked { entry_id: i64 },

    #[error("cannot decode photo {photo_id}: {source}")]
    Image {
        photo_id: i64,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiError {
    /// Classify a non-success HTTP status, pulling a `message` out of a JSON
    /// body when the backend supplied one.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        match status.as_u16() {
            401 | 403 => ApiError::Unauthorized {
                status: status.as_u16(),
                message,
            },
            404 => ApiError::NotFound { message },
            400 | 422 => ApiError::Validation { message },
            409 => ApiError::Conflict { message },
            code => ApiError::Server {
                status: code,
                message,
            },
        }
    }

    /// Classify a transport-level failure.
    pub fn from_transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ApiError::Timeout {
                url: url.to_string(),
            }
        } else if source.is_decode() {
            ApiError::Decode(source)
        } else {
            ApiError::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// HTTP status for errors that came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status, .. } | ApiError::Server { status, .. } => {
                Some(*status)
            }
            ApiError::NotFound { .. } => Some(404),
            ApiError::Validation { .. } => Some(400),
            ApiError::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    /// True when the request never reached the backend or never came back.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Network { .. } | ApiError::Timeout { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// True when the error was produced locally and no request went out.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ApiError::Rejected(_) | ApiError::NotUnlocked { .. } | ApiError::File { .. }
        )
    }
}

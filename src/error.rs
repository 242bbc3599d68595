//! Error types for the relay.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model not found: {message}")]
    ModelNotFound { message: String },

    #[error("Provider not supported: {0}")]
    UnsupportedVendor(String),

    #[error("Invalid conversation: {message}")]
    Translation { message: String },

    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn model_not_found(msg: impl Into<String>) -> Self {
        Self::ModelNotFound {
            message: msg.into(),
        }
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation {
            message: msg.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
            message: msg.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Wire code reported to the client for this error.
    ///
    /// Anything raised while talking to a vendor is a `stream_error`, whatever
    /// the underlying cause.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ModelNotFound { .. } => ErrorCode::ModelNotFound,
            Self::UnsupportedVendor(_) => ErrorCode::ProviderNotSupported,
            Self::Translation { .. } => ErrorCode::InvalidConversation,
            Self::Stream { .. } | Self::Http(_) | Self::Json(_) => ErrorCode::StreamError,
            Self::Config { .. } | Self::Io(_) | Self::Toml(_) | Self::Other(_) => {
                ErrorCode::InternalServerError
            }
        }
    }
}

/// Error codes written on the wire, as `{"error": <code>, "details": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    NoAccessToken,
    InvalidAccessToken,
    SubscriptionNotActive,
    ModelNotFound,
    ProviderNotSupported,
    InvalidConversation,
    StreamError,
    InternalServerError,
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_failures_are_stream_errors() {
        assert_eq!(RelayError::stream("boom").code(), ErrorCode::StreamError);
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(RelayError::from(json_err).code(), ErrorCode::StreamError);
    }

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ModelNotFound).unwrap();
        assert_eq!(json, "\"model_not_found\"");
        assert_eq!(
            RelayError::model_not_found("x").code(),
            ErrorCode::ModelNotFound
        );
    }
}

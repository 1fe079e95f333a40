use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ExchangeError {
    /// Status code of the response when the exchange rejected the request
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(err) => Some(err.status_code),
            Self::HttpError(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error body returned by the exchange for any status >= 300
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} ({status_code})")]
pub struct ApiError {
    #[serde(skip)]
    pub status_code: u16,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Decode an error body, keeping the raw text when it is not the usual JSON envelope
    pub fn from_body(status_code: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<Self>(body) {
            Ok(mut err) => {
                err.status_code = status_code;
                err
            }
            Err(_) => Self {
                status_code,
                message: String::from_utf8_lossy(body).trim().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError {
            status_code: 403,
            message: "verboten".to_string(),
        };
        assert_eq!(err.to_string(), "verboten (403)");
        assert_eq!(ExchangeError::from(err).to_string(), "verboten (403)");
    }

    #[test]
    fn test_api_error_from_json_body() {
        let err = ApiError::from_body(404, br#"{"message":"NotFound"}"#);
        assert_eq!(err.status_code, 404);
        assert_eq!(err.message, "NotFound");
    }

    #[test]
    fn test_api_error_from_plain_body() {
        let err = ApiError::from_body(502, b"Bad Gateway\n");
        assert_eq!(err.to_string(), "Bad Gateway (502)");
    }

    #[test]
    fn test_status_code() {
        let err = ExchangeError::from(ApiError::from_body(400, b"{}"));
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(ExchangeError::Cancelled.status_code(), None);
        assert!(ExchangeError::Cancelled.is_cancelled());
    }
}

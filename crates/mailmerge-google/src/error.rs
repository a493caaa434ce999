//! Error types for Google API operations.

use serde::Deserialize;

/// Result type alias for Google API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Google API error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Base URL cannot carry path segments.
    #[error("Invalid API base URL: {0}")]
    InvalidBase(String),

    /// Error reported by the API.
    #[error("Google API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Spreadsheet has no sheet at the requested index.
    #[error("Sheet index {index} out of range (spreadsheet has {count} sheet(s))")]
    SheetNotFound {
        /// Requested 0-based index.
        index: usize,
        /// Number of sheets in the spreadsheet.
        count: usize,
    },

    /// Message could not be rendered.
    #[error("Cannot render message: {0}")]
    Mime(#[from] mailmerge_mime::Error),
}

impl Error {
    /// Builds an API error from a failed response body.
    ///
    /// Google APIs wrap errors as `{"error": {"code", "message", "status"}}`;
    /// anything else is kept as (truncated) text.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body).map_or_else(
            |_| body.chars().take(500).collect(),
            |response| response.error.message,
        );
        Self::Api { status, message }
    }

    /// Returns true for errors caused by a rejected or expired token.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_from_google_error_body() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        let err = Error::from_response(404, body);
        assert!(matches!(
            &err,
            Error::Api { status: 404, message } if message == "Requested entity was not found."
        ));
        assert!(!err.is_auth());
    }

    #[test]
    fn test_from_plain_body() {
        let body = "x".repeat(600);
        match Error::from_response(502, &body) {
            Error::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message.len(), 500);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_auth_errors() {
        assert!(Error::from_response(401, "").is_auth());
        assert!(Error::from_response(403, "").is_auth());
    }
}

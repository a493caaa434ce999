//! Error types for MIME operations.

use std::path::PathBuf;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file-backed part could not be read while rendering.
    #[error("Failed to read part body {path}: {source}")]
    ReadPart {
        /// Path of the file referenced by the part.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A multipart container has no parts to write.
    #[error("Empty {0} container")]
    EmptyMultipart(String),

    /// A part's Content-ID cannot be written as an RFC 5322 `msg-id`.
    #[error("Invalid Content-ID {0:?}")]
    InvalidContentId(String),

    /// Message has no recipients in To, Cc or Bcc.
    #[error("Message has no recipients")]
    NoRecipients,
}

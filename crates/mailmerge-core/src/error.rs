//! Error types for the mail merge core.

use crate::opts::ValidationError;
use crate::template::TemplateKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error coming from a collaborator (table source or transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while preparing or sending a mail merge.
#[derive(Debug, Error)]
pub enum Error {
    /// Merge options failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A template could not be loaded or rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The recipient table could not be loaded or is empty.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Two inline/attachment files share a base name.
    #[error("Duplicate file name {name:?} ({path})")]
    DuplicateAsset {
        /// The clashing base name.
        name: String,
        /// Path of the second file with that name.
        path: PathBuf,
    },

    /// An inline part's name cannot be used as its Content-ID.
    #[error("Inline file name {name:?} is not a valid Content-ID (use letters, digits and . - _ only)")]
    InvalidContentId {
        /// The offending base name or Content-ID.
        name: String,
    },

    /// An inline/attachment file is missing or not a regular file.
    #[error("Cannot use file {path}: {source}")]
    Asset {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A recipient row could not be turned into a message.
    #[error(transparent)]
    Row(#[from] RowError),

    /// The transport failed to send a message.
    #[error("Send failed for row {row} after {sent} message(s) sent: {source}")]
    Transport {
        /// 1-based data row of the message that failed.
        row: usize,
        /// Messages successfully sent before the failure.
        sent: usize,
        /// Transport error.
        #[source]
        source: BoxError,
    },

    /// Sending was cancelled.
    #[error("Send cancelled after {sent} message(s) sent")]
    Cancelled {
        /// Messages successfully sent before cancellation.
        sent: usize,
    },
}

impl Error {
    /// Number of messages delivered before this error, for send failures.
    #[must_use]
    pub const fn sent(&self) -> Option<usize> {
        match self {
            Self::Transport { sent, .. } | Self::Cancelled { sent } => Some(*sent),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// All validation failures of a set of merge options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ConfigError(pub Vec<ValidationError>);

impl ConfigError {
    /// Names of the fields that failed validation.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(ValidationError::field).collect()
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid merge options: ")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} ({})", error.message(), error.field())?;
        }
        Ok(())
    }
}

/// Template loading and rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A configured template file could not be read.
    #[error("Cannot read {kind} template {path}: {source}")]
    Read {
        /// Template kind.
        kind: TemplateKind,
        /// Configured path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Template text is malformed.
    #[error("Syntax error in {kind} template: {message}")]
    Syntax {
        /// Template kind.
        kind: TemplateKind,
        /// Parser message, including line and column.
        message: String,
    },

    /// A template failed while rendering a row.
    #[error("Cannot render {kind} template: {message}")]
    Render {
        /// Template kind.
        kind: TemplateKind,
        /// Renderer message.
        message: String,
    },

    /// The template is configured but was never read.
    #[error("The {0} template is configured but not loaded")]
    NotLoaded(TemplateKind),
}

/// Recipient table errors.
#[derive(Debug, Error)]
pub enum TableError {
    /// The table source failed.
    #[error("Failed to read recipient table: {0}")]
    Source(#[source] BoxError),

    /// The table has no usable data rows.
    #[error("Recipient table has no recipients")]
    NoRecipients,
}

/// What went wrong on a recipient row.
#[derive(Debug, Error)]
pub enum RowErrorKind {
    /// A recipient column holds an entry that is not an address.
    #[error("{column} addresses include invalid entries ({value})")]
    InvalidAddress {
        /// Column name (`TO`, `CC`, `BCC`).
        column: &'static str,
        /// Raw cell value.
        value: String,
    },

    /// To, Cc and Bcc are all empty.
    #[error("no recipients")]
    NoRecipients,

    /// Both the text and the HTML body rendered empty.
    #[error("empty message body")]
    EmptyBody,

    /// Rendering a template for this row failed.
    #[error("{0}")]
    Template(#[source] TemplateError),
}

/// Failure tied to one recipient row.
#[derive(Debug, Error)]
#[error("Row {row}: {kind} with data ({data})")]
pub struct RowError {
    /// 1-based index among the table's data rows.
    pub row: usize,
    /// Failure kind.
    #[source]
    pub kind: RowErrorKind,
    /// JSON rendering of the raw row cells.
    pub data: String,
}

impl RowError {
    /// Creates a row error, rendering `cells` for diagnostics.
    #[must_use]
    pub fn new(row: usize, kind: RowErrorKind, cells: &[String]) -> Self {
        Self {
            row,
            kind,
            data: serde_json::to_string(cells).unwrap_or_default(),
        }
    }
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
    fn test_row_error_display_includes_data() {
        let cells = vec![String::new(), String::new(), String::new(), "Bob".to_string()];
        let err = RowError::new(2, RowErrorKind::NoRecipients, &cells);
        assert_eq!(err.data, r#"["","","","Bob"]"#);
        assert_eq!(err.to_string(), r#"Row 2: no recipients with data (["","","","Bob"])"#);
    }

    #[test]
    fn test_empty_body_display() {
        let cells = vec!["a@x.com".to_string(), String::new()];
        let err = Error::from(RowError::new(4, RowErrorKind::EmptyBody, &cells));
        assert_eq!(err.to_string(), r#"Row 4: empty message body with data (["a@x.com",""])"#);
    }

    #[test]
    fn test_config_error_lists_fields() {
        let err = ConfigError(vec![ValidationError::EmptySheetId, ValidationError::ZeroHeaderRows]);
        assert_eq!(err.fields(), vec!["sheet_id", "header_row_count"]);
        assert!(err.to_string().contains("sheet_id"));
        assert!(err.to_string().contains("header_row_count"));
    }

    #[test]
    fn test_sent_count() {
        assert_eq!(Error::Cancelled { sent: 3 }.sent(), Some(3));
        assert_eq!(Error::Table(TableError::NoRecipients).sent(), None);
    }
}

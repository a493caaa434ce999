//! Merge options and their validation.

use crate::error::ConfigError;
use crate::template::is_set;
use mailmerge_mime::Part;
use serde::Deserialize;
use std::path::PathBuf;

/// Default number of header rows.
pub const DEFAULT_HEADER_ROW_COUNT: u32 = 1;

/// Mail merge configuration.
///
/// Everything except the transport handle and the pre-built common parts can
/// be deserialized from a config file. Missing fields take their defaults and
/// are caught by [`Opts::validate`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, bound = "")]
pub struct Opts<T> {
    /// Transport used both to read the recipient table and to send mail.
    #[serde(skip)]
    pub transport: Option<T>,
    /// Spreadsheet holding the recipients.
    pub sheet_id: String,
    /// 0-based sheet (tab) index.
    pub sheet_index: usize,
    /// Leading rows excluded from data; the first supplies column names.
    pub header_row_count: u32,
    /// Subject template file.
    pub subject_template: PathBuf,
    /// HTML body template file.
    pub html_template: Option<PathBuf>,
    /// Plain-text body template file.
    pub text_template: Option<PathBuf>,
    /// Files attached inline, referenced from HTML as `cid:<basename>`.
    pub inline_files: Vec<PathBuf>,
    /// Files attached for download.
    pub attachment_files: Vec<PathBuf>,
    /// Parts shared by every message, ahead of the inline/attachment files.
    #[serde(skip)]
    pub common_parts: Vec<Part>,
}

impl<T> Default for Opts<T> {
    fn default() -> Self {
        Self {
            transport: None,
            sheet_id: String::new(),
            sheet_index: 0,
            header_row_count: DEFAULT_HEADER_ROW_COUNT,
            subject_template: PathBuf::new(),
            html_template: None,
            text_template: None,
            inline_files: Vec::new(),
            attachment_files: Vec::new(),
            common_parts: Vec::new(),
        }
    }
}

impl<T> Opts<T> {
    /// Creates options with the given transport and defaults elsewhere.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
            ..Self::default()
        }
    }

    /// Checks every invariant and reports all violations together.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing each [`ValidationError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.transport.is_none() {
            errors.push(ValidationError::MissingTransport);
        }
        if self.sheet_id.trim().is_empty() {
            errors.push(ValidationError::EmptySheetId);
        }
        if self.header_row_count == 0 {
            errors.push(ValidationError::ZeroHeaderRows);
        }
        if !is_set(&self.subject_template) {
            errors.push(ValidationError::EmptySubjectTemplate);
        }
        if !self.html_template.as_deref().is_some_and(is_set)
            && !self.text_template.as_deref().is_some_and(is_set)
        {
            errors.push(ValidationError::MissingBodyTemplate);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError(errors))
        }
    }
}

/// A single invalid merge option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// No transport handle.
    MissingTransport,
    /// Recipient spreadsheet id is empty.
    EmptySheetId,
    /// Header row count is zero.
    ZeroHeaderRows,
    /// Subject template path is empty.
    EmptySubjectTemplate,
    /// Neither an HTML nor a text body template is set.
    MissingBodyTemplate,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::MissingTransport => "Transport is required",
            Self::EmptySheetId => "Recipient sheet id is required",
            Self::ZeroHeaderRows => "Header row count must be at least 1",
            Self::EmptySubjectTemplate => "Subject template is required",
            Self::MissingBodyTemplate => "An HTML or text body template is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingTransport => "transport",
            Self::EmptySheetId => "sheet_id",
            Self::ZeroHeaderRows => "header_row_count",
            Self::EmptySubjectTemplate => "subject_template",
            Self::MissingBodyTemplate => "html_template/text_template",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

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

    fn valid() -> Opts<()> {
        Opts {
            sheet_id: "sheet-1".to_string(),
            subject_template: PathBuf::from("subject.txt"),
            text_template: Some(PathBuf::from("body.txt")),
            ..Opts::new(())
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let opts: Opts<()> = Opts {
            header_row_count: 0,
            ..Opts::default()
        };
        let err = opts.validate().unwrap_err();
        assert_eq!(
            err.0,
            vec![
                ValidationError::MissingTransport,
                ValidationError::EmptySheetId,
                ValidationError::ZeroHeaderRows,
                ValidationError::EmptySubjectTemplate,
                ValidationError::MissingBodyTemplate,
            ]
        );
    }

    #[test]
    fn test_validate_blank_paths_count_as_missing() {
        let opts = Opts {
            sheet_id: "  ".to_string(),
            subject_template: PathBuf::from(" "),
            html_template: Some(PathBuf::new()),
            text_template: None,
            ..valid()
        };
        let err = opts.validate().unwrap_err();
        assert_eq!(err.fields(), vec!["sheet_id", "subject_template", "html_template/text_template"]);
    }

    #[test]
    fn test_html_only_is_enough() {
        let opts = Opts {
            html_template: Some(PathBuf::from("body.html")),
            text_template: None,
            ..valid()
        };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let opts: Opts<()> = serde_json::from_str(
            r#"{"sheet_id": "abc", "subject_template": "s.txt", "inline_files": ["a.png"]}"#,
        )
        .unwrap();
        assert!(opts.transport.is_none());
        assert_eq!(opts.sheet_id, "abc");
        assert_eq!(opts.header_row_count, DEFAULT_HEADER_ROW_COUNT);
        assert_eq!(opts.inline_files, vec![PathBuf::from("a.png")]);
        assert!(opts.html_template.is_none());
    }
}

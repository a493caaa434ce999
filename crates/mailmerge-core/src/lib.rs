//! # mailmerge-core
//!
//! Mail merge orchestration.
//!
//! This crate provides:
//! - Merge options and their validation
//! - Recipient tables read through a [`TableSource`]
//! - Handlebars subject and body templates (`{{NAME}}` per column)
//! - Per-row message building with fail-fast row errors
//! - Sequential, cancellable sending through a [`MailSender`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailmerge_core::{MailMerge, Opts, USER_ID_ME};
//! use tokio_util::sync::CancellationToken;
//!
//! let opts = Opts {
//!     sheet_id: "1AbC".to_string(),
//!     subject_template: "subject.txt".into(),
//!     html_template: Some("body.html".into()),
//!     inline_files: vec!["img/logo.png".into()],
//!     ..Opts::new(client)
//! };
//! let merge = MailMerge::new(opts).await?;
//! let sent = merge.send(&CancellationToken::new(), USER_ID_ME).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod merge;
mod opts;
pub mod table;
pub mod template;
mod transport;

pub use error::{
    BoxError, ConfigError, Error, Result, RowError, RowErrorKind, TableError, TemplateError,
};
pub use merge::{COLUMN_BCC, COLUMN_CC, COLUMN_TO, MailMerge};
pub use opts::{DEFAULT_HEADER_ROW_COUNT, Opts, ValidationError};
pub use table::{Columns, RowMap, Table, TableSource};
pub use template::{TemplateKind, TemplateSet};
pub use transport::{MailSender, USER_ID_ME};

pub use mailmerge_mime as mime;

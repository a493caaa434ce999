//! # mailmerge-google
//!
//! Google collaborators for mail merge.
//!
//! ## Features
//!
//! - **Sheets**: Reads a recipient table from a spreadsheet tab, addressed by
//!   id or by its `docs.google.com` URL
//! - **Gmail**: Sends rendered messages through `users.messages.send`
//! - **Auth**: `OAuth2` bearer access tokens supplied by the caller
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailmerge_core::{MailMerge, Opts};
//! use mailmerge_google::GoogleClient;
//!
//! let client = GoogleClient::new(access_token)?;
//! let opts = Opts {
//!     sheet_id: "https://docs.google.com/spreadsheets/d/1AbC/edit".to_string(),
//!     subject_template: "subject.txt".into(),
//!     text_template: Some("body.txt".into()),
//!     ..Opts::new(client)
//! };
//! let merge = MailMerge::new(opts).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod gmail;
mod sheets;

pub use client::{GMAIL_API_BASE, GoogleClient, SHEETS_API_BASE};
pub use error::{Error, Result};
pub use gmail::SentMessage;
pub use sheets::spreadsheet_id;

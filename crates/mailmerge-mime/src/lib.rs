//! # mailmerge-mime
//!
//! MIME message generation for mail merge.
//!
//! ## Features
//!
//! - **Address lists**: Lenient comma/semicolon recipient parsing that keeps
//!   malformed entries visible instead of dropping them
//! - **Parts**: Inline and attachment parts backed by files that are only read
//!   when the message is rendered
//! - **Multipart**: `multipart/alternative` text/HTML bodies inside a
//!   `multipart/mixed` container with `cid:` linked inline images
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailmerge_mime::{AddressList, Disposition, MessageWriter, Part, PartsSet};
//!
//! let shared = vec![Part::file("img/logo.png", Disposition::Inline)];
//! let message = MessageWriter {
//!     to: AddressList::parse("Alice <alice@example.com>"),
//!     cc: AddressList::default(),
//!     bcc: AddressList::default(),
//!     subject: "Hello".to_string(),
//!     body: PartsSet::new_mail(b"Hello!", b"<img src=\"cid:logo.png\">", &shared),
//! };
//!
//! let raw = message.to_bytes()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod part;
mod writer;

pub mod encoding;

pub use address::{Address, AddressList, Mailbox};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use part::{Disposition, Part, PartBody, PartsSet, base_name, is_valid_content_id};
pub use writer::MessageWriter;

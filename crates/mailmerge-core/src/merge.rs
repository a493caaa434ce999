//! Mail merge orchestration.
//!
//! A [`MailMerge`] is built once from validated [`Opts`]: templates and the
//! shared inline/attachment parts are loaded, then the recipient table is read
//! through the transport. [`MailMerge::messages`] turns every non-blank row
//! into a [`MessageWriter`], failing the whole batch on the first bad row, and
//! [`MailMerge::send`] dispatches the batch one message at a time.

use crate::error::{ConfigError, Error, Result, RowError, RowErrorKind, TableError};
use crate::opts::{Opts, ValidationError};
use crate::table::{Table, TableSource};
use crate::template::{TemplateKind, TemplateSet};
use crate::transport::{MailSender, USER_ID_ME};
use mailmerge_mime::{
    AddressList, Disposition, MessageWriter, Part, PartsSet, base_name, is_valid_content_id,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Column holding To recipients.
pub const COLUMN_TO: &str = "TO";
/// Column holding Cc recipients.
pub const COLUMN_CC: &str = "CC";
/// Column holding Bcc recipients.
pub const COLUMN_BCC: &str = "BCC";

/// A loaded mail merge, ready to build and send messages.
#[derive(Debug)]
pub struct MailMerge<T> {
    templates: TemplateSet,
    shared_parts: Vec<Part>,
    table: Table,
    transport: T,
}

impl<T> MailMerge<T>
where
    T: TableSource + MailSender,
{
    /// Validates `opts`, loads templates and shared files, then reads the
    /// recipient table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] with every invalid option, a template, file
    /// or table error, or [`TableError::NoRecipients`] if the table has no
    /// non-blank data rows.
    pub async fn new(opts: Opts<T>) -> Result<Self> {
        opts.validate()?;

        let Opts {
            transport,
            sheet_id,
            sheet_index,
            header_row_count,
            subject_template,
            html_template,
            text_template,
            inline_files,
            attachment_files,
            common_parts,
        } = opts;
        let transport =
            transport.ok_or_else(|| ConfigError(vec![ValidationError::MissingTransport]))?;

        let mut templates = TemplateSet::new()
            .with_path(TemplateKind::Subject, subject_template)
            .with_path(TemplateKind::BodyText, text_template.unwrap_or_default())
            .with_path(TemplateKind::BodyHtml, html_template.unwrap_or_default());
        templates.read_templates()?;

        let mut shared = SharedParts::new(common_parts)?;
        shared.load_files(Disposition::Inline, inline_files)?;
        shared.load_files(Disposition::Attachment, attachment_files)?;

        let table = transport
            .read_table(&sheet_id, sheet_index, header_row_count)
            .await
            .map_err(|e| TableError::Source(Box::new(e)))?;

        let recipients = table.data_rows().count();
        if recipients == 0 {
            return Err(TableError::NoRecipients.into());
        }
        info!(
            sheet_id = %sheet_id,
            rows = recipients,
            columns = table.columns.len(),
            shared_parts = shared.parts.len(),
            "loaded mail merge"
        );

        Ok(Self {
            templates,
            shared_parts: shared.parts,
            table,
            transport,
        })
    }

    /// Builds the batch and sends it message by message.
    ///
    /// A blank `user_id` means [`USER_ID_ME`]. Sending stops at the first
    /// transport failure or when `cancel` fires; no further messages are sent.
    ///
    /// # Errors
    ///
    /// Returns any error from [`MailMerge::messages`] (nothing is sent), or
    /// [`Error::Transport`] / [`Error::Cancelled`] carrying the number of
    /// messages already delivered.
    pub async fn send(&self, cancel: &CancellationToken, user_id: &str) -> Result<usize> {
        let user_id = match user_id.trim() {
            "" => USER_ID_ME,
            id => id,
        };

        let batch = self.build()?;
        info!(messages = batch.len(), user_id, "sending mail merge");

        for (sent, (row, message)) in batch.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { sent });
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled { sent }),
                result = self.transport.send(user_id, message) => result,
            };

            match result {
                Ok(id) => debug!(row, id = %id, "sent message"),
                Err(e) => {
                    return Err(Error::Transport {
                        row: *row,
                        sent,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(sent = batch.len(), "mail merge complete");
        Ok(batch.len())
    }
}

impl<T> MailMerge<T> {
    /// Builds one message per non-blank recipient row, in table order.
    ///
    /// # Errors
    ///
    /// Returns the [`RowError`] of the first row that has an invalid address,
    /// no recipients at all, or a template that fails to render. No messages
    /// are returned in that case.
    pub fn messages(&self) -> Result<Vec<MessageWriter>> {
        Ok(self.build()?.into_iter().map(|(_, message)| message).collect())
    }

    /// The loaded recipient table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// Inline and attachment parts shared by every message.
    #[must_use]
    pub fn shared_parts(&self) -> &[Part] {
        &self.shared_parts
    }

    /// The transport handle.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn build(&self) -> Result<Vec<(usize, MessageWriter)>> {
        let mut messages = Vec::with_capacity(self.table.rows.len());
        for (row, cells) in self.table.data_rows() {
            let message = self.build_row(row, cells)?;
            debug!(row, recipients = message.recipient_count(), "built message");
            messages.push((row, message));
        }
        Ok(messages)
    }

    fn build_row(&self, row: usize, cells: &[String]) -> Result<MessageWriter> {
        let columns = &self.table.columns;
        let vars = columns.row_map(cells);

        let recipients = |column: &'static str| -> Result<AddressList> {
            let value = columns.cell(column, cells);
            let list = AddressList::parse(value);
            if list.filter_without_address().is_empty() {
                Ok(list)
            } else {
                let kind = RowErrorKind::InvalidAddress {
                    column,
                    value: value.to_string(),
                };
                Err(RowError::new(row, kind, cells).into())
            }
        };
        let to = recipients(COLUMN_TO)?;
        let cc = recipients(COLUMN_CC)?;
        let bcc = recipients(COLUMN_BCC)?;

        let render = |kind: TemplateKind| -> Result<Vec<u8>> {
            self.templates
                .render_template_or_default(kind, &vars, &[])
                .map_err(|e| RowError::new(row, RowErrorKind::Template(e), cells).into())
        };
        let subject = render(TemplateKind::Subject)?;
        let text = render(TemplateKind::BodyText)?;
        let html = render(TemplateKind::BodyHtml)?;
        if text.is_empty() && html.is_empty() {
            return Err(RowError::new(row, RowErrorKind::EmptyBody, cells).into());
        }

        let message = MessageWriter {
            to,
            cc,
            bcc,
            subject: subject_line(&subject),
            body: PartsSet::new_mail(&text, &html, &self.shared_parts),
        };

        if message.recipient_count() == 0 {
            return Err(RowError::new(row, RowErrorKind::NoRecipients, cells).into());
        }

        Ok(message)
    }
}

/// Folds a rendered subject onto one line.
fn subject_line(rendered: &[u8]) -> String {
    String::from_utf8_lossy(rendered)
        .trim()
        .replace(['\r', '\n'], " ")
}

/// Shared parts plus the base names already taken.
struct SharedParts {
    parts: Vec<Part>,
    names: HashSet<String>,
}

impl SharedParts {
    fn new(common: Vec<Part>) -> Result<Self> {
        if let Some(name) = common
            .iter()
            .filter_map(|p| p.content_id.as_deref())
            .find(|id| !is_valid_content_id(id))
        {
            return Err(Error::InvalidContentId {
                name: name.to_string(),
            });
        }
        let names = common.iter().filter_map(|p| p.filename.clone()).collect();
        Ok(Self {
            parts: common,
            names,
        })
    }

    /// Appends file-backed parts, rejecting base names already in the set and
    /// inline names that cannot serve as a Content-ID.
    ///
    /// Only file metadata is checked here; contents are read at send time.
    fn load_files(&mut self, disposition: Disposition, files: Vec<PathBuf>) -> Result<()> {
        for path in files {
            let name = base_name(&path).unwrap_or_else(|| path.display().to_string());
            if disposition == Disposition::Inline && !is_valid_content_id(&name) {
                return Err(Error::InvalidContentId { name });
            }
            if !self.names.insert(name.clone()) {
                return Err(Error::DuplicateAsset { name, path });
            }

            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    return Err(Error::Asset {
                        path,
                        source: std::io::Error::other("not a regular file"),
                    });
                }
                Err(source) => return Err(Error::Asset { path, source }),
            }

            debug!(%disposition, file = %path.display(), "added shared part");
            self.parts.push(Part::file(path, disposition));
        }
        Ok(())
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
    use crate::table::Columns;

    fn merge(rows: Vec<Vec<&str>>) -> MailMerge<()> {
        let mut templates = TemplateSet::new();
        templates
            .insert_source(TemplateKind::Subject, "Hi {{NAME}}\n")
            .unwrap();
        templates
            .insert_source(TemplateKind::BodyText, "Hello {{NAME}}!")
            .unwrap();
        MailMerge {
            templates,
            shared_parts: Vec::new(),
            table: Table::new(
                Columns::new(["TO", "CC", "BCC", "NAME"]),
                rows.into_iter()
                    .map(|r| r.into_iter().map(String::from).collect())
                    .collect(),
            ),
            transport: (),
        }
    }

    #[test]
    fn test_subject_line_folds_newlines() {
        assert_eq!(subject_line(b"  Hi\r\nthere\n"), "Hi  there");
    }

    #[test]
    fn test_build_row_message() {
        let mm = merge(vec![vec!["a@x.com", "c@x.com", "", "Alice"]]);
        let messages = mm.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject, "Hi Alice");
        assert_eq!(messages[0].cc.len(), 1);
        assert_eq!(messages[0].body.text_body(), b"Hello Alice!");
    }

    #[test]
    fn test_invalid_cc_is_row_error() {
        let mm = merge(vec![vec!["a@x.com", "nope", "", "Alice"]]);
        match mm.messages().unwrap_err() {
            Error::Row(RowError {
                row,
                kind: RowErrorKind::InvalidAddress { column, value },
                ..
            }) => {
                assert_eq!(row, 1);
                assert_eq!(column, COLUMN_CC);
                assert_eq!(value, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bcc_only_is_sendable() {
        let mm = merge(vec![vec!["", "", "hidden@x.com", "Alice"]]);
        let messages = mm.messages().unwrap();
        assert_eq!(messages[0].recipient_count(), 1);
        assert!(messages[0].to.is_empty());
    }

    #[test]
    fn test_empty_rendered_body_is_row_error() {
        let mut mm = merge(vec![
            vec!["a@x.com", "", "", "Alice"],
            vec!["b@x.com", "", "", ""],
        ]);
        mm.templates
            .insert_source(TemplateKind::BodyText, "{{NAME}}")
            .unwrap();

        match mm.messages().unwrap_err() {
            Error::Row(RowError {
                row,
                kind: RowErrorKind::EmptyBody,
                ..
            }) => assert_eq!(row, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shared_parts_reject_duplicate_common_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"png").unwrap();

        let mut shared =
            SharedParts::new(vec![Part::file("elsewhere/logo.png", Disposition::Inline)]).unwrap();
        let err = shared
            .load_files(Disposition::Attachment, vec![path])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAsset { name, .. } if name == "logo.png"));
    }

    #[test]
    fn test_shared_parts_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut shared = SharedParts::new(Vec::new()).unwrap();
        let err = shared
            .load_files(Disposition::Attachment, vec![dir.path().join("missing.pdf")])
            .unwrap_err();
        assert!(matches!(err, Error::Asset { .. }));
    }

    #[test]
    fn test_shared_parts_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut shared = SharedParts::new(Vec::new()).unwrap();
        let err = shared
            .load_files(Disposition::Inline, vec![dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, Error::Asset { .. }));
    }

    #[test]
    fn test_inline_name_must_be_content_id() {
        let dir = tempfile::tempdir().unwrap();
        let spaced = dir.path().join("my logo.png");
        std::fs::write(&spaced, b"png").unwrap();

        let mut shared = SharedParts::new(Vec::new()).unwrap();
        let err = shared
            .load_files(Disposition::Inline, vec![spaced.clone()])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidContentId { name } if name == "my logo.png"));

        // Attachments carry no Content-ID, so any name is fine.
        shared
            .load_files(Disposition::Attachment, vec![spaced])
            .unwrap();
        assert_eq!(shared.parts.len(), 1);
    }

    #[test]
    fn test_common_part_content_id_is_checked() {
        let mut part = Part::file("brand/logo.png", Disposition::Inline);
        part.content_id = Some("<logo>".to_string());
        let err = SharedParts::new(vec![part]).err().unwrap();
        assert!(matches!(err, Error::InvalidContentId { name } if name == "<logo>"));
    }
}

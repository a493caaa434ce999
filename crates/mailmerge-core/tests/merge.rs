//! Integration tests for the mail merge orchestrator.
//!
//! These tests use an in-memory transport that serves a fixed cell grid and
//! records sent messages, so no spreadsheet or mail service is needed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailmerge_core::mime::{Disposition, MessageWriter, Part};
use mailmerge_core::{
    Error, MailMerge, MailSender, Opts, RowError, RowErrorKind, Table, TableError, TableSource,
    TemplateError, USER_ID_ME, ValidationError,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Mock transport backed by a cell grid.
#[derive(Debug, Default)]
struct FakeTransport {
    /// Raw grid including header rows.
    grid: Vec<Vec<String>>,
    /// Fail the send with this 0-based attempt index.
    fail_at: Option<usize>,
    /// Cancel this token once this many messages have been sent.
    cancel_after: Option<(usize, CancellationToken)>,
    /// Never complete sends.
    hang: bool,
    /// Captured `(user_id, subject)` pairs.
    sent: Mutex<Vec<(String, String)>>,
    /// Send attempts, including failed ones.
    attempts: Mutex<usize>,
}

impl FakeTransport {
    fn new(rows: &[&[&str]]) -> Self {
        Self {
            grid: rows
                .iter()
                .map(|row| row.iter().map(|c| (*c).to_string()).collect())
                .collect(),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl TableSource for FakeTransport {
    type Error = io::Error;

    fn read_table(
        &self,
        sheet_id: &str,
        _sheet_index: usize,
        header_row_count: u32,
    ) -> impl Future<Output = Result<Table, Self::Error>> + Send {
        let result = if sheet_id == "missing" {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such spreadsheet"))
        } else {
            Ok(Table::from_grid(self.grid.clone(), header_row_count))
        };
        async move { result }
    }
}

impl MailSender for FakeTransport {
    type Error = io::Error;

    fn send(
        &self,
        user_id: &str,
        message: &MessageWriter,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send {
        async move {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts - 1
            };
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail_at == Some(attempt) {
                return Err(io::Error::other("quota exceeded"));
            }

            // Rendering proves every shared file is readable at send time.
            message.to_bytes().map_err(io::Error::other)?;

            let mut sent = self.sent.lock().unwrap();
            sent.push((user_id.to_string(), message.subject.clone()));
            if let Some((after, token)) = &self.cancel_after {
                if sent.len() == *after {
                    token.cancel();
                }
            }
            Ok(format!("msg-{attempt}"))
        }
    }
}

const HEADER: &[&str] = &["TO", "CC", "BCC", "NAME"];

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("subject.txt"), "Hi {{NAME}}").unwrap();
        std::fs::write(dir.path().join("body.txt"), "Hello {{NAME}}!").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn opts<T>(&self, transport: T) -> Opts<T> {
        Opts {
            sheet_id: "sheet-1".to_string(),
            subject_template: self.path("subject.txt"),
            text_template: Some(self.path("body.txt")),
            ..Opts::new(transport)
        }
    }
}

fn emails(list: &mailmerge_core::mime::AddressList) -> Vec<&str> {
    list.mailboxes().map(|m| m.email.as_str()).collect()
}

fn three_rows(second_to: &str) -> Arc<FakeTransport> {
    Arc::new(FakeTransport::new(&[
        HEADER,
        &["a@x.com", "", "", "Alice"],
        &[second_to, "", "", "Bob"],
        &["c@x.com", "", "", "Carol"],
    ]))
}

#[tokio::test]
async fn test_single_row_end_to_end() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));

    let merge = MailMerge::new(fx.opts(transport.clone())).await.unwrap();
    let messages = merge.messages().unwrap();

    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(emails(&message.to), vec!["a@x.com"]);
    assert!(message.cc.is_empty());
    assert!(message.bcc.is_empty());
    assert_eq!(message.subject, "Hi Alice");
    assert_eq!(message.body.text_body(), b"Hello Alice!");
    assert!(message.body.html_body().is_empty());

    let sent = merge.send(&CancellationToken::new(), "").await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(
        transport.sent(),
        vec![(USER_ID_ME.to_string(), "Hi Alice".to_string())]
    );
}

#[tokio::test]
async fn test_explicit_user_id_is_passed_through() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));

    let merge = MailMerge::new(fx.opts(transport.clone())).await.unwrap();
    merge
        .send(&CancellationToken::new(), "sender@example.com")
        .await
        .unwrap();
    assert_eq!(transport.sent()[0].0, "sender@example.com");
}

#[tokio::test]
async fn test_inline_and_attachment_structure() {
    let fx = Fixture::new();
    let html = fx.write("body.html", r#"<p>Hi {{NAME}}</p><img src="cid:cover.jpg">"#);
    let cover = fx.write("img/cover.jpg", "jpeg");
    let sig = fx.write("img/sig.png", "png");
    let report = fx.write("docs/report.pdf", "%PDF");

    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
    let opts = Opts {
        html_template: Some(html),
        inline_files: vec![cover, sig],
        attachment_files: vec![report],
        ..fx.opts(transport)
    };
    let merge = MailMerge::new(opts).await.unwrap();
    let messages = merge.messages().unwrap();
    let body = &messages[0].body;

    assert_eq!(body.content_type.essence(), "multipart/mixed");
    assert!(body.alternative_part().is_some());
    assert_eq!(
        body.html_body(),
        br#"<p>Hi Alice</p><img src="cid:cover.jpg">"#
    );

    let siblings: Vec<&Part> = body.siblings().collect();
    assert_eq!(siblings.len(), 3);
    let ids: Vec<Option<&str>> = siblings.iter().map(|p| p.content_id.as_deref()).collect();
    assert_eq!(ids, vec![Some("cover.jpg"), Some("sig.png"), None]);
    assert_eq!(siblings[2].disposition, Some(Disposition::Attachment));
    assert_eq!(siblings[2].filename.as_deref(), Some("report.pdf"));

    let raw = String::from_utf8(messages[0].to_bytes().unwrap()).unwrap();
    assert!(raw.contains("Content-ID: <cover.jpg>"));
    assert!(raw.contains("Content-ID: <sig.png>"));
    assert!(raw.contains("Content-Type: application/pdf"));
}

#[tokio::test]
async fn test_shared_files_are_read_lazily() {
    let fx = Fixture::new();
    let report = fx.write("report.pdf", "first");

    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
    let opts = Opts {
        attachment_files: vec![report.clone()],
        ..fx.opts(transport)
    };
    let merge = MailMerge::new(opts).await.unwrap();

    std::fs::remove_file(&report).unwrap();
    let messages = merge.messages().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].to_bytes().is_err());

    let err = merge.send(&CancellationToken::new(), "").await.unwrap_err();
    assert!(matches!(err, Error::Transport { row: 1, sent: 0, .. }));
}

#[tokio::test]
async fn test_fail_fast_on_row_without_recipients() {
    let fx = Fixture::new();
    let transport = three_rows("");

    let merge = MailMerge::new(fx.opts(transport.clone())).await.unwrap();
    match merge.messages().unwrap_err() {
        Error::Row(RowError {
            row,
            kind: RowErrorKind::NoRecipients,
            data,
        }) => {
            assert_eq!(row, 2);
            assert_eq!(data, r#"["","","","Bob"]"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = merge.send(&CancellationToken::new(), "").await.unwrap_err();
    assert!(matches!(err, Error::Row(RowError { row: 2, .. })));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_address_is_row_error() {
    let fx = Fixture::new();
    let merge = MailMerge::new(fx.opts(three_rows("not-an-email")))
        .await
        .unwrap();

    let err = merge.messages().unwrap_err();
    match &err {
        Error::Row(RowError {
            row: 2,
            kind: RowErrorKind::InvalidAddress { column, value },
            ..
        }) => {
            assert_eq!(*column, "TO");
            assert_eq!(value, "not-an-email");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().starts_with("Row 2:"));
}

#[tokio::test]
async fn test_empty_body_row_stops_before_sending() {
    let fx = Fixture::new();
    let body = fx.write("note.txt", "{{NAME}}");
    let transport = Arc::new(FakeTransport::new(&[
        HEADER,
        &["a@x.com", "", "", "Alice"],
        &["b@x.com", "", "", ""],
    ]));
    let opts = Opts {
        text_template: Some(body),
        ..fx.opts(transport.clone())
    };
    let merge = MailMerge::new(opts).await.unwrap();

    let err = merge.send(&CancellationToken::new(), "").await.unwrap_err();
    match &err {
        Error::Row(RowError {
            row: 2,
            kind: RowErrorKind::EmptyBody,
            ..
        }) => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_messages_is_idempotent() {
    let fx = Fixture::new();
    let inline = fx.write("logo.png", "png");
    let opts = Opts {
        inline_files: vec![inline],
        ..fx.opts(three_rows("b@x.com"))
    };
    let merge = MailMerge::new(opts).await.unwrap();

    let first = merge.messages().unwrap();
    let second = merge.messages().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_blank_rows_are_skipped() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport::new(&[
        HEADER,
        &["a@x.com", "", "", "Alice"],
        &["", " ", "", ""],
        &[],
        &["b@x.com", "", "", "Bob"],
    ]));

    let merge = MailMerge::new(fx.opts(transport)).await.unwrap();
    assert_eq!(merge.table().rows.len(), 4);

    let subjects: Vec<String> = merge
        .messages()
        .unwrap()
        .into_iter()
        .map(|m| m.subject)
        .collect();
    assert_eq!(subjects, vec!["Hi Alice", "Hi Bob"]);
}

#[tokio::test]
async fn test_extra_header_rows_are_excluded() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport::new(&[
        HEADER,
        &["Recipient", "Copy", "Hidden", "First name"],
        &["a@x.com", "", "", "Alice"],
    ]));
    let opts = Opts {
        header_row_count: 2,
        ..fx.opts(transport)
    };

    let merge = MailMerge::new(opts).await.unwrap();
    assert_eq!(merge.table().rows.len(), 1);
    assert_eq!(merge.messages().unwrap()[0].subject, "Hi Alice");
}

#[tokio::test]
async fn test_duplicate_base_name_in_either_order() {
    let fx = Fixture::new();
    let a = fx.write("a/logo.png", "a");
    let b = fx.write("b/logo.png", "b");

    for (inline, attachment) in [(a.clone(), b.clone()), (b, a)] {
        let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
        let opts = Opts {
            inline_files: vec![inline],
            attachment_files: vec![attachment],
            ..fx.opts(transport)
        };
        let err = MailMerge::new(opts).await.unwrap_err();
        assert!(
            matches!(&err, Error::DuplicateAsset { name, .. } if name == "logo.png"),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn test_duplicate_with_common_part() {
    let fx = Fixture::new();
    let logo = fx.write("logo.png", "png");
    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
    let opts = Opts {
        common_parts: vec![Part::file("brand/logo.png", Disposition::Inline)],
        attachment_files: vec![logo],
        ..fx.opts(transport)
    };
    let err = MailMerge::new(opts).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateAsset { .. }));
}

#[tokio::test]
async fn test_common_parts_come_first() {
    let fx = Fixture::new();
    let report = fx.write("report.pdf", "%PDF");
    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
    let footer = Part::text("Sent by the mail merge");
    let opts = Opts {
        common_parts: vec![footer.clone()],
        attachment_files: vec![report],
        ..fx.opts(transport)
    };

    let merge = MailMerge::new(opts).await.unwrap();
    assert_eq!(merge.shared_parts().len(), 2);
    assert_eq!(merge.shared_parts()[0], footer);
}

#[tokio::test]
async fn test_missing_asset() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
    let opts = Opts {
        inline_files: vec![fx.path("nope.png")],
        ..fx.opts(transport)
    };
    let err = MailMerge::new(opts).await.unwrap_err();
    assert!(matches!(err, Error::Asset { path, .. } if path.ends_with("nope.png")));
}

#[tokio::test]
async fn test_invalid_options_are_aggregated() {
    let opts: Opts<Arc<FakeTransport>> = Opts {
        header_row_count: 0,
        ..Opts::default()
    };
    match MailMerge::new(opts).await.unwrap_err() {
        Error::Config(err) => {
            assert_eq!(err.0.len(), 5);
            assert!(err.0.contains(&ValidationError::MissingTransport));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_template_file() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]]));
    let opts = Opts {
        html_template: Some(fx.path("missing.html")),
        ..fx.opts(transport)
    };
    let err = MailMerge::new(opts).await.unwrap_err();
    assert!(matches!(err, Error::Template(TemplateError::Read { .. })));
}

#[tokio::test]
async fn test_table_errors() {
    let fx = Fixture::new();

    let only_header = Arc::new(FakeTransport::new(&[HEADER, &["", "", "", ""]]));
    let err = MailMerge::new(fx.opts(only_header)).await.unwrap_err();
    assert!(matches!(err, Error::Table(TableError::NoRecipients)));

    let transport = Arc::new(FakeTransport::new(&[HEADER]));
    let opts = Opts {
        sheet_id: "missing".to_string(),
        ..fx.opts(transport)
    };
    let err = MailMerge::new(opts).await.unwrap_err();
    assert!(matches!(err, Error::Table(TableError::Source(_))));
}

#[tokio::test]
async fn test_transport_failure_reports_progress() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport {
        fail_at: Some(1),
        ..FakeTransport::new(&[
            HEADER,
            &["a@x.com", "", "", "Alice"],
            &["b@x.com", "", "", "Bob"],
            &["c@x.com", "", "", "Carol"],
        ])
    });

    let merge = MailMerge::new(fx.opts(transport.clone())).await.unwrap();
    let err = merge.send(&CancellationToken::new(), "").await.unwrap_err();

    assert!(matches!(err, Error::Transport { row: 2, sent: 1, .. }));
    assert_eq!(err.sent(), Some(1));
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(*transport.attempts.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_cancel_between_messages() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    let transport = Arc::new(FakeTransport {
        cancel_after: Some((1, cancel.clone())),
        ..FakeTransport::new(&[
            HEADER,
            &["a@x.com", "", "", "Alice"],
            &["b@x.com", "", "", "Bob"],
        ])
    });

    let merge = MailMerge::new(fx.opts(transport.clone())).await.unwrap();
    let err = merge.send(&cancel, "").await.unwrap_err();

    assert!(matches!(err, Error::Cancelled { sent: 1 }));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight_send() {
    let fx = Fixture::new();
    let transport = Arc::new(FakeTransport {
        hang: true,
        ..FakeTransport::new(&[HEADER, &["a@x.com", "", "", "Alice"]])
    });
    let merge = MailMerge::new(fx.opts(transport)).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let err = merge.send(&cancel, "").await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { sent: 0 }));
}

#[tokio::test]
async fn test_already_cancelled_sends_nothing() {
    let fx = Fixture::new();
    let transport = three_rows("b@x.com");
    let merge = MailMerge::new(fx.opts(transport.clone())).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = merge.send(&cancel, "").await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { sent: 0 }));
    assert!(transport.sent().is_empty());
}

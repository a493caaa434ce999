//! Composed outgoing messages and their RFC 5322 rendering.

use crate::address::AddressList;
use crate::content_type::{ContentType, quoted_string};
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::part::{Part, PartBody, PartsSet, is_valid_content_id};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of the random part of generated boundaries.
const BOUNDARY_LENGTH: usize = 28;

/// A sender-less message ready to hand to a transport.
///
/// The `From` header is left to the transport (Gmail fills in the
/// authenticated account).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWriter {
    /// To recipients.
    pub to: AddressList,
    /// Cc recipients.
    pub cc: AddressList,
    /// Bcc recipients.
    pub bcc: AddressList,
    /// Rendered subject.
    pub subject: String,
    /// Full MIME body.
    pub body: PartsSet,
}

impl MessageWriter {
    /// Combined number of To, Cc and Bcc entries.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Renders the message as RFC 5322 bytes.
    ///
    /// File-backed parts are read here. A `Bcc` header is written when Bcc
    /// recipients exist; transports that relay the raw bytes over SMTP must
    /// strip it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] if the message has no recipients,
    /// [`Error::EmptyMultipart`] if a container (including the text/HTML
    /// group) has no parts, [`Error::InvalidContentId`] if a part's
    /// Content-ID is not a valid `msg-id`, or [`Error::ReadPart`] if a
    /// referenced file cannot be read.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.recipient_count() == 0 {
            return Err(Error::NoRecipients);
        }

        let mut headers = Headers::new();
        if !self.to.is_empty() {
            headers.add("To", self.to.to_string());
        }
        if !self.cc.is_empty() {
            headers.add("Cc", self.cc.to_string());
        }
        if !self.bcc.is_empty() {
            headers.add("Bcc", self.bcc.to_string());
        }
        headers.add("Subject", encode_rfc2047(&self.subject));
        headers.add("Date", chrono::Local::now().to_rfc2822());
        headers.add("MIME-Version", "1.0");

        let mut out = String::new();
        write_multipart(&mut out, headers, &self.body)?;
        Ok(out.into_bytes())
    }
}

fn new_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LENGTH)
        .map(char::from)
        .collect();
    format!("mm_{suffix}")
}

fn write_multipart(out: &mut String, mut headers: Headers, set: &PartsSet) -> Result<()> {
    if set.parts.is_empty() {
        return Err(Error::EmptyMultipart(set.content_type.essence()));
    }

    let boundary = new_boundary();
    let content_type: ContentType = set
        .content_type
        .clone()
        .with_parameter("boundary", boundary.as_str());
    headers.add("Content-Type", content_type.to_string());

    out.push_str(&headers.to_string());
    out.push_str("\r\n");

    for part in &set.parts {
        out.push_str("--");
        out.push_str(&boundary);
        out.push_str("\r\n");
        write_part(out, part)?;
        out.push_str("\r\n");
    }

    out.push_str("--");
    out.push_str(&boundary);
    out.push_str("--\r\n");
    Ok(())
}

fn write_part(out: &mut String, part: &Part) -> Result<()> {
    let mut headers = Headers::new();

    if let Some(disposition) = part.disposition {
        let value = part.filename.as_ref().map_or_else(
            || disposition.to_string(),
            |name| format!("{disposition}; filename={}", quoted_string(&encode_rfc2047(name))),
        );
        headers.add("Content-Disposition", value);
    }
    if let Some(cid) = &part.content_id {
        if !is_valid_content_id(cid) {
            return Err(Error::InvalidContentId(cid.clone()));
        }
        headers.add("Content-ID", format!("<{cid}>"));
    }

    match &part.body {
        PartBody::Multipart(set) => return write_multipart(out, headers, set),
        PartBody::Bytes(bytes) if part.content_type.main_type == "text" => {
            headers.add("Content-Type", part.content_type.to_string());
            headers.add("Content-Transfer-Encoding", "quoted-printable");
            out.push_str(&headers.to_string());
            out.push_str("\r\n");
            out.push_str(&encode_quoted_printable(bytes));
            out.push_str("\r\n");
        }
        PartBody::Bytes(bytes) => {
            write_base64(out, headers, part, bytes);
        }
        PartBody::File(path) => {
            let bytes = std::fs::read(path).map_err(|source| Error::ReadPart {
                path: path.clone(),
                source,
            })?;
            write_base64(out, headers, part, &bytes);
        }
    }

    Ok(())
}

fn write_base64(out: &mut String, mut headers: Headers, part: &Part, bytes: &[u8]) {
    let content_type = part.filename.as_ref().map_or_else(
        || part.content_type.clone(),
        |name| {
            part.content_type
                .clone()
                .with_parameter("name", encode_rfc2047(name))
        },
    );
    headers.add("Content-Type", content_type.to_string());
    headers.add("Content-Transfer-Encoding", "base64");
    out.push_str(&headers.to_string());
    out.push_str("\r\n");
    out.push_str(&encode_base64_wrapped(bytes));
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
    use crate::encoding::{decode_base64, decode_quoted_printable};
    use crate::part::Disposition;
    use std::io::Write as _;

    fn message(body: PartsSet) -> MessageWriter {
        MessageWriter {
            to: AddressList::parse("Alice <alice@example.com>"),
            cc: AddressList::default(),
            bcc: AddressList::parse("audit@example.com"),
            subject: "Hi Alice".to_string(),
            body,
        }
    }

    fn boundary_of(rendered: &str, essence: &str) -> String {
        let marker = format!("Content-Type: {essence}; boundary=");
        let start = rendered.find(&marker).unwrap() + marker.len();
        rendered[start..].lines().next().unwrap().trim().to_string()
    }

    #[test]
    fn test_recipient_count() {
        let msg = message(PartsSet::new_mail(b"x", b"", &[]));
        assert_eq!(msg.recipient_count(), 2);
    }

    #[test]
    fn test_no_recipients_is_error() {
        let mut msg = message(PartsSet::new_mail(b"x", b"", &[]));
        msg.to = AddressList::default();
        msg.bcc = AddressList::default();
        assert!(matches!(msg.to_bytes(), Err(Error::NoRecipients)));
    }

    #[test]
    fn test_render_headers_and_bodies() {
        let msg = message(PartsSet::new_mail("Héllo Alice!".as_bytes(), b"<p>Hi</p>", &[]));
        let rendered = String::from_utf8(msg.to_bytes().unwrap()).unwrap();

        assert!(rendered.starts_with("To: Alice <alice@example.com>\r\nBcc: audit@example.com\r\nSubject: Hi Alice\r\n"));
        assert!(!rendered.contains("\r\nCc:"));
        assert!(rendered.contains("MIME-Version: 1.0\r\n"));

        let mixed = boundary_of(&rendered, "multipart/mixed");
        let alternative = boundary_of(&rendered, "multipart/alternative");
        assert_ne!(mixed, alternative);
        assert!(rendered.ends_with(&format!("--{mixed}--\r\n")));
        assert!(rendered.contains(&format!("--{alternative}--\r\n")));

        let encoded = "H=C3=A9llo Alice!";
        assert!(rendered.contains(encoded));
        assert_eq!(decode_quoted_printable(encoded).unwrap(), "Héllo Alice!".as_bytes());
        assert!(rendered.contains("Content-Type: text/html; charset=utf-8\r\n"));
    }

    #[test]
    fn test_render_reads_files_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        let shared = vec![Part::file(&path, Disposition::Inline)];
        let msg = message(PartsSet::new_mail(b"", b"<img src=\"cid:logo.png\">", &shared));

        // Not created yet: building the message must not have read it.
        assert!(matches!(msg.to_bytes(), Err(Error::ReadPart { .. })));

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
        drop(file);

        let rendered = String::from_utf8(msg.to_bytes().unwrap()).unwrap();
        assert!(rendered.contains("Content-Disposition: inline; filename=\"logo.png\"\r\n"));
        assert!(rendered.contains("Content-ID: <logo.png>\r\n"));
        assert!(rendered.contains("Content-Type: image/png; name=logo.png\r\n"));
        assert!(rendered.contains("Content-Transfer-Encoding: base64\r\n"));

        let encoded = encode_base64_wrapped(&[0x89, b'P', b'N', b'G']);
        assert!(rendered.contains(&encoded));
        assert_eq!(decode_base64(&encoded).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_empty_body_group_is_error() {
        let msg = message(PartsSet::new_mail(b"", b"", &[]));
        match msg.to_bytes() {
            Err(Error::EmptyMultipart(essence)) => assert_eq!(essence, "multipart/alternative"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_filename_quotes_are_escaped() {
        let report = Part {
            disposition: Some(Disposition::Attachment),
            filename: Some(r#"the "final" report.bin"#.to_string()),
            ..Part::bytes(ContentType::new("application", "octet-stream"), b"data".to_vec())
        };
        let msg = message(PartsSet::new_mail(b"see attached", b"", &[report]));
        let rendered = String::from_utf8(msg.to_bytes().unwrap()).unwrap();

        assert!(rendered.contains(
            "Content-Disposition: attachment; filename=\"the \\\"final\\\" report.bin\"\r\n"
        ));
        assert!(rendered.contains(
            "Content-Type: application/octet-stream; name=\"the \\\"final\\\" report.bin\"\r\n"
        ));
    }

    #[test]
    fn test_invalid_content_id_is_error() {
        let logo = Part {
            disposition: Some(Disposition::Inline),
            filename: Some("my logo.png".to_string()),
            content_id: Some("my logo.png".to_string()),
            ..Part::bytes(ContentType::new("image", "png"), b"png".to_vec())
        };
        let msg = message(PartsSet::new_mail(b"", b"<img src=\"cid:my logo.png\">", &[logo]));
        match msg.to_bytes() {
            Err(Error::InvalidContentId(id)) => assert_eq!(id, "my logo.png"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_long_subject_is_folded() {
        let mut msg = message(PartsSet::new_mail(b"x", b"", &[]));
        msg.subject = "Invitation à la réunion annuelle des bénévoles de l'association".to_string();
        let rendered = String::from_utf8(msg.to_bytes().unwrap()).unwrap();

        let folded = encode_rfc2047(&msg.subject);
        assert!(folded.contains("\r\n "));
        assert!(rendered.contains(&format!("Subject: {folded}\r\nDate: ")));
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(new_boundary(), new_boundary());
        assert!(new_boundary().starts_with("mm_"));
    }
}

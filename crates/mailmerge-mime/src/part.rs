//! MIME part tree used to compose outgoing messages.
//!
//! File-backed parts keep only the path; contents are read when the message
//! is rendered with [`crate::MessageWriter::to_bytes`].

use crate::content_type::ContentType;
use std::fmt;
use std::path::{Path, PathBuf};

/// Content-Disposition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Displayed inline, referenced from HTML via `cid:`.
    Inline,
    /// Offered as a downloadable attachment.
    Attachment,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

/// Body of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// In-memory bytes.
    Bytes(Vec<u8>),
    /// Reference to a file read at render time.
    File(PathBuf),
    /// Nested multipart container.
    Multipart(PartsSet),
}

/// A single MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Content type (without boundary; boundaries are chosen when rendering).
    pub content_type: ContentType,
    /// Disposition, if any.
    pub disposition: Option<Disposition>,
    /// Filename advertised in Content-Disposition.
    pub filename: Option<String>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Part body.
    pub body: PartBody,
}

impl Part {
    /// Creates a text/plain part.
    #[must_use]
    pub fn text(body: impl Into<Vec<u8>>) -> Self {
        Self::bytes(ContentType::text_plain(), body)
    }

    /// Creates a text/html part.
    #[must_use]
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::bytes(ContentType::text_html(), body)
    }

    /// Creates an in-memory part with the given content type.
    #[must_use]
    pub fn bytes(content_type: ContentType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            disposition: None,
            filename: None,
            content_id: None,
            body: PartBody::Bytes(body.into()),
        }
    }

    /// Creates a file-backed part.
    ///
    /// The content type is guessed from the extension. Inline parts get a
    /// Content-ID equal to the file's base name so HTML can reference them
    /// as `cid:<basename>`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, disposition: Disposition) -> Self {
        let path = path.into();
        let filename = base_name(&path);
        let content_id = (disposition == Disposition::Inline)
            .then(|| filename.clone())
            .flatten();
        Self {
            content_type: ContentType::from_path(&path),
            disposition: Some(disposition),
            filename,
            content_id,
            body: PartBody::File(path),
        }
    }

    /// Wraps a parts set as a nested multipart part.
    #[must_use]
    pub fn multipart(set: PartsSet) -> Self {
        Self {
            content_type: set.content_type.clone(),
            disposition: None,
            filename: None,
            content_id: None,
            body: PartBody::Multipart(set),
        }
    }

    /// Returns the in-memory body bytes, if this part has any.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            PartBody::Bytes(bytes) => Some(bytes),
            PartBody::File(_) | PartBody::Multipart(_) => None,
        }
    }

    /// Returns the nested set for multipart parts.
    #[must_use]
    pub const fn as_multipart(&self) -> Option<&PartsSet> {
        match &self.body {
            PartBody::Multipart(set) => Some(set),
            PartBody::Bytes(_) | PartBody::File(_) => None,
        }
    }
}

/// Returns the final path component as a string.
#[must_use]
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Checks that `id` can be written as `<id>` in a `Content-ID` header.
///
/// Accepts non-empty ASCII made of RFC 5322 `atext` characters plus `.` and
/// `@`, the characters of a `dot-atom` `msg-id`.
#[must_use]
pub fn is_valid_content_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-/=?^_`{|}~.@".contains(&b))
}

/// Ordered multipart container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartsSet {
    /// Multipart content type (`multipart/mixed`, `multipart/alternative`).
    pub content_type: ContentType,
    /// Child parts in order.
    pub parts: Vec<Part>,
}

impl PartsSet {
    /// Creates an empty `multipart/mixed` set.
    #[must_use]
    pub fn mixed() -> Self {
        Self {
            content_type: ContentType::multipart_mixed(),
            parts: Vec::new(),
        }
    }

    /// Creates an empty `multipart/alternative` set.
    #[must_use]
    pub fn alternative() -> Self {
        Self {
            content_type: ContentType::multipart_alternative(),
            parts: Vec::new(),
        }
    }

    /// Appends a part.
    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Builds the body of a mail-merge message.
    ///
    /// The rendered text and HTML bodies go into a `multipart/alternative`
    /// group (empty bodies are left out), which becomes the first child of a
    /// `multipart/mixed` container followed by clones of `shared` (inline and
    /// attachment parts).
    #[must_use]
    pub fn new_mail(text: &[u8], html: &[u8], shared: &[Part]) -> Self {
        let mut alternative = Self::alternative();
        if !text.is_empty() {
            alternative.push(Part::text(text));
        }
        if !html.is_empty() {
            alternative.push(Part::html(html));
        }

        let mut mixed = Self::mixed();
        mixed.push(Part::multipart(alternative));
        mixed.parts.extend(shared.iter().cloned());
        mixed
    }

    /// Returns the `multipart/alternative` child, if present.
    #[must_use]
    pub fn alternative_part(&self) -> Option<&Self> {
        self.parts.iter().find_map(|p| {
            p.as_multipart()
                .filter(|set| set.content_type.sub_type == "alternative")
        })
    }

    /// Returns the parts that are not the alternative body group.
    pub fn siblings(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| {
            p.as_multipart()
                .is_none_or(|set| set.content_type.sub_type != "alternative")
        })
    }

    /// Returns the body of the first part with the given essence, searching
    /// the alternative group.
    fn body_of(&self, essence: &str) -> &[u8] {
        self.alternative_part()
            .into_iter()
            .flat_map(|set| set.parts.iter())
            .find(|p| p.content_type.essence() == essence)
            .and_then(Part::body_bytes)
            .unwrap_or_default()
    }

    /// Rendered plain-text body, or empty.
    #[must_use]
    pub fn text_body(&self) -> &[u8] {
        self.body_of("text/plain")
    }

    /// Rendered HTML body, or empty.
    #[must_use]
    pub fn html_body(&self) -> &[u8] {
        self.body_of("text/html")
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
    fn test_file_part_inline_has_content_id() {
        let part = Part::file("/assets/img/logo.png", Disposition::Inline);
        assert_eq!(part.content_id.as_deref(), Some("logo.png"));
        assert_eq!(part.filename.as_deref(), Some("logo.png"));
        assert_eq!(part.content_type.essence(), "image/png");
        assert_eq!(part.body, PartBody::File(PathBuf::from("/assets/img/logo.png")));
    }

    #[test]
    fn test_file_part_attachment_has_no_content_id() {
        let part = Part::file("docs/report.pdf", Disposition::Attachment);
        assert!(part.content_id.is_none());
        assert_eq!(part.disposition, Some(Disposition::Attachment));
    }

    #[test]
    fn test_content_id_characters() {
        assert!(is_valid_content_id("logo.png"));
        assert!(is_valid_content_id("logo-2024_v1.png"));
        assert!(is_valid_content_id("part1@example.com"));
        assert!(!is_valid_content_id(""));
        assert!(!is_valid_content_id("my logo.png"));
        assert!(!is_valid_content_id("logo>.png"));
        assert!(!is_valid_content_id("bad\"name.png"));
        assert!(!is_valid_content_id("café.png"));
    }

    #[test]
    fn test_new_mail_structure() {
        let shared = vec![
            Part::file("cover.jpg", Disposition::Inline),
            Part::file("report.pdf", Disposition::Attachment),
        ];
        let set = PartsSet::new_mail(b"hi", b"<p>hi</p>", &shared);

        assert_eq!(set.content_type.essence(), "multipart/mixed");
        assert_eq!(set.parts.len(), 3);
        let alternative = set.alternative_part().unwrap();
        assert_eq!(alternative.parts.len(), 2);
        assert_eq!(set.text_body(), b"hi");
        assert_eq!(set.html_body(), b"<p>hi</p>");
        assert_eq!(set.siblings().count(), 2);
    }

    #[test]
    fn test_new_mail_skips_empty_bodies() {
        let set = PartsSet::new_mail(b"only text", b"", &[]);
        let alternative = set.alternative_part().unwrap();
        assert_eq!(alternative.parts.len(), 1);
        assert!(set.html_body().is_empty());
    }

    #[test]
    fn test_new_mail_does_not_touch_shared() {
        let shared = vec![Part::file("a.txt", Disposition::Attachment)];
        let before = shared.clone();
        let _ = PartsSet::new_mail(b"x", b"", &shared);
        assert_eq!(shared, before);
    }
}

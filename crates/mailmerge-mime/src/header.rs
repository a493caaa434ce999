//! MIME header handling.

use std::fmt;

/// Ordered collection of message or part headers.
///
/// Headers are written back exactly as they were added, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }
}

impl fmt::Display for Headers {
    /// Writes each header as a CRLF-terminated line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
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

    #[test]
    fn test_headers_display_keeps_order() {
        let mut headers = Headers::new();
        headers.add("To", "recipient@example.com");
        headers.add("Subject", "Test");
        headers.add("MIME-Version", "1.0");

        assert_eq!(
            headers.to_string(),
            "To: recipient@example.com\r\nSubject: Test\r\nMIME-Version: 1.0\r\n"
        );
    }

    #[test]
    fn test_headers_keep_repeated_names() {
        let mut headers = Headers::new();
        headers.add("Received", "from a");
        headers.add("Received", "from b");
        assert_eq!(headers.to_string(), "Received: from a\r\nReceived: from b\r\n");
    }
}

//! Transfer encodings for generated messages.
//!
//! Base64 (wrapped to 76 columns), Quoted-Printable with hard line breaks
//! preserved, and RFC 2047 encoded-words for header values.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use std::fmt::Write as _;

/// Maximum encoded line length (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single encoded-word (RFC 2047 section 2).
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Raw bytes per encoded-word: `=?utf-8?B?` and `?=` leave 63 columns,
/// which hold 15 base64 quanta.
const MAX_ENCODED_WORD_BYTES: usize = 45;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 broken into CRLF-terminated 76 column lines.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);

    // Base64 output is pure ASCII, so byte chunks are valid char boundaries.
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        result.push_str(&String::from_utf8_lossy(chunk));
        result.push_str("\r\n");
    }

    result
}

/// Encodes a full RFC 5322 message for the Gmail `raw` field.
#[must_use]
pub fn encode_base64_url(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

/// Decodes Base64 data, ignoring embedded line breaks.
#[cfg(test)]
pub(crate) fn decode_base64(data: &str) -> Option<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).ok()
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (`\n` or `\r\n`) become hard CRLF breaks; long
/// lines get soft breaks so no encoded line exceeds 76 columns.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::new();
    let mut line_length = 0;

    let mut lines = data.split(|b| *b == b'\n').peekable();
    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        for (i, byte) in line.iter().enumerate() {
            let is_last = i + 1 == line.len();
            let literal = match byte {
                b'!'..=b'<' | b'>'..=b'~' => true,
                // Trailing whitespace must be encoded
                b' ' | b'\t' => !is_last,
                _ => false,
            };
            let width = if literal { 1 } else { 3 };

            if line_length + width > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if literal {
                result.push(*byte as char);
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += width;
        }

        if lines.peek().is_some() {
            result.push_str("\r\n");
            line_length = 0;
        }
    }

    result
}

/// Decodes Quoted-Printable text, returning `None` on a broken escape.
#[cfg(test)]
pub(crate) fn decode_quoted_printable(text: &str) -> Option<Vec<u8>> {
    let mut result = Vec::new();
    let mut bytes = text.bytes().peekable();

    while let Some(byte) = bytes.next() {
        if byte != b'=' {
            result.push(byte);
            continue;
        }

        // Soft line break
        if bytes.peek() == Some(&b'\r') {
            bytes.next();
        }
        if bytes.peek() == Some(&b'\n') {
            bytes.next();
            continue;
        }

        let hex: Vec<u8> = bytes.by_ref().take(2).collect();
        let hex = std::str::from_utf8(&hex).ok().filter(|h| h.len() == 2)?;
        result.push(u8::from_str_radix(hex, 16).ok()?);
    }

    Some(result)
}

/// Encodes a header value as RFC 2047 encoded-words when it is not plain
/// ASCII.
///
/// Format: `=?utf-8?B?encoded-text?=`. Long values are split on character
/// boundaries into words of at most 75 columns, folded with CRLF and a space.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '=' && c != '?')
    {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, c) in text.char_indices() {
        if idx + c.len_utf8() - start > MAX_ENCODED_WORD_BYTES {
            words.push(encoded_word(&text[start..end]));
            start = end;
        }
        end = idx + c.len_utf8();
    }
    words.push(encoded_word(&text[start..end]));
    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    let word = format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes()));
    debug_assert!(word.len() <= MAX_ENCODED_WORD_LENGTH);
    word
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
    fn test_base64_wrapped_line_length() {
        let data = vec![0xABu8; 200];
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_url_has_no_plus_or_slash() {
        let encoded = encode_base64_url(&[0xFB, 0xFF, 0xFE]);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_keeps_line_breaks() {
        let encoded = encode_quoted_printable(b"line one\nline two\r\nthree");
        assert_eq!(encoded, "line one\r\nline two\r\nthree");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        let encoded = encode_quoted_printable("Héllo".as_bytes());
        assert_eq!(encoded, "H=C3=A9llo");
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), "Héllo".as_bytes());
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable(b"end "), "end=20");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(text.as_bytes());
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text.as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode_incomplete() {
        assert!(decode_quoted_printable("abc=4").is_none());
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hi Alice"), "Hi Alice");

        let encoded = encode_rfc2047("Héllo");
        assert_eq!(encoded, "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_splits_long_values() {
        let subject = "Réunion trimestrielle des équipes commerciales et techniques à Genève";
        let encoded = encode_rfc2047(subject);
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);

        let mut decoded = Vec::new();
        for word in words {
            assert!(word.len() <= MAX_ENCODED_WORD_LENGTH, "{word}");
            let payload = word
                .strip_prefix("=?utf-8?B?")
                .and_then(|w| w.strip_suffix("?="))
                .unwrap();
            let bytes = decode_base64(payload).unwrap();
            // Each word holds whole characters.
            assert!(std::str::from_utf8(&bytes).is_ok());
            decoded.extend(bytes);
        }
        assert_eq!(decoded, subject.as_bytes());
    }

    #[test]
    fn test_rfc2047_multibyte_chunks_stay_whole() {
        let text = "日本語".repeat(20);
        for word in encode_rfc2047(&text).split("\r\n ") {
            assert!(word.len() <= MAX_ENCODED_WORD_LENGTH);
        }
    }
}

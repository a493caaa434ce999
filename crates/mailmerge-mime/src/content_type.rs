//! MIME content type handling.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx), written in key order.
    pub parameters: BTreeMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates a multipart/mixed content type without a boundary.
    #[must_use]
    pub fn multipart_mixed() -> Self {
        Self::new("multipart", "mixed")
    }

    /// Creates a multipart/alternative content type without a boundary.
    #[must_use]
    pub fn multipart_alternative() -> Self {
        Self::new("multipart", "alternative")
    }

    /// Guesses the content type of a file from its extension.
    ///
    /// Unknown extensions map to `application/octet-stream`.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let guess = mime_guess::from_path(path).first_or_octet_stream();
        Self::new(guess.type_().as_str(), guess.subtype().as_str())
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns the `type/subtype` essence without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        for (key, value) in &self.parameters {
            // Quote value if it contains special characters
            if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
                write!(f, "; {key}={}", quoted_string(value))?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

/// Wraps `value` in double quotes, escaping `\` and `"` (RFC 5322 `quoted-string`).
pub(crate) fn quoted_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.essence(), "text/plain");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_multipart_boundary() {
        let ct = ContentType::multipart_mixed().with_parameter("boundary", "b1");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=b1");
    }

    #[test]
    fn test_display_quotes_special_values() {
        let ct = ContentType::new("image", "png").with_parameter("name", "my logo.png");
        assert_eq!(ct.to_string(), "image/png; name=\"my logo.png\"");
    }

    #[test]
    fn test_display_escapes_quotes() {
        let ct = ContentType::new("text", "csv").with_parameter("name", r#"q"4\data.csv"#);
        assert_eq!(ct.to_string(), r#"text/csv; name="q\"4\\data.csv""#);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(ContentType::from_path(Path::new("cover.jpg")).essence(), "image/jpeg");
        assert_eq!(ContentType::from_path(Path::new("report.pdf")).essence(), "application/pdf");
        assert_eq!(
            ContentType::from_path(Path::new("blob.unknownext")).essence(),
            "application/octet-stream"
        );
    }
}

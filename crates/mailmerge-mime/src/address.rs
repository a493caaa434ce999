//! Recipient address lists.
//!
//! Spreadsheet cells hold free-form recipient lists such as
//! `Alice <alice@example.com>; bob@example.com`. Parsing never fails: a token
//! that is not a structurally valid address is kept as [`Address::Bare`] so the
//! caller can decide what to do with it.

use crate::encoding::encode_rfc2047;
use std::fmt;

/// A parsed mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address (`local@domain`).
    pub email: String,
}

impl Mailbox {
    /// Parses a single `addr@domain` or `Name <addr@domain>` token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();

        if let Some(open) = token.rfind('<') {
            let email = token[open + 1..].strip_suffix('>')?.trim();
            if !is_valid_email(email) {
                return None;
            }
            let name = token[..open].trim().trim_matches('"').trim();
            return Some(Self {
                name: (!name.is_empty()).then(|| name.to_string()),
                email: email.to_string(),
            });
        }

        is_valid_email(token).then(|| Self {
            name: None,
            email: token.to_string(),
        })
    }
}

impl fmt::Display for Mailbox {
    /// Formats the mailbox for use in a header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => {
                let encoded = encode_rfc2047(name);
                if encoded != *name
                    || !name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c))
                {
                    write!(f, "{encoded} <{}>", self.email)
                } else {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "\"{escaped}\" <{}>", self.email)
                }
            }
            None => write!(f, "{}", self.email),
        }
    }
}

/// One entry of a recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// A structurally valid mailbox.
    Mailbox(Mailbox),
    /// A token that could not be parsed, kept verbatim.
    Bare(String),
}

impl Address {
    /// Returns the mailbox if this entry parsed.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&Mailbox> {
        match self {
            Self::Mailbox(mailbox) => Some(mailbox),
            Self::Bare(_) => None,
        }
    }

    /// Returns true if the entry carries no usable address.
    #[must_use]
    pub const fn is_bare(&self) -> bool {
        matches!(self, Self::Bare(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mailbox(mailbox) => mailbox.fmt(f),
            Self::Bare(raw) => f.write_str(raw),
        }
    }
}

/// Ordered list of recipient addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList(Vec<Address>);

impl AddressList {
    /// Parses a comma or semicolon separated recipient list.
    ///
    /// Separators inside double quotes or angle brackets are not split on.
    /// Empty tokens are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let addresses = split_tokens(raw)
            .into_iter()
            .map(|token| {
                Mailbox::parse(token)
                    .map_or_else(|| Address::Bare(token.to_string()), Address::Mailbox)
            })
            .collect();
        Self(addresses)
    }

    /// Returns the entries that failed to parse as an address.
    #[must_use]
    pub fn filter_without_address(&self) -> Vec<&Address> {
        self.0.iter().filter(|a| a.is_bare()).collect()
    }

    /// Iterates over the successfully parsed mailboxes.
    pub fn mailboxes(&self) -> impl Iterator<Item = &Mailbox> {
        self.0.iter().filter_map(Address::mailbox)
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Address>> for AddressList {
    fn from(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }
}

impl fmt::Display for AddressList {
    /// Joins the entries with `", "` for a header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, address) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            address.fmt(f)?;
        }
        Ok(())
    }
}

fn split_tokens(raw: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;

    for (i, c) in raw.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' | ';' if !in_quotes && !in_angle => {
                tokens.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(raw[start..].trim());

    tokens.retain(|t| !t.is_empty());
    tokens
}

/// Structural address check: one `@`, non-empty local part and domain, no
/// whitespace or bracket characters, no empty domain labels.
fn is_valid_email(addr: &str) -> bool {
    if addr.is_empty() || addr.contains(|c: char| c.is_whitespace() || "<>\",;".contains(c)) {
        return false;
    }

    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    domain.split('.').all(|label| !label.is_empty())
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
    use proptest::prelude::*;

    #[test]
    fn test_parse_single() {
        let list = AddressList::parse("a@x.com");
        assert_eq!(list.len(), 1);
        assert_eq!(list.mailboxes().next().unwrap().email, "a@x.com");
        assert!(list.filter_without_address().is_empty());
    }

    #[test]
    fn test_parse_mixed_separators() {
        let list = AddressList::parse(" a@x.com , b@y.org;c@z.net ;; ");
        let emails: Vec<_> = list.mailboxes().map(|m| m.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@y.org", "c@z.net"]);
    }

    #[test]
    fn test_parse_display_name() {
        let list = AddressList::parse("\"Doe, John\" <john@example.com>, Alice <alice@example.com>");
        let mailboxes: Vec<_> = list.mailboxes().collect();
        assert_eq!(mailboxes.len(), 2);
        assert_eq!(mailboxes[0].name.as_deref(), Some("Doe, John"));
        assert_eq!(mailboxes[0].email, "john@example.com");
        assert_eq!(mailboxes[1].name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(AddressList::parse("").is_empty());
        assert!(AddressList::parse("  ,  ; ").is_empty());
    }

    #[test]
    fn test_invalid_kept_as_bare() {
        let list = AddressList::parse("not-an-email, ok@example.com");
        assert_eq!(list.len(), 2);
        let bad = list.filter_without_address();
        assert_eq!(bad, vec![&Address::Bare("not-an-email".to_string())]);
        assert_eq!(list.mailboxes().count(), 1);
    }

    #[test]
    fn test_invalid_shapes() {
        for raw in ["@example.com", "user@", "a@@b.com", "a b@c.com", "a@b..com", "Name <nope>"] {
            let list = AddressList::parse(raw);
            assert_eq!(list.filter_without_address().len(), 1, "{raw}");
        }
    }

    #[test]
    fn test_display() {
        let list = AddressList::parse("Alice <alice@example.com>; bob@example.com");
        assert_eq!(list.to_string(), "Alice <alice@example.com>, bob@example.com");

        let list = AddressList::parse("\"Doe, John\" <john@example.com>");
        assert_eq!(list.to_string(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_display_non_ascii_name() {
        let list = AddressList::parse("Zoë <zoe@example.com>");
        assert_eq!(list.to_string(), "=?utf-8?B?Wm/Dqw==?= <zoe@example.com>");
    }

    proptest! {
        #[test]
        fn parse_keeps_every_non_empty_token(tokens in proptest::collection::vec("[a-z0-9@.]{1,12}", 0..8)) {
            let raw = tokens.join(",");
            let list = AddressList::parse(&raw);
            prop_assert_eq!(list.len(), tokens.len());
            prop_assert_eq!(
                list.mailboxes().count() + list.filter_without_address().len(),
                tokens.len()
            );
        }
    }
}

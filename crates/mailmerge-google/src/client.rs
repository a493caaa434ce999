//! Bearer-token HTTP client shared by the Sheets and Gmail endpoints.

use crate::error::{Error, Result};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::debug;
use url::Url;

/// Base URL of the Sheets API v4.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/";
/// Base URL of the Gmail API v1.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/";

/// Google API client authenticated with an `OAuth2` access token.
///
/// One client serves both as the recipient [`TableSource`] (Sheets) and as the
/// [`MailSender`] (Gmail).
///
/// [`TableSource`]: mailmerge_core::TableSource
/// [`MailSender`]: mailmerge_core::MailSender
#[derive(Clone)]
pub struct GoogleClient {
    http: Client,
    access_token: String,
    sheets_base: Url,
    gmail_base: Url,
}

impl GoogleClient {
    /// Creates a client for the public Google endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in base URLs fail to parse.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            access_token: access_token.into(),
            sheets_base: Url::parse(SHEETS_API_BASE)?,
            gmail_base: Url::parse(GMAIL_API_BASE)?,
        })
    }

    /// Overrides the Sheets API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_sheets_base(mut self, base: impl AsRef<str>) -> Result<Self> {
        self.sheets_base = Url::parse(base.as_ref())?;
        Ok(self)
    }

    /// Overrides the Gmail API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_gmail_base(mut self, base: impl AsRef<str>) -> Result<Self> {
        self.gmail_base = Url::parse(base.as_ref())?;
        Ok(self)
    }

    pub(crate) fn sheets_url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.sheets_base, segments)
    }

    pub(crate) fn gmail_url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.gmail_base, segments)
    }

    /// GET a JSON response.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(method = "GET", %url, "Google API request");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        read_json(response).await
    }

    /// POST a JSON body, return JSON.
    pub(crate) async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method = "POST", %url, "Google API request");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

impl fmt::Debug for GoogleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleClient")
            .field("access_token", &"<redacted>")
            .field("sheets_base", &self.sheets_base.as_str())
            .field("gmail_base", &self.gmail_base.as_str())
            .finish_non_exhaustive()
    }
}

/// Appends percent-encoded path segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::InvalidBase(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::from_response(status.as_u16(), &body));
    }
    Ok(response.json().await?)
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
    fn test_endpoint_construction() {
        let client = GoogleClient::new("token").unwrap();
        let url = client.sheets_url(&["spreadsheets", "abc"]).unwrap();
        assert_eq!(url.as_str(), "https://sheets.googleapis.com/v4/spreadsheets/abc");

        let url = client
            .gmail_url(&["users", "me", "messages", "send"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gmail.googleapis.com/gmail/v1/users/me/messages/send"
        );
    }

    #[test]
    fn test_segments_are_encoded() {
        let client = GoogleClient::new("token").unwrap();
        let url = client
            .sheets_url(&["spreadsheets", "abc", "values", "'My Sheet'"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'My%20Sheet'"
        );

        let url = client.gmail_url(&["users", "a/b@x.com"]).unwrap();
        assert!(url.as_str().ends_with("/users/a%2Fb@x.com"));
    }

    #[test]
    fn test_base_override() {
        let client = GoogleClient::new("token")
            .unwrap()
            .with_sheets_base("http://127.0.0.1:8080/sheets")
            .unwrap();
        let url = client.sheets_url(&["spreadsheets", "abc"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/sheets/spreadsheets/abc");
    }

    #[test]
    fn test_invalid_base() {
        let client = GoogleClient::new("token")
            .unwrap()
            .with_gmail_base("mailto:nobody@example.com")
            .unwrap();
        assert!(matches!(client.gmail_url(&["users"]), Err(Error::InvalidBase(_))));
        assert!(GoogleClient::new("token").unwrap().with_sheets_base("not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = GoogleClient::new("secret-token").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}

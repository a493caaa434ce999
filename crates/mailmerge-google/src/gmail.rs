//! Gmail transport.

use crate::client::GoogleClient;
use crate::error::{Error, Result};
use mailmerge_core::{MailSender, USER_ID_ME};
use mailmerge_mime::MessageWriter;
use mailmerge_mime::encoding::encode_base64_url;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::debug;

/// Body of `users.messages.send`.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

/// Response of `users.messages.send`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    /// Gmail message id.
    pub id: String,
    /// Thread the message was added to.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl GoogleClient {
    /// Sends an RFC 822 message through Gmail.
    ///
    /// A blank `user_id` means the authenticated account.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be rendered (for example an
    /// attachment is no longer readable) or the API rejects it.
    pub async fn send_message(&self, user_id: &str, message: &MessageWriter) -> Result<SentMessage> {
        let user_id = match user_id.trim() {
            "" => USER_ID_ME,
            id => id,
        };

        let raw = encode_base64_url(&message.to_bytes()?);
        let url = self.gmail_url(&["users", user_id, "messages", "send"])?;
        let sent: SentMessage = self.post_json(url, &SendRequest { raw: &raw }).await?;

        debug!(id = %sent.id, thread_id = sent.thread_id.as_deref(), "Gmail accepted message");
        Ok(sent)
    }
}

impl MailSender for GoogleClient {
    type Error = Error;

    fn send(
        &self,
        user_id: &str,
        message: &MessageWriter,
    ) -> impl Future<Output = Result<String>> + Send {
        async move { Ok(self.send_message(user_id, message).await?.id) }
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
    use mailmerge_mime::{AddressList, PartsSet};

    #[test]
    fn test_send_request_shape() {
        let body = serde_json::to_value(SendRequest { raw: "VG86IGFAeC5jb20" }).unwrap();
        assert_eq!(body, serde_json::json!({"raw": "VG86IGFAeC5jb20"}));
    }

    #[test]
    fn test_sent_message_deserialize() {
        let sent: SentMessage = serde_json::from_str(
            r#"{"id": "18c1", "threadId": "18c0", "labelIds": ["SENT"]}"#,
        )
        .unwrap();
        assert_eq!(sent.id, "18c1");
        assert_eq!(sent.thread_id.as_deref(), Some("18c0"));

        let sent: SentMessage = serde_json::from_str(r#"{"id": "18c2"}"#).unwrap();
        assert!(sent.thread_id.is_none());
    }

    #[tokio::test]
    async fn test_unrenderable_message_fails_before_request() {
        // Unroutable base: the test fails loudly if a request is attempted.
        let client = GoogleClient::new("token")
            .unwrap()
            .with_gmail_base("http://127.0.0.1:9/")
            .unwrap();
        let message = MessageWriter {
            to: AddressList::default(),
            cc: AddressList::default(),
            bcc: AddressList::default(),
            subject: "Hi".to_string(),
            body: PartsSet::new_mail(b"Hello", b"", &[]),
        };

        let err = MailSender::send(&client, "", &message).await.unwrap_err();
        assert!(matches!(err, Error::Mime(mailmerge_mime::Error::NoRecipients)));
    }
}

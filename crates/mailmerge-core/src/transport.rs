//! Outgoing mail transport.

use mailmerge_mime::MessageWriter;
use std::future::Future;
use std::sync::Arc;

/// User id meaning "the authenticated account".
pub const USER_ID_ME: &str = "me";

/// Sends one composed message.
///
/// Implementations may retry internally; the merge treats any returned error
/// as final for that message.
pub trait MailSender {
    /// Error returned by the transport.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `message` on behalf of `user_id` and returns the provider's
    /// message id.
    fn send(
        &self,
        user_id: &str,
        message: &MessageWriter,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

impl<T: MailSender + Send + Sync> MailSender for Arc<T> {
    type Error = T::Error;

    fn send(
        &self,
        user_id: &str,
        message: &MessageWriter,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send {
        (**self).send(user_id, message)
    }
}

mod api;
mod smtp;

use async_trait::async_trait;

use crate::domain::PersonalizedEmail;

pub use api::ApiEmailClient;
pub use smtp::SmtpEmailClient;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("authentication error, {0}")]
    Authentication(String),
    #[error("transport error, {0}")]
    Transport(String),
    #[error("couldn't build the message, {0}")]
    InvalidMessage(String),
}

/// The transport-level send primitive. Implementations own their credentials
/// and server address; callers only hand over a rendered message.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, email: PersonalizedEmail) -> Result<(), SendError>;
}

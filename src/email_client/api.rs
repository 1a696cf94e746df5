use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use super::{EmailSender, SendError};
use crate::domain::{EmailAddress, PersonalizedEmail};

/// Sends through a Postmark-style HTTP email API.
pub struct ApiEmailClient {
    http_client: Client,
    base_url: String,
    sender: EmailAddress,
    authorization_token: SecretString,
}

impl ApiEmailClient {
    pub fn new(
        base_url: String,
        sender: EmailAddress,
        authorization_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }
}

#[async_trait]
impl EmailSender for ApiEmailClient {
    #[tracing::instrument(
        name = "Sending an email through the API",
        skip(self, email),
        fields(recipient = %email.recipient)
    )]
    async fn send_email(&self, email: PersonalizedEmail) -> Result<(), SendError> {
        let url = format!("{}/email", self.base_url);
        let attachment = &email.attachment;
        let request_body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: email.recipient.as_ref(),
            subject: &email.subject,
            text_body: &email.body,
            attachments: vec![AttachmentBody {
                name: &attachment.filename,
                content: general_purpose::STANDARD.encode(&attachment.content),
                content_type: &attachment.content_type,
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Err(
                SendError::Authentication(format!("email API rejected the credentials ({})", status)),
            ),
            status => Err(SendError::Transport(format!(
                "email API responded with {}",
                status
            ))),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    attachments: Vec<AttachmentBody<'a>>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentBody<'a> {
    name: &'a str,
    content: String,
    content_type: &'a str,
}

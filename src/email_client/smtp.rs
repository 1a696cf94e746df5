use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        self,
        authentication::Credentials,
        response::{Category, Code, Severity},
    },
};
use secrecy::{ExposeSecret, SecretString};

use super::{EmailSender, SendError};
use crate::{
    configuration::SmtpTls,
    domain::{EmailAddress, PersonalizedEmail},
};

pub struct SmtpEmailClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpEmailClient {
    pub fn new(
        host: &str,
        port: u16,
        tls: SmtpTls,
        username: String,
        password: &SecretString,
        sender: EmailAddress,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let builder = match tls {
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let transport = builder
            .port(port)
            .credentials(Credentials::new(
                username,
                password.expose_secret().to_owned(),
            ))
            .timeout(Some(timeout))
            .build();
        let sender = sender.as_ref().parse::<Mailbox>()?;

        Ok(Self { transport, sender })
    }

    fn build_message(&self, email: PersonalizedEmail) -> Result<Message, SendError> {
        let to = email
            .recipient
            .as_ref()
            .parse::<Mailbox>()
            .map_err(|e| SendError::InvalidMessage(e.to_string()))?;
        let content_type = ContentType::parse(&email.attachment.content_type)
            .or_else(|_| ContentType::parse("application/octet-stream"))
            .map_err(|e| SendError::InvalidMessage(e.to_string()))?;
        let attachment = Attachment::new(email.attachment.filename.clone())
            .body(email.attachment.content.to_vec(), content_type);

        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(&*email.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(email.body))
                    .singlepart(attachment),
            )
            .map_err(|e| SendError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailClient {
    #[tracing::instrument(
        name = "Sending an email over SMTP",
        skip(self, email),
        fields(recipient = %email.recipient)
    )]
    async fn send_email(&self, email: PersonalizedEmail) -> Result<(), SendError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

fn classify(error: smtp::Error) -> SendError {
    if is_authentication_failure(error.status()) {
        SendError::Authentication(error.to_string())
    } else {
        SendError::Transport(error.to_string())
    }
}

// 530, 534 and 535 are the SMTP replies for missing or rejected credentials.
fn is_authentication_failure(code: Option<Code>) -> bool {
    code.is_some_and(|code| {
        code.severity == Severity::PermanentNegativeCompletion
            && code.category == Category::Unspecified3
    })
}

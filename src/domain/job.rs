use std::{num::NonZeroUsize, sync::Arc};

use bytes::Bytes;

use super::{EmailAddress, RecipientRecord};

pub const DEFAULT_ATTACHMENT_NAME: &str = "Resume.pdf";
pub const DEFAULT_ATTACHMENT_TYPE: &str = "application/pdf";

/// The file sent along with every email of a batch. Cloning only bumps the
/// reference count of the underlying bytes.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Bytes,
}

impl Attachment {
    pub fn new(filename: Option<String>, content_type: Option<String>, content: Bytes) -> Self {
        Self {
            filename: filename
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_owned()),
            content_type: content_type
                .filter(|mime| !mime.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ATTACHMENT_TYPE.to_owned()),
            content,
        }
    }
}

pub struct Job {
    pub template: String,
    pub subject: String,
    pub attachment: Attachment,
    pub recipients: Vec<RecipientRecord>,
    pub concurrency_limit: NonZeroUsize,
}

/// Everything the transport needs to deliver one rendered message.
#[derive(Debug, Clone)]
pub struct PersonalizedEmail {
    pub recipient: EmailAddress,
    pub subject: Arc<str>,
    pub body: String,
    pub attachment: Attachment,
}

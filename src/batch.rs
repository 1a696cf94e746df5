use std::{num::NonZeroUsize, sync::Arc};

use anyhow::Context;
use bytes::Bytes;

use crate::{
    dispatcher::dispatch,
    domain::{Attachment, BatchReport, Job},
    email_client::EmailSender,
    spreadsheet::{FormatError, parse_recipients},
    telemetry::spawn_blocking_with_tracing,
};

pub struct BatchRequest {
    pub template: String,
    pub subject: String,
    pub attachment: Attachment,
    pub spreadsheet: Bytes,
    pub concurrency_limit: NonZeroUsize,
}

/// Failures that stop a batch before any email is sent.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("attachment is empty")]
    EmptyAttachment,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Parses the recipients, then sends one personalized email per row.
///
/// Errors are only returned for problems found before dispatch starts; every
/// per-recipient failure ends up in the report instead.
#[tracing::instrument(
    name = "Processing a batch",
    skip(request, email_client),
    fields(
        subject = %request.subject,
        concurrency_limit = request.concurrency_limit.get()
    )
)]
pub async fn process_batch(
    request: BatchRequest,
    email_client: Arc<dyn EmailSender>,
) -> Result<BatchReport, BatchError> {
    if request.attachment.content.is_empty() {
        return Err(BatchError::EmptyAttachment);
    }

    let spreadsheet = request.spreadsheet;
    let recipients = spawn_blocking_with_tracing(move || parse_recipients(&spreadsheet))
        .await
        .context("Failed to spawn blocking task.")??;

    let job = Job {
        template: request.template,
        subject: request.subject,
        attachment: request.attachment,
        recipients,
        concurrency_limit: request.concurrency_limit,
    };

    Ok(dispatch(job, move |email| {
        let email_client = Arc::clone(&email_client);
        async move { email_client.send_email(email).await }
    })
    .await)
}

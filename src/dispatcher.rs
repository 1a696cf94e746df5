//! Bounded-concurrency fan-out of one send per recipient.
//!
//! Every recipient gets its own task. Tasks are admitted through a semaphore
//! holding `concurrency_limit` permits, and each task turns whatever goes
//! wrong while handling its recipient into a [`OutcomeStatus::Failed`] for
//! that recipient only. [`dispatch`] returns once every recipient has exactly
//! one [`OutcomeRecord`].

use std::{future::Future, sync::Arc};

use tokio::{
    sync::{AcquireError, Semaphore},
    task::JoinSet,
};
use tracing::{Instrument, info_span};

use crate::{
    domain::{
        Attachment, BatchReport, EmailAddress, Job, OutcomeRecord, OutcomeStatus,
        PersonalizedEmail, RecipientRecord,
    },
    email_client::SendError,
    template::{RenderError, render},
};

#[derive(thiserror::Error, Debug)]
enum DeliveryError {
    #[error("invalid destination address, {0}")]
    InvalidAddress(String),
    #[error("couldn't render the email body, {0}")]
    Render(#[from] RenderError),
    #[error("{0}")]
    Send(#[from] SendError),
    #[error("concurrency gate closed, {0}")]
    Gate(#[from] AcquireError),
}

/// Runs `send` once per recipient of `job`, never more than
/// `job.concurrency_limit` at a time.
///
/// Outcomes are in completion order. Use [`OutcomeRecord::index`] to line them
/// up with `job.recipients`.
#[tracing::instrument(
    name = "Dispatching a batch",
    skip(job, send),
    fields(
        recipients = job.recipients.len(),
        concurrency_limit = job.concurrency_limit.get()
    )
)]
pub async fn dispatch<F, Fut>(job: Job, send: F) -> BatchReport
where
    F: Fn(PersonalizedEmail) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SendError>> + Send + 'static,
{
    let Job {
        template,
        subject,
        attachment,
        recipients,
        concurrency_limit,
    } = job;

    // More permits than recipients never changes admission.
    let permits = concurrency_limit.get().min(recipients.len().max(1));
    let gate = Arc::new(Semaphore::new(permits));
    let send = Arc::new(send);
    let template: Arc<str> = template.into();
    let subject: Arc<str> = subject.into();
    let addresses: Vec<String> = recipients.iter().map(|r| r.email.clone()).collect();

    let mut tasks = JoinSet::new();
    for (index, record) in recipients.into_iter().enumerate() {
        let email = record.email.clone();
        let gate = Arc::clone(&gate);
        let send = Arc::clone(&send);
        let template = Arc::clone(&template);
        let subject = Arc::clone(&subject);
        let attachment = attachment.clone();
        let span = info_span!("Sending to recipient", index, recipient = %email);

        tasks.spawn(
            async move {
                let status = match deliver(&gate, &*send, &record, &template, subject, attachment)
                    .await
                {
                    Ok(()) => {
                        tracing::info!("Email sent");
                        OutcomeStatus::Sent
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Email failed");
                        OutcomeStatus::Failed(e.to_string())
                    }
                };
                OutcomeRecord {
                    index,
                    email,
                    status,
                }
            }
            .instrument(span),
        );
    }

    let mut reported = vec![false; addresses.len()];
    let mut outcomes = Vec::with_capacity(addresses.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => {
                reported[outcome.index] = true;
                outcomes.push(outcome);
            }
            Err(e) => tracing::error!(error = %e, "A send task did not complete"),
        }
    }

    // A task that panicked can't tell which recipient it was handling.
    for (index, email) in addresses.into_iter().enumerate() {
        if !reported[index] {
            outcomes.push(OutcomeRecord {
                index,
                email,
                status: OutcomeStatus::Failed(
                    "send task stopped before reporting an outcome".to_string(),
                ),
            });
        }
    }

    let report = BatchReport { outcomes };
    tracing::info!(sent = report.sent(), failed = report.failed(), "Batch done");
    report
}

async fn deliver<F, Fut>(
    gate: &Semaphore,
    send: &F,
    record: &RecipientRecord,
    template: &str,
    subject: Arc<str>,
    attachment: Attachment,
) -> Result<(), DeliveryError>
where
    F: Fn(PersonalizedEmail) -> Fut,
    Fut: Future<Output = Result<(), SendError>>,
{
    // Held until this function returns, whichever way it returns.
    let _permit = gate.acquire().await?;

    let recipient =
        EmailAddress::parse(record.email.clone()).map_err(DeliveryError::InvalidAddress)?;
    let body = render(record, template)?;

    send(PersonalizedEmail {
        recipient,
        subject,
        body,
        attachment,
    })
    .await?;
    Ok(())
}

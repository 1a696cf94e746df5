use std::{num::NonZeroUsize, sync::Arc};

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;

use crate::{
    batch::{BatchError, BatchRequest, process_batch},
    domain::{Attachment, OutcomeRecord},
    startup::AppState,
};

/// Multipart fields as uploaded, before validation.
#[derive(Default)]
struct FormData {
    prompt: Option<String>,
    subject: Option<String>,
    excel_file: Option<Bytes>,
    resume_file: Option<(Option<String>, Option<String>, Bytes)>,
    concurrency_limit: Option<String>,
}

impl FormData {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, SendEmailsError> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("prompt") => form.prompt = Some(field.text().await?),
                Some("subject") => form.subject = Some(field.text().await?),
                Some("concurrency_limit") => form.concurrency_limit = Some(field.text().await?),
                Some("excel_file") => form.excel_file = Some(field.bytes().await?),
                Some("resume_file") => {
                    let file_name = field.file_name().map(str::to_owned);
                    let content_type = field.content_type().map(str::to_owned);
                    form.resume_file = Some((file_name, content_type, field.bytes().await?));
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_request(self, default_limit: NonZeroUsize) -> Result<BatchRequest, SendEmailsError> {
        let template = self.prompt.ok_or(SendEmailsError::MissingField("prompt"))?;
        let subject = self.subject.ok_or(SendEmailsError::MissingField("subject"))?;
        let spreadsheet = self
            .excel_file
            .ok_or(SendEmailsError::MissingField("excel_file"))?;
        let (file_name, content_type, content) = self
            .resume_file
            .ok_or(SendEmailsError::MissingField("resume_file"))?;

        if template.trim().is_empty() {
            return Err(SendEmailsError::InvalidForm(
                "Email prompt is required".into(),
            ));
        }
        if subject.trim().is_empty() {
            return Err(SendEmailsError::InvalidForm(
                "Email subject is required".into(),
            ));
        }
        let concurrency_limit = match self.concurrency_limit.as_deref().map(str::trim) {
            None | Some("") => default_limit,
            Some(raw) => raw
                .parse::<NonZeroUsize>()
                .map_err(|_| {
                    SendEmailsError::InvalidForm(format!(
                        "concurrency_limit must be a positive integer, got {:?}",
                        raw
                    ))
                })?,
        };

        Ok(BatchRequest {
            template,
            subject,
            attachment: Attachment::new(file_name, content_type, content),
            spreadsheet,
            concurrency_limit,
        })
    }
}

#[derive(Serialize)]
pub struct SendEmailsResponse {
    pub results: Vec<OutcomeRecord>,
    pub sent: usize,
    pub failed: usize,
}

#[tracing::instrument(name = "Sending a batch of personalized emails", skip(app_state, multipart))]
pub async fn send_emails(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SendEmailsResponse>, SendEmailsError> {
    let request =
        FormData::from_multipart(multipart).await?.into_request(app_state.concurrency_limit)?;

    let report = process_batch(request, Arc::clone(&app_state.email_client)).await?;

    Ok(Json(SendEmailsResponse {
        sent: report.sent(),
        failed: report.failed(),
        results: report.outcomes,
    }))
}

#[derive(thiserror::Error, Debug)]
pub enum SendEmailsError {
    #[error("missing form field {0}")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidForm(String),
    #[error("couldn't read the multipart body, {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for SendEmailsError {
    fn into_response(self) -> Response {
        let status = match &self {
            SendEmailsError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SendEmailsError::InvalidForm(_) => StatusCode::BAD_REQUEST,
            SendEmailsError::Multipart(e) => e.status(),
            SendEmailsError::Batch(BatchError::Format(_) | BatchError::EmptyAttachment) => {
                StatusCode::BAD_REQUEST
            }
            SendEmailsError::Batch(BatchError::Unexpected(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{:?}", self);
            return status.into_response();
        }
        tracing::error!("{}", self);
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

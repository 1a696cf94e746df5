use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use rinja_axum::Template;

use crate::spreadsheet::REQUIRED_COLUMNS;

#[derive(Template)]
#[template(path = "index.html")]
struct UploadFormTemplate<'a> {
    title: &'a str,
    required_columns: String,
}

pub async fn index() -> Response {
    let template = UploadFormTemplate {
        title: "Bulk Email Sender",
        required_columns: REQUIRED_COLUMNS.join(", "),
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("couldn't render the upload form, {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

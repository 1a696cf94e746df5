use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    response::Response,
    routing::{get, post},
    serve::Serve,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info, info_span};
use uuid::Uuid;

use crate::{
    configuration::Settings,
    email_client::EmailSender,
    routes::{health_check, index, send_emails},
};

pub struct AppState {
    pub email_client: Arc<dyn EmailSender>,
    pub concurrency_limit: NonZeroUsize,
}

pub fn run(
    listener: TcpListener,
    email_client: Arc<dyn EmailSender>,
    concurrency_limit: NonZeroUsize,
    max_upload_bytes: usize,
) -> Serve<TcpListener, Router, Router> {
    let app_state = Arc::new(AppState {
        email_client,
        concurrency_limit,
    });
    let app = Router::new()
        .route("/", get(index))
        .route("/health_check", get(health_check))
        .route("/send-emails", post(send_emails))
        .route("/send-emails/", post(send_emails))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let request_id = Uuid::new_v4();
                    info_span!(
                        "http_request",
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        request_id = ?request_id,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    let status = response.status();
                    let headers = response.headers();
                    span.record("status", status.as_u16());
                    info!(parent: span, ?status, ?headers, ?latency, "Response sent");
                }),
        );

    axum::serve(listener, app)
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(configuration: Settings) -> anyhow::Result<Self> {
        let concurrency_limit = configuration
            .dispatch
            .concurrency_limit()
            .map_err(|e| anyhow!(e))?;
        let email_client = configuration.email_client.client()?;

        let listener = TcpListener::bind(format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        ))
        .await?;
        let port = listener.local_addr()?.port();

        let server = run(
            listener,
            email_client,
            concurrency_limit,
            configuration.application.max_upload_bytes,
        );

        Ok(Self { server, port })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        Ok(self.server.await?)
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

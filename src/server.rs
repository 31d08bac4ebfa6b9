//! HTTP surface of the gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/providers` | Credential and capability status |
//! | `POST` | `/api/chat` | Streaming chat (`text/plain` body) |
//! | `GET`/`DELETE` | `/api/chat/sessions/{id}` | Inspect or drop a session memory |
//! | `POST` | `/api/summarize` | Summarize text |
//! | `POST` | `/api/classify` | Sentiment, topic or emotion classification |
//! | `POST` | `/api/ocr` | Multipart `file` (+ optional `model`) |
//! | `POST` | `/api/qna` | Answer a question over optional context |
//! | `GET`  | `/api/rag` | Document store status |
//! | `POST` | `/api/rag/upload` | Multipart `file` (PDF, DOCX, TXT) |
//! | `POST` | `/api/rag/query` | Answer from uploaded documents |
//! | `POST` | `/api/rag/clear` | Drop every uploaded document |
//!
//! Successful JSON responses are `{ "data": ... }`. Capabilities served by a
//! fallback chain add an `X-Provider` header naming the provider that answered.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Text is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large` (413),
//! `not_configured` (503), `service_unavailable` (503), `upstream_error` (500),
//! `internal` (500).

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use futures_util::{future, StreamExt};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::chat::ChatRequest;
use crate::classify::{self, ClassifyRequest};
use crate::config::Config;
use crate::error::CapabilityError;
use crate::gateway::Gateway;
use crate::ocr::{self, OcrRequest};
use crate::orchestrator::ChainSuccess;
use crate::qna::{self, QnaRequest};
use crate::rag::UploadedFile;
use crate::summarize::{self, SummarizeRequest};

pub const PROVIDER_HEADER: &str = "x-provider";
pub const PERSONA_HEADER: &str = "x-ai-persona";
pub const FALLBACK_HEADER: &str = "x-fallback";

type AppState = Arc<Gateway>;

/// Build the router with all routes and middleware.
pub fn build_router(gateway: Arc<Gateway>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin)
        .expose_headers([
            header::HeaderName::from_static(PROVIDER_HEADER),
            header::HeaderName::from_static(PERSONA_HEADER),
            header::HeaderName::from_static(FALLBACK_HEADER),
        ]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/providers", get(handle_providers))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/chat/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/api/summarize", post(handle_summarize))
        .route("/api/classify", post(handle_classify))
        .route("/api/ocr", post(handle_ocr))
        .route("/api/qna", post(handle_qna))
        .route("/api/rag", get(handle_rag_status))
        .route("/api/rag/upload", post(handle_rag_upload))
        .route("/api/rag/query", post(handle_rag_query))
        .route("/api/rag/clear", post(handle_rag_clear))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(gateway)
}

/// Bind to `[server].bind` and serve until Ctrl-C.
pub async fn run_server(config: &Config, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(gateway, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into the JSON error contract.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<CapabilityError> for AppError {
    fn from(err: CapabilityError) -> Self {
        let message = err.to_string();
        match err {
            CapabilityError::InvalidInput(_)
            | CapabilityError::NoDocuments
            | CapabilityError::Extraction(_) => bad_request(message),
            CapabilityError::NotConfigured { .. } => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "not_configured", message)
            }
            CapabilityError::AllProvidersFailed { .. } => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
            }
            CapabilityError::Upstream(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "upstream_error", message)
            }
            CapabilityError::Internal(inner) => {
                tracing::error!(error = ?inner, "internal error");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                rejection.body_text(),
            );
        }
        bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.body_text());
        }
        bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "An unexpected error occurred",
    )
    .into_response()
}

// ============ Success responses ============

#[derive(Serialize)]
struct DataBody<T> {
    data: T,
}

fn data<T: Serialize>(value: T) -> Json<DataBody<T>> {
    Json(DataBody { data: value })
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(header::HeaderName::from_static(name), value);
    }
}

/// `{ "data": ... }` plus the `X-Provider` header.
fn chain_response<T: Serialize>(success: ChainSuccess<T>) -> Response {
    let mut response = data(success.value).into_response();
    set_header(&mut response, PROVIDER_HEADER, &success.provider);
    response
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(AppError::from)
}

// ============ GET /health, /api/providers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_providers(State(gateway): State<AppState>) -> Response {
    let capabilities: serde_json::Map<String, serde_json::Value> = gateway
        .capability_status()
        .into_iter()
        .map(|(name, ok)| (name.to_string(), serde_json::Value::Bool(ok)))
        .collect();
    data(serde_json::json!({
        "providers": gateway.credentials,
        "capabilities": capabilities,
    }))
    .into_response()
}

// ============ Chat ============

async fn handle_chat(
    State(gateway): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let reply = gateway.chat.reply(request).await?;

    // A mid-stream provider error aborts the body after the fragments already
    // sent, so the client sees a broken transfer instead of a short reply.
    let body = reply.stream.scan(false, |failed, item| {
        future::ready(if *failed {
            None
        } else {
            Some(item.map_err(|err| {
                tracing::warn!(error = %err, "chat stream interrupted");
                *failed = true;
                BoxError::from(err.to_string())
            }))
        })
    });

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    set_header(&mut response, PERSONA_HEADER, reply.persona.display_name());
    if let Some(provider) = &reply.provider {
        set_header(&mut response, PROVIDER_HEADER, provider);
    }
    if let Some(fallback) = &reply.fallback {
        set_header(&mut response, FALLBACK_HEADER, fallback);
    }
    Ok(response)
}

async fn handle_get_session(
    State(gateway): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let memory = gateway
        .chat
        .sessions()
        .snapshot(&id)
        .await
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;
    Ok(data(memory).into_response())
}

async fn handle_delete_session(
    State(gateway): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if gateway.chat.sessions().remove(&id) {
        tracing::info!(session = %id, "session removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no session with id: {}", id)))
    }
}

// ============ Summarize, classify, Q&A ============

async fn handle_summarize(
    State(gateway): State<AppState>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let success = summarize::summarize(&gateway.summarize, request).await?;
    Ok(chain_response(success))
}

async fn handle_classify(
    State(gateway): State<AppState>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let success = classify::classify(&gateway.classify, request).await?;
    Ok(chain_response(success))
}

async fn handle_qna(
    State(gateway): State<AppState>,
    payload: Result<Json<QnaRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(payload)?;
    let result = qna::answer(gateway.qna.as_ref(), request).await?;
    Ok(data(result).into_response())
}

// ============ OCR ============

/// Uploaded file and plain text fields of a multipart form.
#[derive(Default)]
struct Form {
    file: Option<UploadedFile>,
    model: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<Form, AppError> {
    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "model" => form.model = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

async fn handle_ocr(
    State(gateway): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| bad_request("No file uploaded"))?;
    let request = OcrRequest {
        image: file.bytes,
        mime_type: file.content_type,
        model: form.model,
    };
    let success = ocr::recognize(&gateway.ocr, request).await?;
    Ok(chain_response(success))
}

// ============ RAG ============

#[derive(Deserialize)]
struct RagQuery {
    #[serde(default)]
    question: String,
}

async fn handle_rag_status(State(gateway): State<AppState>) -> Response {
    data(gateway.rag.status()).into_response()
}

async fn handle_rag_upload(
    State(gateway): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| bad_request("No file uploaded"))?;
    // PDF parsing is CPU-bound.
    let gateway_for_upload = gateway.clone();
    let result = tokio::task::spawn_blocking(move || gateway_for_upload.rag.upload(file))
        .await
        .map_err(|err| CapabilityError::Internal(anyhow::anyhow!("upload task failed: {}", err)))??;
    Ok(data(result).into_response())
}

async fn handle_rag_query(
    State(gateway): State<AppState>,
    payload: Result<Json<RagQuery>, JsonRejection>,
) -> Result<Response, AppError> {
    let query = json_body(payload)?;
    let result = gateway.rag.query(&query.question).await?;
    Ok(data(result).into_response())
}

async fn handle_rag_clear(State(gateway): State<AppState>) -> Response {
    gateway.rag.clear();
    data(serde_json::json!({ "message": "All documents cleared" })).into_response()
}

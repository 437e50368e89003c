//! HTTP API for uploading documents and asking questions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/documents?documentName=<name>` | Upload a document (multipart `file` part, or raw bytes as the body) |
//! | `POST` | `/api/documents/query?query=<q>` | Answer a question; plain-text response |
//! | `GET`  | `/api/documents` | List ingested documents |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413), `parse_error` (422),
//! `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use contextual_retrieval_core::Error as CoreError;

use crate::config::Config;
use crate::service::Services;
use crate::sqlite_store::DocumentSummary;

/// Starts the HTTP server with models built from the configuration.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    run_server_with_services(config, services).await
}

/// Starts the HTTP server around already-built [`Services`].
pub async fn run_server_with_services(config: &Config, services: Services) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(services), config.server.max_upload_bytes);

    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Route table, exposed for embedding in other axum applications.
pub fn router(services: Arc<Services>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/documents",
            post(handle_upload).get(handle_list_documents),
        )
        .route("/api/documents/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"upstream_error"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
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
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// An extractor rejection, keeping its status (e.g. 413 for oversized bodies).
fn rejected(status: StatusCode, message: String) -> AppError {
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "bad_request"
    };
    AppError {
        status,
        code,
        message,
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map pipeline failures to HTTP statuses.
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Parse(_) => {
                warn!(error = %message, "rejected unparseable upload");
                AppError {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    code: "parse_error",
                    message,
                }
            }
            CoreError::ChunkTask { .. } | CoreError::Retrieval { .. } | CoreError::Completion(_) => {
                error!(error = %message, "upstream failure");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_error",
                    message,
                }
            }
            CoreError::Persistence { .. } | CoreError::Inconsistent(_) => {
                error!(error = %message, "internal failure");
                internal(message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/documents ============

#[derive(Deserialize)]
struct UploadParams {
    #[serde(rename = "documentName")]
    document_name: Option<String>,
}

/// Handler for `POST /api/documents`.
///
/// A `multipart/form-data` request carries the document in its `file`
/// part; `documentName` may be a query parameter or a form field. Any
/// other request body is taken as the raw document. Responds `201` once
/// every chunk is contextualized, embedded, and saved.
async fn handle_upload(
    State(services): State<Arc<Services>>,
    Query(params): Query<UploadParams>,
    request: Request,
) -> Result<(StatusCode, &'static str), AppError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (body, form_name) = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        read_upload_form(multipart).await?
    } else {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        (body, None)
    };

    let name = params
        .document_name
        .or(form_name)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| bad_request("documentName must not be empty"))?;
    if body.is_empty() {
        return Err(bad_request("document body must not be empty"));
    }

    services.ingestor.ingest(&body, &name).await?;
    Ok((StatusCode::CREATED, "Document uploaded successfully"))
}

/// The `file` part and the optional `documentName` field of an upload form.
async fn read_upload_form(mut multipart: Multipart) -> Result<(Bytes, Option<String>), AppError> {
    let mut file = None;
    let mut name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?,
                );
            }
            Some("documentName") => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?,
                );
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| bad_request("multipart upload must include a `file` part"))?;
    Ok((file, name))
}

// ============ GET /api/documents ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<DocumentSummary>,
}

async fn handle_list_documents(
    State(services): State<Arc<Services>>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = services
        .store
        .list_documents()
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;
    Ok(Json(DocumentListResponse { documents }))
}

// ============ POST /api/documents/query ============

#[derive(Deserialize)]
struct QueryParams {
    query: Option<String>,
}

/// Handler for `POST /api/documents/query`. Responds with the answer text.
async fn handle_query(
    State(services): State<Arc<Services>>,
    Query(params): Query<QueryParams>,
) -> Result<String, AppError> {
    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("query must not be empty"))?;

    Ok(services.composer.answer(&query).await?)
}

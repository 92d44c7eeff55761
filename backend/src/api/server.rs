//! HTTP Server for the validation API.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                          |
//! |--------|-----------------------|--------------------------------------|
//! | GET    | `/health`             | Health check                         |
//! | GET    | `/version`            | API version                          |
//! | GET    | `/schema`             | List available schemas               |
//! | GET    | `/schema/{schema-id}` | Schema document (`text/csv-schema`)  |
//! | POST   | `/validate`           | Validate a CSV                       |
//! | GET    | `/api/logs`           | SSE stream of validation events      |
//!
//! `POST /validate` accepts, by `Content-Type`:
//!
//! - `application/x-www-form-urlencoded`: `schemaId` and `url` fields
//! - `text/csv`: the CSV as body, `?schema-id=` in the query
//! - `multipart/form-data`: `schemaId` plus a `file` part or a `url` field
//! - anything else: `?schema-id=` and `?url=` in the query
//!
//! Every response carries the `X-BBLVALIDATOR-VERSION` header.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Form, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

use super::logs::LOG_BROADCASTER;
use super::types::{
    ApiVersion, ErrorResponse, ValidateQuery, ValidationForm, ValidationResponse,
    CSV_SCHEMA_CONTENT_TYPE, VERSION_HEADER,
};
use crate::config::Settings;
use crate::error::{ErrorCode, ServerResult};
use crate::models::{InputSource, SchemaInfo};
use crate::registry::SchemaRegistry;
use crate::temp::TempResourceManager;
use crate::validation::Validator;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub validator: Validator,
    pub api_version: Arc<str>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(validator: Validator, api_version: &str, max_body_bytes: usize) -> Self {
        Self {
            validator,
            api_version: Arc::from(api_version),
            max_body_bytes,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, HeaderName::from_static(VERSION_HEADER)]);

    let version = HeaderValue::from_str(&state.api_version)
        .unwrap_or_else(|_| HeaderValue::from_static(env!("CARGO_PKG_VERSION")));

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/version", get(version_info))
        .route("/schema", get(list_schemas))
        .route("/schema/{schema_id}", get(get_schema))
        .route("/validate", post(validate))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(VERSION_HEADER),
            version,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the registry, create the temp area and serve until shutdown
pub async fn start_server(settings: Settings) -> ServerResult<()> {
    let registry = SchemaRegistry::load(settings.schema_path())?;
    let temp = TempResourceManager::new(settings.connect_timeout, settings.read_timeout)?;
    let validator = Validator::new(
        Arc::new(registry),
        Arc::new(temp),
        Arc::new(settings.engine()),
    )
    .with_max_cell_length(settings.max_cell_length);

    let schema_count = validator.registry().len();
    let app = router(AppState::new(
        validator,
        &settings.api_version,
        settings.max_body_bytes,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 BBL validator running on http://localhost:{}", settings.port);
    info!("   {} schema(s), engine: {}", schema_count, settings.engine_command);
    info!("   POST /validate   - Validate a CSV");
    info!("   GET  /schema     - List schemas");
    info!("   GET  /api/logs   - SSE event stream");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "bbl-validator",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "validate": "POST /validate",
            "schemas": "GET /schema",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn version_info(State(state): State<AppState>) -> Json<ApiVersion> {
    Json(ApiVersion {
        version: state.api_version.to_string(),
    })
}

/// All schemas, each with the public URL of its document
async fn list_schemas(State(state): State<AppState>, headers: HeaderMap) -> Json<Vec<SchemaInfo>> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    let schemas = state
        .validator
        .registry()
        .list()
        .into_iter()
        .map(|s| s.with_url(format!("{}://{}/schema/{}", scheme, host, s.id)))
        .collect();

    Json(schemas)
}

async fn get_schema(State(state): State<AppState>, Path(schema_id): Path<String>) -> Response {
    match state.validator.registry().content(&schema_id) {
        Some(content) => (
            [(header::CONTENT_TYPE, CSV_SCHEMA_CONTENT_TYPE)],
            content.to_string(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::schema_not_found(&schema_id)),
        )
            .into_response(),
    }
}

/// SSE endpoint for real-time validation events
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Validate endpoint, dispatching on the request's content type
async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
    request: Request,
) -> Result<Json<ValidationResponse>, Response> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (schema_id, input) = if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<ValidationForm>::from_request(request, &state)
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        (form.schema_id, InputSource::Url(form.url))
    } else if content_type.starts_with("text/csv") {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        (query.schema_id, InputSource::Content(body.to_vec()))
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?;
        read_multipart(multipart).await?
    } else {
        (query.schema_id, InputSource::Url(query.url))
    };

    let outcome = state
        .validator
        .run_validation(&schema_id, input)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(outcome))
}

/// Collect `schemaId` and the input from a multipart form.
///
/// A non-empty `file` part wins over `url`.
async fn read_multipart(mut multipart: Multipart) -> Result<(String, InputSource), Response> {
    let mut schema_id = String::new();
    let mut url: Option<String> = None;
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "schemaId" => {
                schema_id = field
                    .text()
                    .await
                    .map_err(|e| rejected(e.status(), e.body_text()))?;
            }
            "url" => {
                url = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?,
                );
            }
            "file" => {
                file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let input = match (file, url) {
        (Some(bytes), _) if !bytes.is_empty() => InputSource::Content(bytes),
        (_, Some(url)) => InputSource::Url(url),
        (file, None) => InputSource::Content(file.unwrap_or_default()),
    };
    Ok((schema_id, input))
}

/// Error body for a request whose payload could not be read
fn rejected(status: StatusCode, text: String) -> Response {
    (status, Json(ErrorResponse::new(ErrorCode::NoCsv, text))).into_response()
}

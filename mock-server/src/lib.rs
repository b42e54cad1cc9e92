//! In-process imitation of a remote perception service.
//!
//! Synchronous endpoints answer 200. Video endpoints accept work with a 202
//! and an `Operation-Location`; every GET on that location advances the
//! operation one step through a fixed script. Errors use both of the
//! service's body shapes.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// The only subscription key the mock accepts.
pub const API_KEY: &str = "test-key";

pub const API_KEY_HEADER: &str = "ocp-apim-subscription-key";

/// Bytes served as the rendered artifact of a resource operation.
pub const RENDERED_VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42rendered-video";

/// A minimal PNG header served by the thumbnail endpoint.
pub const THUMBNAIL: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

/// Which script an accepted operation follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    /// Finishes with an embedded `processingResult`.
    TrackFace,
    /// Finishes with a `resourceLocation`.
    Stabilize,
    /// Ends in `Failed`.
    Broken,
}

#[derive(Clone, Debug)]
pub struct Operation {
    pub kind: OperationKind,
    pub polls: usize,
    pub created_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
}

/// Status resource body, as the real service spells it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub status: String,
    pub progress: f32,
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_action_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Operation>>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub api_key: Arc<str>,
}

/// Failures rendered in one of the service's two error shapes.
#[derive(Debug)]
pub enum ServiceError {
    /// `{"statusCode": .., "message": ..}`
    Structured(StatusCode, String),
    /// `{"error": {"code": .., "message": ..}}`
    Coded(StatusCode, &'static str, String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Structured(status, message) => (
                status,
                Json(json!({ "statusCode": status.as_u16(), "message": message })),
            )
                .into_response(),
            ServiceError::Coded(status, code, message) => (
                status,
                Json(json!({ "error": { "code": code, "message": message } })),
            )
                .into_response(),
        }
    }
}

pub fn app() -> Router {
    app_with_key(API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(HashMap::new())),
        api_key: Arc::from(api_key),
    };
    Router::new()
        .route("/vision/v1.0/analyze", post(analyze))
        .route("/vision/v1.0/thumbnail", get(thumbnail))
        .route("/video/v1.0/trackface", post(track_face))
        .route("/video/v1.0/stabilize", post(stabilize))
        .route("/video/v1.0/broken", post(broken))
        .route("/video/v1.0/lost", post(lost))
        .route("/video/v1.0/operations/{id}", get(operation_status))
        .route("/video/v1.0/operations/{id}/content", get(operation_content))
        .route("/echo", any(echo))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if key == Some(&*state.api_key) {
        return Ok(());
    }
    Err(ServiceError::Structured(
        StatusCode::UNAUTHORIZED,
        "Access denied due to invalid subscription key.".to_string(),
    ))
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

#[derive(Deserialize)]
struct UrlBody {
    url: String,
}

/// Where the submitted media came from: a JSON `{"url"}` body or raw bytes.
fn media_source(headers: &HeaderMap, body: &Bytes) -> Result<serde_json::Value, ServiceError> {
    if body.is_empty() {
        return Err(ServiceError::Coded(
            StatusCode::BAD_REQUEST,
            "InvalidArgument",
            "Request body is empty.".to_string(),
        ));
    }
    let content_type = content_type(headers);
    if content_type.starts_with("application/json") {
        let parsed: UrlBody = serde_json::from_slice(body).map_err(|_| {
            ServiceError::Coded(
                StatusCode::BAD_REQUEST,
                "InvalidImageUrl",
                "Image URL is badly formatted.".to_string(),
            )
        })?;
        return Ok(json!({ "source": "url", "url": parsed.url }));
    }
    Ok(json!({ "source": "bytes", "contentType": content_type, "bytes": body.len() }))
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServiceError> {
    authorize(&state, &headers)?;
    let source = media_source(&headers, &body)?;
    let features = params
        .get("visualFeatures")
        .map(|f| f.split(',').map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "media": source,
        "visualFeatures": features,
        "categories": [{ "name": "outdoor_", "score": 0.9 }],
    })))
}

async fn thumbnail(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&state, &headers)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], THUMBNAIL))
}

async fn accept(
    state: AppState,
    headers: HeaderMap,
    body: Bytes,
    kind: OperationKind,
) -> Result<Response, ServiceError> {
    authorize(&state, &headers)?;
    media_source(&headers, &body)?;
    let id = Uuid::new_v4();
    let now = Utc::now();
    state.db.write().await.insert(
        id,
        Operation {
            kind,
            polls: 0,
            created_at: now,
            last_action_at: now,
        },
    );
    tracing::info!(%id, ?kind, "operation accepted");
    let location = format!("{}/video/v1.0/operations/{id}", base_url(&headers));
    Ok((StatusCode::ACCEPTED, [("operation-location", location)]).into_response())
}

async fn track_face(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    accept(state, headers, body, OperationKind::TrackFace).await
}

async fn stabilize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    accept(state, headers, body, OperationKind::Stabilize).await
}

async fn broken(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    accept(state, headers, body, OperationKind::Broken).await
}

/// Accepts the work but forgets to say where to poll.
async fn lost(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ServiceError> {
    authorize(&state, &headers)?;
    media_source(&headers, &body)?;
    Ok(StatusCode::ACCEPTED)
}

/// Face tracking output in the service's version-1 result format.
pub fn tracking_result() -> serde_json::Value {
    json!({
        "version": 1,
        "timescale": 30000,
        "offset": 0,
        "framerate": 30,
        "width": 640,
        "height": 480,
        "fragments": [{
            "start": 0,
            "duration": 60060,
            "interval": 1001,
            "events": [[{ "x": 0.25, "y": 0.3, "width": 0.1, "height": 0.15 }]]
        }]
    })
}

/// The status an operation reports on its `poll`-th status request (1-based).
pub fn scripted_status(op: &Operation, poll: usize, base_url: &str, id: Uuid) -> OperationStatus {
    let mut status = OperationStatus {
        created_date_time: Some(op.created_at),
        last_action_date_time: Some(op.last_action_at),
        ..OperationStatus::default()
    };
    match (op.kind, poll) {
        (_, 1) => {
            status.status = "NotStarted".to_string();
        }
        (OperationKind::TrackFace, 2) | (OperationKind::TrackFace, 3) => {
            status.status = "Running".to_string();
            status.progress = 0.5;
        }
        (OperationKind::TrackFace, _) => {
            status.status = "Succeeded".to_string();
            status.progress = 1.0;
            status.processing_result = Some(tracking_result().to_string());
        }
        (OperationKind::Stabilize, 2) => {
            status.status = "Running".to_string();
            status.progress = 0.7;
        }
        (OperationKind::Stabilize, _) => {
            status.status = "Succeeded".to_string();
            status.progress = 1.0;
            status.resource_location =
                Some(format!("{base_url}/video/v1.0/operations/{id}/content"));
        }
        (OperationKind::Broken, _) => {
            status.status = "Failed".to_string();
            status.progress = 0.2;
            status.message = Some("Video is corrupt or in an unsupported format.".to_string());
        }
    }
    status
}

fn operation_not_found() -> ServiceError {
    ServiceError::Coded(
        StatusCode::NOT_FOUND,
        "NotFound",
        "Operation not found.".to_string(),
    )
}

async fn operation_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OperationStatus>, ServiceError> {
    authorize(&state, &headers)?;
    let mut db = state.db.write().await;
    let op = db.get_mut(&id).ok_or_else(operation_not_found)?;
    op.polls += 1;
    op.last_action_at = Utc::now();
    Ok(Json(scripted_status(op, op.polls, &base_url(&headers), id)))
}

async fn operation_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&state, &headers)?;
    let db = state.db.read().await;
    match db.get(&id) {
        Some(op) if op.kind == OperationKind::Stabilize => {
            Ok(([(header::CONTENT_TYPE, "video/mp4")], RENDERED_VIDEO))
        }
        _ => Err(operation_not_found()),
    }
}

/// Reflects what arrived, for checking how requests are put on the wire.
async fn echo(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServiceError> {
    authorize(&state, &headers)?;
    let json_body = serde_json::from_slice::<serde_json::Value>(&body).ok();
    Ok(Json(json!({
        "method": method.as_str(),
        "query": query,
        "contentType": content_type(&headers),
        "bytes": body.len(),
        "json": json_body,
    })))
}

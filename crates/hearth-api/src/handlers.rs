//! REST API handlers.
//!
//! Every handler resolves the caller first, then delegates to the service.
//! Errors are rendered as `{"error": kind, "message": text}`. A partial
//! refresh failure also carries the fetched rows under `servers`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hearth_orchestrator::{
    CreateServerRequest, ErrorKind, ListQuery, OrchestratorError, ServerAction,
};
use hearth_state::ServerRecord;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::ApiState;
use crate::auth::Authenticated;

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    ok: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { ok: data })
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    servers: Option<Vec<ServerRecord>>,
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    /// Undecodable body or query, including oversized bodies.
    Rejected { status: StatusCode, message: String },
    Orchestrator(OrchestratorError),
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError::Orchestrator(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Rejected {
            status: r.status(),
            message: r.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: r.body_text(),
        }
    }
}

/// Status code for an orchestrator error.
pub fn status_for(e: &OrchestratorError) -> StatusCode {
    match e {
        OrchestratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Forbidden => StatusCode::FORBIDDEN,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::AlreadyExists(_) | OrchestratorError::ActionInProgress(_) => {
            StatusCode::CONFLICT
        }
        other => match other.kind() {
            ErrorKind::ClientError => StatusCode::BAD_REQUEST,
            ErrorKind::ServerError | ErrorKind::PartialFailure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, servers) = match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, ErrorKind::ClientError, message, None)
            }
            ApiError::Rejected { status, message } => {
                (status, ErrorKind::ClientError, message, None)
            }
            ApiError::Orchestrator(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!(error = %e, kind = %e.kind(), "request failed");
                } else {
                    warn!(error = %e, "request rejected");
                }
                let (kind, message) = (e.kind(), e.public_message());
                let servers = match e {
                    OrchestratorError::PartialRefresh { servers, .. } => Some(servers),
                    _ => None,
                };
                (status, kind, message, servers)
            }
        };
        let body = ErrorBody {
            error: kind.as_str(),
            message,
            servers,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Servers ────────────────────────────────────────────────────

/// Query string of GET /api/v1/servers. `names` is comma separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub refresh_status: bool,
    pub names: Option<String>,
}

impl From<ListParams> for ListQuery {
    fn from(params: ListParams) -> Self {
        ListQuery {
            refresh_status: params.refresh_status,
            names: params.names.map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        }
    }
}

/// GET /api/v1/servers
pub async fn list_servers(
    State(state): State<ApiState>,
    Authenticated(caller): Authenticated,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let servers = state
        .service
        .list_servers(&caller, &params.into())
        .await?;
    Ok(ok(servers))
}

/// POST /api/v1/servers
pub async fn create_server(
    State(state): State<ApiState>,
    Authenticated(caller): Authenticated,
    body: Result<Json<CreateServerRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    let created = state.service.create_server(&caller, &request).await?;
    Ok((StatusCode::CREATED, ok(created)))
}

/// POST /api/v1/servers/{name}/actions
pub async fn dispatch_action(
    State(state): State<ApiState>,
    Authenticated(caller): Authenticated,
    Path(name): Path<String>,
    body: Result<Json<ServerAction>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(action) = body?;
    let outcome = state.service.dispatch_action(&caller, &name, action).await?;
    Ok(ok(outcome))
}

// ── Locks ──────────────────────────────────────────────────────

/// DELETE /api/v1/locks/{instance_id}
pub async fn remove_lock(
    State(state): State<ApiState>,
    Authenticated(caller): Authenticated,
    Path(instance_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.service.remove_lock(&caller, &instance_id)?;
    Ok(ok(serde_json::json!({ "removed": removed })))
}

// ── Games ──────────────────────────────────────────────────────

/// GET /api/v1/games
pub async fn list_games(
    State(state): State<ApiState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.service.list_games(&caller).await?))
}

/// POST /api/v1/games/prepare
pub async fn prepare_create(
    State(state): State<ApiState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.service.prepare_create(&caller).await?))
}

//! hearth-api — REST API for Hearth.
//!
//! Thin axum layer over [`HearthService`]: extracts the caller, decodes the
//! request, and maps orchestrator errors onto status codes.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/servers?refreshStatus=bool&names=a,b` | List servers, optionally probing status |
//! | POST | `/api/v1/servers` | Create a server |
//! | POST | `/api/v1/servers/{name}/actions` | Dispatch an action |
//! | DELETE | `/api/v1/locks/{instance_id}` | Remove a stuck workflow lock |
//! | GET | `/api/v1/games` | List the game catalog |
//! | POST | `/api/v1/games/prepare` | Sync the catalog and boot image ahead of a create |
//!
//! Responses are `{"ok": data}` or `{"error": kind, "message": text}`.

pub mod auth;
pub mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use hearth_orchestrator::HearthService;

/// Request bodies larger than this are rejected.
pub const MAX_BODY_BYTES: usize = 10_000;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: HearthService,
}

pub fn build_router(service: HearthService) -> Router {
    let api_routes = Router::new()
        .route(
            "/servers",
            get(handlers::list_servers).post(handlers::create_server),
        )
        .route("/servers/{name}/actions", post(handlers::dispatch_action))
        .route("/locks/{instance_id}", delete(handlers::remove_lock))
        .route("/games", get(handlers::list_games))
        .route("/games/prepare", post(handlers::prepare_create))
        .with_state(ApiState { service });

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

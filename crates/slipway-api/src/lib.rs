//! REST surface for the deployment engine.
//!
//! Routes (all under `/api/v1`):
//!
//! | Method | Path                  | Purpose                                |
//! |--------|-----------------------|----------------------------------------|
//! | POST   | `/deployments`        | Submit a deployment and run it         |
//! | GET    | `/deployments`        | List every recorded deployment         |
//! | GET    | `/deployments/{id}`   | Fetch one deployment record            |
//! | GET    | `/alerts`             | List raised critical alerts            |
//!
//! Submissions carry the acting identity in the `x-slipway-actor` header
//! rather than the body, so callers cannot deploy on someone else's behalf
//! by editing a JSON field.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use slipway_engine::Orchestrator;
use slipway_store::RecordStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: RecordStore,
}

impl ApiState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let store = orchestrator.store().clone();
        Self { orchestrator, store }
    }
}

/// Builds the full application router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/deployments",
            get(handlers::list_deployments).post(handlers::create_deployment),
        )
        .route("/deployments/{id}", get(handlers::get_deployment))
        .route("/alerts", get(handlers::list_alerts))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

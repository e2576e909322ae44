//! Request handlers.
//!
//! Success bodies carry `success: true`; failures carry a flat
//! `{error, details, code}` object where `code` is the engine's stable
//! machine-readable failure code.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use slipway_core::{DeploymentSubmission, ValidationError};
use slipway_engine::{DeploymentTicket, EngineError};

use crate::ApiState;

/// Header naming the authenticated actor submitting a deployment.
pub const ACTOR_HEADER: &str = "x-slipway-actor";

#[derive(Debug, Serialize)]
struct Accepted {
    success: bool,
    #[serde(flatten)]
    ticket: DeploymentTicket,
}

#[derive(Debug, Serialize)]
struct ApiData<T: Serialize> {
    success: bool,
    data: T,
}

impl<T: Serialize> ApiData<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    details: String,
    code: String,
}

fn error_response(
    status: StatusCode,
    error: &str,
    details: impl Into<String>,
    code: &str,
) -> Response {
    let body = ApiError {
        error: error.to_string(),
        details: details.into(),
        code: code.to_string(),
    };
    (status, Json(body)).into_response()
}

fn engine_failure(err: &EngineError) -> Response {
    let status = match err {
        EngineError::Validation(ValidationError::DuplicateVersion { .. }) => StatusCode::CONFLICT,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Preflight { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Execution { .. }
        | EngineError::RolledBack { .. }
        | EngineError::RollbackFailed { .. }
        | EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let error = match err {
        EngineError::Validation(_) => "validation failed",
        EngineError::Preflight { .. } => "preflight checks failed",
        EngineError::Execution { .. } => "execution failed",
        EngineError::RolledBack { .. } => "deployment rolled back",
        EngineError::RollbackFailed { .. } => "deployment and rollback failed",
        EngineError::Store(_) => "record store unavailable",
    };
    error_response(status, error, err.to_string(), err.code())
}

/// POST /api/v1/deployments
///
/// Runs the deployment to a terminal state before responding, so the
/// status in the reply is final, not an acknowledgement.
pub async fn create_deployment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(mut submission): Json<DeploymentSubmission>,
) -> impl IntoResponse {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    let Some(actor) = actor else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing actor",
            format!("the {ACTOR_HEADER} header is required"),
            "missing_actor",
        );
    };
    submission.initiated_by = actor.to_string();

    match state.orchestrator.run(submission).await {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(Accepted {
                success: true,
                ticket,
            }),
        )
            .into_response(),
        Err(err) => {
            warn!(code = err.code(), error = %err, "deployment request failed");
            engine_failure(&err)
        }
    }
}

/// GET /api/v1/deployments
pub async fn list_deployments(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_records() {
        Ok(records) => Json(ApiData::ok(records)).into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "record store unavailable",
            err.to_string(),
            "store_error",
        ),
    }
}

/// GET /api/v1/deployments/{id}
pub async fn get_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_record(&id) {
        Ok(Some(record)) => Json(ApiData::ok(record)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "deployment not found",
            format!("no deployment record with id {id}"),
            "not_found",
        ),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "record store unavailable",
            err.to_string(),
            "store_error",
        ),
    }
}

/// GET /api/v1/alerts
pub async fn list_alerts(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_alerts() {
        Ok(alerts) => Json(ApiData::ok(alerts)).into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "record store unavailable",
            err.to_string(),
            "store_error",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::http::HeaderValue;
    use chrono::NaiveDate;
    use serde_json::Value;

    use slipway_core::config::EngineConfig;
    use slipway_core::ports::{FixedClock, LogAlertSink, TracingTelemetry};
    use slipway_engine::Orchestrator;
    use slipway_preflight::SimSignals;
    use slipway_rollout::{RolloutMetrics, SimDriver, SimScript};
    use slipway_store::RecordStore;

    fn saturday() -> FixedClock {
        FixedClock::at(
            NaiveDate::from_ymd_opt(2025, 3, 8)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    fn state_with(script: SimScript, signals: SimSignals) -> ApiState {
        let store = RecordStore::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(
            EngineConfig::default(),
            store.clone(),
            Arc::new(signals),
            Arc::new(SimDriver::new(script)),
            Arc::new(TracingTelemetry::new()),
            Arc::new(LogAlertSink),
            Arc::new(saturday()),
        );
        ApiState {
            orchestrator: Arc::new(orchestrator),
            store,
        }
    }

    fn state() -> ApiState {
        state_with(SimScript::default(), SimSignals::default())
    }

    fn submission(deployment_type: &str, version: &str) -> DeploymentSubmission {
        DeploymentSubmission {
            deployment_type: deployment_type.to_string(),
            environment: "staging".to_string(),
            version: version.to_string(),
            rollback_strategy: Some("immediate".to_string()),
            health_checks: Some(true),
            approval_required: Some(false),
            initiated_by: String::new(),
        }
    }

    fn actor_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("release-bot"));
        headers
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn violating_metrics() -> RolloutMetrics {
        RolloutMetrics {
            error_rate_pct: 9.5,
            p99_latency_ms: 200,
        }
    }

    #[tokio::test]
    async fn submitted_deployment_runs_to_completion() {
        let state = state();
        let response = create_deployment(
            State(state.clone()),
            actor_headers(),
            Json(submission("canary", "2.4.0")),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], Value::Bool(true));
        assert_eq!(body["status"], "completed");
        assert_eq!(body["rollback_plan"]["action"], "remove_canary");
        let id = body["deployment_id"].as_str().unwrap();
        assert!(!id.is_empty());

        let record = state.store.get_record(id).unwrap().unwrap();
        assert_eq!(record.request.initiated_by, "release-bot");
    }

    #[tokio::test]
    async fn missing_actor_header_is_rejected_without_a_record() {
        let state = state();
        let response = create_deployment(
            State(state.clone()),
            HeaderMap::new(),
            Json(submission("canary", "2.4.0")),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "missing_actor");
        assert!(state.store.list_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_environment_maps_to_bad_request() {
        let mut submission = submission("canary", "2.4.0");
        submission.environment = "qa".to_string();
        let response = create_deployment(State(state()), actor_headers(), Json(submission))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "invalid_environment");
        assert_eq!(body["error"], "validation failed");
    }

    #[tokio::test]
    async fn duplicate_version_maps_to_conflict() {
        let state = state();
        let first = create_deployment(
            State(state.clone()),
            actor_headers(),
            Json(submission("rolling", "3.1.0")),
        )
        .await
        .into_response();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = create_deployment(
            State(state),
            actor_headers(),
            Json(submission("rolling", "3.1.0")),
        )
        .await
        .into_response();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = body_json(second).await;
        assert_eq!(body["code"], "duplicate_version");
    }

    #[tokio::test]
    async fn failed_preflight_maps_to_unprocessable() {
        let signals = SimSignals {
            health: 0.4,
            ..SimSignals::default()
        };
        let response = create_deployment(
            State(state_with(SimScript::default(), signals)),
            actor_headers(),
            Json(submission("canary", "2.4.0")),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "preflight_failed");
        assert!(body["details"].as_str().unwrap().contains("health"));
    }

    #[tokio::test]
    async fn rolled_back_run_maps_to_internal_error() {
        let script = SimScript {
            monitor_results: vec![violating_metrics()],
            ..SimScript::default()
        };
        let response = create_deployment(
            State(state_with(script, SimSignals::default())),
            actor_headers(),
            Json(submission("canary", "2.4.0")),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], "rolled_back");
    }

    #[tokio::test]
    async fn records_are_listable_and_fetchable() {
        let state = state();
        let created = create_deployment(
            State(state.clone()),
            actor_headers(),
            Json(submission("blue_green", "4.0.0")),
        )
        .await
        .into_response();
        let id = body_json(created).await["deployment_id"]
            .as_str()
            .unwrap()
            .to_string();

        let listed = list_deployments(State(state.clone())).await.into_response();
        assert_eq!(listed.status(), StatusCode::OK);
        let body = body_json(listed).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let fetched = get_deployment(State(state.clone()), Path(id))
            .await
            .into_response();
        assert_eq!(fetched.status(), StatusCode::OK);
        let body = body_json(fetched).await;
        assert_eq!(body["data"]["status"], "completed");

        let absent = get_deployment(State(state), Path("no-such-id".to_string()))
            .await
            .into_response();
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);
        let body = body_json(absent).await;
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn alerts_surface_after_double_failure() {
        let script = SimScript {
            monitor_results: vec![violating_metrics()],
            fail_compensation: true,
            ..SimScript::default()
        };
        let state = state_with(script, SimSignals::default());
        let response = create_deployment(
            State(state.clone()),
            actor_headers(),
            Json(submission("canary", "2.4.0")),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "rollback_failed");

        let alerts = list_alerts(State(state)).await.into_response();
        assert_eq!(alerts.status(), StatusCode::OK);
        let body = body_json(alerts).await;
        let raised = body["data"].as_array().unwrap();
        assert_eq!(raised.len(), 1);
        let failure = raised[0]["rollback_failure"].as_str().unwrap();
        assert!(failure.contains("remove_canary"));
    }
}

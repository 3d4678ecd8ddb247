use super::{MutateRequest, WorkerState};
use crate::mutation::executor;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub python_version: Option<String>,
}

pub async fn health(State(state): State<Arc<WorkerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        python_version: state.python_version.clone(),
    })
}

fn error(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Run one mutate-and-test cycle against the worker's checkout.
///
/// Requests queue on the cycle lock, so concurrent callers never mutate the
/// same files at once.
pub async fn mutate_and_test(
    State(state): State<Arc<WorkerState>>,
    Json(req): Json<MutateRequest>,
) -> impl IntoResponse {
    if req.mutations.is_empty() {
        return error(StatusCode::BAD_REQUEST, "No mutations in request".into());
    }

    if let (Some(required), Some(actual)) = (&req.python_version, &state.python_version) {
        if required != actual {
            return error(
                StatusCode::CONFLICT,
                format!(
                    "Python version mismatch: session requires {}, worker has {}",
                    required, actual
                ),
            );
        }
    }

    let _cycle = state.cycle.lock().await;
    if state.is_shutting_down() {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Worker is shutting down".into());
    }
    tracing::debug!(
        "Running {} mutation(s), first: {}",
        req.mutations.len(),
        req.mutations[0]
    );

    let config = req.mutation_config();
    let Some(result) = executor::mutate_and_test_until(
        state.root.clone(),
        req.mutations,
        config,
        state.catalog.clone(),
        state.shutdown_signal(),
    )
    .await
    else {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Worker shut down during the cycle".into(),
        );
    };

    tracing::info!(
        "Cycle finished: {} {}",
        result.worker_outcome(),
        result
            .test_outcome()
            .map(|o| o.to_string())
            .unwrap_or_default()
    );

    (StatusCode::OK, Json(result)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{
        MutationConfig, MutationSpec, OperatorArgs, Position, TestOutcome, WorkItem, WorkResult,
        WorkerOutcome,
    };
    use crate::operators::OperatorCatalog;
    use crate::web::router;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(root: &std::path::Path, python_version: Option<&str>) -> Arc<WorkerState> {
        Arc::new(WorkerState::new(
            root.to_path_buf(),
            python_version.map(str::to_string),
            Arc::new(OperatorCatalog::standard()),
        ))
    }

    fn request(python_version: Option<&str>, test_command: &str) -> MutateRequest {
        let spec = MutationSpec::new(
            "m.py",
            "core/ReplaceTrueWithFalse",
            0,
            Position::new(1, 4),
            Position::new(1, 8),
            OperatorArgs::new(),
        )
        .unwrap();
        let item = WorkItem::new("job", vec![spec]).unwrap();
        MutateRequest::new(
            &item,
            &MutationConfig::new(test_command, 10.0),
            python_version.map(str::to_string),
        )
    }

    async fn post(state: Arc<WorkerState>, body: String) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mutate-and-test")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let response = router(state(dir.path(), Some("3.11")))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.python_version.as_deref(), Some("3.11"));
    }

    #[tokio::test]
    async fn test_mutate_and_test_kills_mutant() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("m.py"), "x = True\n").unwrap();

        let body = serde_json::to_string(&request(None, "grep -q True m.py")).unwrap();
        let (status, bytes) = post(state(dir.path(), None), body).await;

        assert_eq!(status, StatusCode::OK);
        let result: WorkResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result.worker_outcome(), WorkerOutcome::Normal);
        assert_eq!(result.test_outcome(), Some(TestOutcome::Killed));
        assert!(result.diff().contains("+x = False"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "x = True\n"
        );
    }

    #[tokio::test]
    async fn test_python_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let body = serde_json::to_string(&request(Some("3.12"), "exit 0")).unwrap();
        let (status, _) = post(state(dir.path(), Some("3.10")), body).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unversioned_worker_accepts_any_session() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("m.py"), "x = True\n").unwrap();
        let body = serde_json::to_string(&request(Some("3.12"), "exit 0")).unwrap();
        let (status, bytes) = post(state(dir.path(), None), body).await;
        assert_eq!(status, StatusCode::OK);
        let result: WorkResult = serde_json::from_slice(&bytes).unwrap();
        assert!(result.is_survivor());
    }

    #[tokio::test]
    async fn test_refuses_cycles_after_shutdown() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("m.py"), "x = True\n").unwrap();
        let state = state(dir.path(), None);
        state.begin_shutdown();

        let body = serde_json::to_string(&request(None, "touch ran")).unwrap();
        let (status, _) = post(state, body).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!dir.path().join("ran").exists());
    }

    #[tokio::test]
    async fn test_empty_mutations_rejected() {
        let dir = TempDir::new().unwrap();
        let body = serde_json::json!({
            "mutations": [],
            "test_command": "exit 0",
            "timeout": 1.0,
        })
        .to_string();
        let (status, _) = post(state(dir.path(), None), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

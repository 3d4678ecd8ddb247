//! HTTP worker server for the remote execution engine.
//!
//! A worker owns one checkout of the project under test and runs one
//! mutate-and-test cycle at a time against it.

mod handlers;

use crate::mutation::{MutationConfig, MutationSpec, TimeoutPolicy, WorkItem};
use crate::operators::OperatorCatalog;
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as TokioMutex};

/// Body of `POST /mutate-and-test`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutateRequest {
    pub mutations: Vec<MutationSpec>,
    pub test_command: String,
    /// Seconds
    pub timeout: f64,
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default)]
    pub python_version: Option<String>,
}

fn default_max_output_bytes() -> usize {
    10_000
}

impl MutateRequest {
    pub fn new(item: &WorkItem, config: &MutationConfig, python_version: Option<String>) -> Self {
        Self {
            mutations: item.mutations().to_vec(),
            test_command: config.test_command.clone(),
            timeout: config.timeout_seconds,
            timeout_policy: config.timeout_policy,
            max_output_bytes: config.max_test_output_bytes,
            python_version,
        }
    }

    pub fn mutation_config(&self) -> MutationConfig {
        MutationConfig {
            test_command: self.test_command.clone(),
            timeout_seconds: self.timeout,
            timeout_policy: self.timeout_policy,
            max_test_output_bytes: self.max_output_bytes,
        }
    }
}

/// Shared state of a worker server
pub struct WorkerState {
    pub root: PathBuf,
    pub python_version: Option<String>,
    pub catalog: Arc<OperatorCatalog>,
    /// Held for the whole cycle; the checkout is mutated in place.
    cycle: TokioMutex<()>,
    shutdown: watch::Sender<bool>,
}

impl WorkerState {
    pub fn new(root: PathBuf, python_version: Option<String>, catalog: Arc<OperatorCatalog>) -> Self {
        Self {
            root,
            python_version,
            catalog,
            cycle: TokioMutex::new(()),
            shutdown: watch::Sender::new(false),
        }
    }

    /// Interrupt the running cycle and refuse new ones.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Completes once shutdown has begun.
    pub fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            if rx.wait_for(|stopping| *stopping).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn router(state: Arc<WorkerState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/mutate-and-test", post(handlers::mutate_and_test))
        .with_state(state)
}

/// Start the worker server and run it until `shutdown` completes.
///
/// On shutdown an in-flight cycle is interrupted and its files restored
/// before this returns.
pub async fn start_worker(
    state: Arc<WorkerState>,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state.clone());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        "Worker listening on http://{} (root: {})",
        listener.local_addr()?,
        state.root.display()
    );

    let stopping = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutting down worker");
            stopping.begin_shutdown();
        })
        .await?;

    // A cycle holds the lock until its files are restored.
    let _cycle = state.cycle.lock().await;
    tracing::info!("Worker stopped; {} is unmodified", state.root.display());

    Ok(())
}

//! Execution engines.
//!
//! An engine takes pending work items and reports exactly one result per
//! item on the results channel, in completion order. `local` runs items in
//! worker tasks that each own a cloned workspace; `http` sends them to a pool
//! of remote worker servers.

mod http;
mod local;

pub use http::HttpEngine;
pub use local::LocalEngine;

use crate::config::{Config, EngineKind};
use crate::mutation::{WorkItem, WorkResult};
use crate::operators::OperatorCatalog;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;

/// A finished work item and its result.
pub type Completion = (WorkItem, WorkResult);

/// Shared queue that workers pull work items from.
type TaskQueue = Arc<TokioMutex<mpsc::UnboundedReceiver<WorkItem>>>;

pub enum Engine {
    Local(LocalEngine),
    Http(HttpEngine),
}

impl Engine {
    pub fn from_config(
        config: &Config,
        project_root: &Path,
        catalog: Arc<OperatorCatalog>,
    ) -> Result<Self> {
        Ok(match config.execution_engine.name {
            EngineKind::Local => Engine::Local(LocalEngine::new(config, project_root, catalog)),
            EngineKind::Http => Engine::Http(HttpEngine::new(config)?),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Engine::Local(_) => "local",
            Engine::Http(_) => "http",
        }
    }

    /// Run every item, sending one completion per item to `results`.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        results: mpsc::UnboundedSender<Completion>,
    ) -> Result<()> {
        match self {
            Engine::Local(engine) => engine.run(items, results).await,
            Engine::Http(engine) => engine.run(items, results).await,
        }
    }
}

fn task_queue(items: Vec<WorkItem>) -> TaskQueue {
    let (tx, rx) = mpsc::unbounded_channel();
    for item in items {
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(item);
    }
    Arc::new(TokioMutex::new(rx))
}

async fn next_item(queue: &TaskQueue) -> Option<WorkItem> {
    queue.lock().await.recv().await
}

/// Report every item no worker picked up as `ABNORMAL`.
async fn drain_unassigned(
    queue: &TaskQueue,
    results: &mpsc::UnboundedSender<Completion>,
    reason: &str,
) -> usize {
    let mut rx = queue.lock().await;
    let mut drained = 0;
    while let Ok(item) = rx.try_recv() {
        let _ = results.send((item, WorkResult::abnormal(reason)));
        drained += 1;
    }
    if drained > 0 {
        tracing::error!("{} work items could not be dispatched: {}", drained, reason);
    }
    drained
}

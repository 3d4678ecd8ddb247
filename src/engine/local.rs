use super::{drain_unassigned, next_item, task_queue, Completion, TaskQueue};
use crate::config::{CloningConfig, Config};
use crate::mutation::{mutate_and_test, MutationConfig, WorkItem, WorkResult};
use crate::operators::OperatorCatalog;
use crate::workspace::Workspace;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a local worker needs besides its queue.
struct WorkerContext {
    project_root: PathBuf,
    cloning: CloningConfig,
    mutation: MutationConfig,
    catalog: Arc<OperatorCatalog>,
}

/// Runs work items in local worker tasks, one private workspace per worker.
pub struct LocalEngine {
    context: Arc<WorkerContext>,
    workers: usize,
}

impl LocalEngine {
    pub fn new(config: &Config, project_root: &Path, catalog: Arc<OperatorCatalog>) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                project_root: project_root.to_path_buf(),
                cloning: config.cloning.clone(),
                mutation: config.mutation_config(),
                catalog,
            }),
            workers: config.execution_engine.local.workers(),
        }
    }

    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        results: mpsc::UnboundedSender<Completion>,
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let workers = self.workers.clamp(1, items.len());
        tracing::info!("Starting {} local workers for {} work items", workers, items.len());

        let queue = task_queue(items);
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(local_worker(
                    id,
                    self.context.clone(),
                    queue.clone(),
                    results.clone(),
                ))
            })
            .collect();

        for (id, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!("Local worker {} failed: {}", id, e);
            }
        }

        drain_unassigned(&queue, &results, "No local worker was available to run this item").await;
        Ok(())
    }
}

async fn local_worker(
    id: usize,
    context: Arc<WorkerContext>,
    queue: TaskQueue,
    results: mpsc::UnboundedSender<Completion>,
) {
    // Created on first use and reused for every later item.
    let mut workspace: Option<Workspace> = None;

    while let Some(item) = next_item(&queue).await {
        let root = match &workspace {
            Some(ws) => ws.root().to_path_buf(),
            None => match Workspace::clone_from(&context.project_root, &context.cloning).await {
                Ok(ws) => {
                    let root = ws.root().to_path_buf();
                    workspace = Some(ws);
                    root
                }
                Err(e) => {
                    tracing::error!("Worker {} could not create its workspace: {:#}", id, e);
                    let _ = results.send((
                        item,
                        WorkResult::abnormal(format!("Workspace setup failed: {:#}", e)),
                    ));
                    return;
                }
            },
        };

        tracing::debug!("Worker {} running {}", id, item.job_id());
        let result = mutate_and_test(
            root,
            item.mutations().to_vec(),
            context.mutation.clone(),
            context.catalog.clone(),
        )
        .await;

        if results.send((item, result)).is_err() {
            tracing::debug!("Worker {} stopping: results receiver closed", id);
            return;
        }
    }

    tracing::debug!("Worker {} finished - no more work items", id);
}

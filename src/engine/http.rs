use super::{drain_unassigned, next_item, task_queue, Completion, TaskQueue};
use crate::config::Config;
use crate::mutation::{MutationConfig, WorkItem, WorkResult};
use crate::web::MutateRequest;
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Client for one remote worker server
#[derive(Clone)]
pub struct WorkerClient {
    client: Client,
    base_url: String,
}

impl WorkerClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the worker to run one mutate-and-test cycle.
    pub async fn mutate_and_test(
        &self,
        request: &MutateRequest,
        timeout: Duration,
    ) -> Result<WorkResult> {
        let url = format!("{}/mutate-and-test", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .context("Failed to send request to worker")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Worker error: {} - {}", status, body);
        }

        response
            .json::<WorkResult>()
            .await
            .context("Failed to parse worker response")
    }
}

struct RequestContext {
    mutation: MutationConfig,
    python_version: Option<String>,
    timeout: Duration,
}

/// Sends work items to a pool of remote workers, one request in flight per worker.
///
/// A worker whose request fails at the transport level is evicted for the
/// rest of the run and the item it held is reported `ABNORMAL`.
pub struct HttpEngine {
    workers: Vec<WorkerClient>,
    context: Arc<RequestContext>,
}

impl HttpEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        config.validate()?;
        let http = &config.execution_engine.http;
        let timeout = Duration::try_from_secs_f64(config.timeout + http.request_timeout_margin)
            .context("Request timeout is out of range")?;

        Ok(Self {
            workers: http
                .worker_urls
                .iter()
                .map(|url| WorkerClient::new(client.clone(), url))
                .collect(),
            context: Arc::new(RequestContext {
                mutation: config.mutation_config(),
                python_version: config.required_python_version().map(str::to_string),
                timeout,
            }),
        })
    }

    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        results: mpsc::UnboundedSender<Completion>,
    ) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        tracing::info!(
            "Dispatching {} work items to {} remote workers",
            items.len(),
            self.workers.len()
        );

        let queue = task_queue(items);
        let handles: Vec<_> = self
            .workers
            .iter()
            .map(|worker| {
                tokio::spawn(remote_worker(
                    worker.clone(),
                    self.context.clone(),
                    queue.clone(),
                    results.clone(),
                ))
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Remote worker task failed: {}", e);
            }
        }

        drain_unassigned(&queue, &results, "All remote workers were evicted").await;
        Ok(())
    }
}

async fn remote_worker(
    worker: WorkerClient,
    context: Arc<RequestContext>,
    queue: TaskQueue,
    results: mpsc::UnboundedSender<Completion>,
) {
    while let Some(item) = next_item(&queue).await {
        let request = MutateRequest::new(&item, &context.mutation, context.python_version.clone());

        match worker.mutate_and_test(&request, context.timeout).await {
            Ok(result) => {
                if results.send((item, result)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("Evicting worker {}: {:#}", worker.base_url(), e);
                let _ = results.send((
                    item,
                    WorkResult::abnormal(format!("Worker {} failed: {:#}", worker.base_url(), e)),
                ));
                return;
            }
        }
    }
}

//! Session lifecycle: initialization, execution and the baseline check.
//!
//! Initialization scans the configured modules, turns every site of every
//! enumerable operator into a first-order mutation, combines them into work
//! items up to the configured order, optionally samples them, and stores the
//! items (with interceptor vetoes already recorded) in the session store.

use crate::config::{Config, GenerationConfig};
use crate::db::{SessionStore, Summary};
use crate::engine::{Completion, Engine};
use crate::interceptors;
use crate::language::Language;
use crate::mutation::analyzer::find_mutation_specs;
use crate::mutation::{MutationSpec, WorkItem, WorkResult, WorkerOutcome};
use crate::operators::{OperatorCatalog, NOOP_OPERATOR};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("the session has no work items to build a baseline from")]
    NoWorkItems,
    #[error("baseline did not survive ({outcome}); the test suite fails without any mutation:\n{output}")]
    Failed { outcome: String, output: String },
}

/// Compute a SHA256 hash of the content
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A source module found by the scan
#[derive(Debug, Clone)]
pub struct ScannedModule {
    /// Path relative to the project root
    pub path: PathBuf,
    pub source: String,
}

impl ScannedModule {
    pub fn hash(&self) -> String {
        compute_hash(&self.source)
    }
}

/// Find the modules under `config.module_path` that are not excluded.
pub fn scan_modules(config: &Config, project_root: &Path) -> Result<Vec<ScannedModule>> {
    let target = project_root.join(&config.module_path);
    if !target.exists() {
        anyhow::bail!("Module path {} does not exist", target.display());
    }

    let mut modules = Vec::new();
    for file in Language::Python.find_source_files(&target)? {
        let path = file
            .strip_prefix(project_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| file.clone());
        if config.is_module_excluded(&path) {
            tracing::debug!("Excluding module {}", path.display());
            continue;
        }
        let source = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read module {}", file.display()))?;
        modules.push(ScannedModule { path, source });
    }
    Ok(modules)
}

/// Every first-order mutation of every enumerable, non-excluded operator.
pub fn find_sites(
    config: &Config,
    modules: &[ScannedModule],
    catalog: &OperatorCatalog,
) -> Result<Vec<MutationSpec>> {
    let operators: Vec<_> = catalog
        .enumerable()
        .filter(|op| !config.operators.is_excluded(op.name()))
        .collect();

    let mut sites = Vec::new();
    for module in modules {
        let tree = Language::Python
            .parse(&module.source)
            .with_context(|| format!("Failed to parse {}", module.path.display()))?;
        if tree.root().has_error() {
            tracing::warn!("{} contains syntax errors", module.path.display());
        }
        for operator in &operators {
            for args in config.operators.args_for(operator.name()) {
                sites.extend(find_mutation_specs(&module.path, &tree, operator.as_ref(), &args));
            }
        }
    }
    Ok(sites)
}

/// Call `visit` with each set of `order` pairwise non-overlapping sites.
fn for_each_combination(
    sites: &[MutationSpec],
    order: usize,
    visit: &mut impl FnMut(&[usize]),
) {
    fn extend(
        sites: &[MutationSpec],
        order: usize,
        start: usize,
        chosen: &mut Vec<usize>,
        visit: &mut impl FnMut(&[usize]),
    ) {
        if chosen.len() == order {
            visit(chosen);
            return;
        }
        for next in start..sites.len() {
            if chosen.iter().any(|&c| sites[c].overlaps(&sites[next])) {
                continue;
            }
            chosen.push(next);
            extend(sites, order, next + 1, chosen, visit);
            chosen.pop();
        }
    }

    if order == 0 || order > sites.len() {
        return;
    }
    extend(sites, order, 0, &mut Vec::with_capacity(order), visit);
}

/// Reservoir sample of at most `capacity` items, kept in arrival order.
struct Reservoir<T> {
    capacity: usize,
    seen: usize,
    items: Vec<(usize, T)>,
    rng: fastrand::Rng,
}

impl<T> Reservoir<T> {
    fn new(capacity: usize, seed: Option<u64>) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::new(),
            rng: seed.map(fastrand::Rng::with_seed).unwrap_or_default(),
        }
    }

    fn offer(&mut self, item: T) {
        let index = self.seen;
        self.seen += 1;
        if self.capacity == 0 || self.items.len() < self.capacity {
            self.items.push((index, item));
            return;
        }
        let slot = self.rng.usize(..self.seen);
        if slot < self.capacity {
            self.items[slot] = (index, item);
        }
    }

    fn into_vec(mut self) -> Vec<T> {
        self.items.sort_by_key(|(index, _)| *index);
        self.items.into_iter().map(|(_, item)| item).collect()
    }
}

/// Combine first-order sites into mutation sets according to `generation`.
///
/// Orders run from 1 to `max_order` (or only `max_order` with `exact_order`);
/// combinations containing overlapping sites are never produced. With
/// `max_items` set, a uniform random sample of that size is kept.
pub fn combinations(sites: &[MutationSpec], generation: &GenerationConfig) -> Vec<Vec<MutationSpec>> {
    let max_order = generation.max_order.max(1);
    let min_order = if generation.exact_order { max_order } else { 1 };

    let mut reservoir = Reservoir::new(generation.max_items, generation.seed);
    for order in min_order..=max_order {
        for_each_combination(sites, order, &mut |chosen: &[usize]| {
            reservoir.offer(chosen.iter().map(|&i| sites[i].clone()).collect::<Vec<_>>());
        });
    }
    reservoir.into_vec()
}

/// Outcome of session initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub modules: usize,
    pub sites: usize,
    pub work_items: usize,
    pub skipped: usize,
}

/// Initialize the session: replaces any previous content of the store.
pub async fn init(
    store: &SessionStore,
    config: &Config,
    project_root: &Path,
    catalog: &OperatorCatalog,
) -> Result<InitReport> {
    config.validate()?;

    let modules = scan_modules(config, project_root)?;
    let sites = find_sites(config, &modules, catalog)?;
    let items = combinations(&sites, &config.generation)
        .into_iter()
        .map(WorkItem::with_new_id)
        .collect::<Result<Vec<_>, _>>()?;

    let skipped = interceptors::apply(&interceptors::from_config(config), &items);

    store.clear().await?;
    store.set_config(config).await?;
    store.add_work_items(&items).await?;
    for (job_id, result) in &skipped {
        store.set_result(job_id, result).await?;
    }
    let hashes: Vec<(PathBuf, String)> = modules.iter().map(|m| (m.path.clone(), m.hash())).collect();
    store.set_module_hashes(&hashes).await?;

    let report = InitReport {
        modules: modules.len(),
        sites: sites.len(),
        work_items: items.len(),
        skipped: skipped.len(),
    };
    tracing::info!(
        "Initialized session: {} modules, {} sites, {} work items ({} skipped)",
        report.modules,
        report.sites,
        report.work_items,
        report.skipped
    );
    Ok(report)
}

/// Modules whose content no longer matches the fingerprint taken at init.
pub async fn changed_modules(store: &SessionStore, project_root: &Path) -> Result<Vec<PathBuf>> {
    let mut changed = Vec::new();
    for (path, hash) in store.module_hashes().await? {
        let current = std::fs::read_to_string(project_root.join(&path))
            .map(|source| compute_hash(&source))
            .ok();
        if current.as_deref() != Some(hash.as_str()) {
            changed.push(path);
        }
    }
    Ok(changed)
}

/// Run `items` on `engine`, recording each result as soon as it arrives.
///
/// Returns the number of results recorded.
pub async fn run_items(engine: &Engine, items: Vec<WorkItem>, store: &SessionStore) -> Result<usize> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

    let record = async {
        let mut recorded = 0;
        while let Some((item, result)) = rx.recv().await {
            tracing::info!(
                "{} {} -> {} {}",
                item.job_id(),
                item.mutations()
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                result.worker_outcome(),
                result
                    .test_outcome()
                    .map(|o| o.as_str())
                    .unwrap_or_default()
            );
            store.set_result(item.job_id(), &result).await?;
            recorded += 1;
        }
        anyhow::Ok(recorded)
    };

    let (run, recorded) = tokio::join!(engine.run(items, tx), record);
    run?;
    recorded
}

/// Execute every pending work item of the session.
pub async fn exec(
    store: &SessionStore,
    project_root: &Path,
    catalog: Arc<OperatorCatalog>,
) -> Result<Summary> {
    let config = store.get_config().await?;

    for path in changed_modules(store, project_root).await? {
        tracing::warn!(
            "{} changed since the session was initialized; its work items may report no_test",
            path.display()
        );
    }

    let pending = store.pending_work_items().await?;
    let recorded = store.num_results().await?;
    if recorded > 0 {
        tracing::info!("Resuming session with {} results already recorded", recorded);
    }
    let engine = Engine::from_config(&config, project_root, catalog)?;
    tracing::info!(
        "Executing {} pending work items with the {} engine",
        pending.len(),
        engine.name()
    );
    run_items(&engine, pending, store).await?;

    Ok(store.summary().await?)
}

/// The no-op work item used to check the test suite before trusting results.
pub fn baseline_item(items: &[WorkItem]) -> Result<WorkItem, BaselineError> {
    let first = items
        .first()
        .and_then(|item| item.mutations().first())
        .ok_or(BaselineError::NoWorkItems)?;
    WorkItem::with_new_id(vec![first.with_operator(NOOP_OPERATOR, 0)])
        .map_err(|_| BaselineError::NoWorkItems)
}

/// Run the baseline item with the configured engine.
///
/// Fails with `BaselineError::Failed` unless the unmutated code survives.
pub async fn baseline(
    store: &SessionStore,
    project_root: &Path,
    catalog: Arc<OperatorCatalog>,
) -> Result<WorkResult> {
    let config = store.get_config().await?;
    let item = baseline_item(&store.work_items().await?)?;
    let engine = Engine::from_config(&config, project_root, catalog)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.run(vec![item], tx).await?;
    let (_, result) = rx
        .recv()
        .await
        .context("Engine returned no baseline result")?;

    if result.is_survivor() {
        tracing::info!("Baseline survived; the test suite passes on unmutated code");
        Ok(result)
    } else {
        let outcome = match result.test_outcome() {
            Some(test) if result.worker_outcome() == WorkerOutcome::Normal => test.to_string(),
            _ => result.worker_outcome().to_string(),
        };
        tracing::error!("Baseline failed: {}", outcome);
        Err(BaselineError::Failed {
            outcome,
            output: result.output().to_string(),
        }
        .into())
    }
}

//! Durable session store.
//!
//! A session is one SQLite file holding the configuration, every work item
//! with its mutations, and the result recorded for each completed item. A
//! work item without a result is pending, which is what makes `exec`
//! resumable after an interruption.

mod models;

pub use models::*;

use crate::config::{Config, ConfigError};
use crate::mutation::{MutationSpec, TestOutcome, WorkItem, WorkResult, WorkerOutcome};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no work item with job id {0}")]
    UnknownJob(String),
    #[error("a work item with job id {0} already exists")]
    DuplicateJob(String),
    #[error("the session has no configuration")]
    ConfigNotSet,
    #[error("stored configuration is invalid: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to encode configuration: {0}")]
    ConfigEncoding(#[from] toml::ser::Error),
    #[error("corrupt session record: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session store backed by SQLite
#[derive(Clone)]
pub struct SessionStore {
    pool: Pool<Sqlite>,
}

impl SessionStore {
    /// Open (creating if needed) the session file at `path`
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS work_items (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mutation_specs (
                job_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                module_path TEXT NOT NULL,
                operator_name TEXT NOT NULL,
                occurrence INTEGER NOT NULL,
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL,
                operator_args TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (job_id, position),
                FOREIGN KEY (job_id) REFERENCES work_items(job_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                job_id TEXT PRIMARY KEY,
                worker_outcome TEXT NOT NULL,
                test_outcome TEXT,
                output TEXT NOT NULL,
                diff TEXT NOT NULL,
                FOREIGN KEY (job_id) REFERENCES work_items(job_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                toml TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS modules (
                module_path TEXT PRIMARY KEY,
                sha256 TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store the session configuration, replacing any previous one
    pub async fn set_config(&self, config: &Config) -> Result<(), StoreError> {
        let text = toml::to_string_pretty(config)?;
        sqlx::query(
            "INSERT INTO config (id, toml) VALUES (1, ?) ON CONFLICT(id) DO UPDATE SET toml = excluded.toml",
        )
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_config(&self) -> Result<Config, StoreError> {
        let row = sqlx::query("SELECT toml FROM config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::ConfigNotSet)?;
        let text: String = row.get("toml");
        Ok(Config::from_toml_str(&text)?)
    }

    /// Remove all work items, results and module fingerprints
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in ["results", "mutation_specs", "work_items", "modules"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Add work items atomically; fails without adding anything on a duplicate job id
    pub async fn add_work_items(&self, items: &[WorkItem]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            let inserted = sqlx::query("INSERT OR IGNORE INTO work_items (job_id) VALUES (?)")
                .bind(item.job_id())
                .execute(&mut *tx)
                .await?;
            if inserted.rows_affected() == 0 {
                return Err(StoreError::DuplicateJob(item.job_id().to_string()));
            }

            for (position, spec) in item.mutations().iter().enumerate() {
                insert_spec(&mut tx, item.job_id(), position, spec).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// All work items in insertion order
    pub async fn work_items(&self) -> Result<Vec<WorkItem>, StoreError> {
        let rows = sqlx::query_as::<_, MutationSpecRow>(
            r#"
            SELECT s.* FROM mutation_specs s
            JOIN work_items w ON w.job_id = s.job_id
            ORDER BY w.seq, s.position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        group_items(rows)
    }

    /// Work items that have no result yet, in insertion order
    pub async fn pending_work_items(&self) -> Result<Vec<WorkItem>, StoreError> {
        let rows = sqlx::query_as::<_, MutationSpecRow>(
            r#"
            SELECT s.* FROM mutation_specs s
            JOIN work_items w ON w.job_id = s.job_id
            LEFT JOIN results r ON r.job_id = w.job_id
            WHERE r.job_id IS NULL
            ORDER BY w.seq, s.position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        group_items(rows)
    }

    /// Work items paired with their results, in insertion order
    pub async fn completed_work_items(&self) -> Result<Vec<(WorkItem, WorkResult)>, StoreError> {
        let items = self.work_items().await?;
        let mut results: BTreeMap<String, WorkResult> = BTreeMap::new();
        let rows = sqlx::query_as::<_, ResultRow>("SELECT * FROM results")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let job_id = row.job_id.clone();
            results.insert(job_id, row.into_result()?);
        }

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let result = results.remove(item.job_id())?;
                Some((item, result))
            })
            .collect())
    }

    pub async fn work_item(&self, job_id: &str) -> Result<Option<WorkItem>, StoreError> {
        let rows = sqlx::query_as::<_, MutationSpecRow>(
            "SELECT * FROM mutation_specs WHERE job_id = ? ORDER BY position",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(group_items(rows)?.into_iter().next())
    }

    pub async fn result(&self, job_id: &str) -> Result<Option<WorkResult>, StoreError> {
        let row = sqlx::query_as::<_, ResultRow>("SELECT * FROM results WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ResultRow::into_result).transpose()
    }

    /// Record the result for a job, replacing any earlier one
    pub async fn set_result(&self, job_id: &str, result: &WorkResult) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let known = sqlx::query("SELECT 1 FROM work_items WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !known {
            return Err(StoreError::UnknownJob(job_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO results (job_id, worker_outcome, test_outcome, output, diff)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                worker_outcome = excluded.worker_outcome,
                test_outcome = excluded.test_outcome,
                output = excluded.output,
                diff = excluded.diff
            "#,
        )
        .bind(job_id)
        .bind(result.worker_outcome().as_str())
        .bind(result.test_outcome().map(|t| t.as_str()))
        .bind(result.output())
        .bind(result.diff())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn num_work_items(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM work_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as usize)
    }

    pub async fn num_results(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM results")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as usize)
    }

    pub async fn summary(&self) -> Result<Summary, StoreError> {
        let mut summary = Summary {
            total: self.num_work_items().await?,
            ..Default::default()
        };
        let rows = sqlx::query(
            "SELECT worker_outcome, test_outcome, COUNT(*) AS n FROM results GROUP BY worker_outcome, test_outcome",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let worker: String = row.get("worker_outcome");
            let test: Option<String> = row.get("test_outcome");
            let count: i64 = row.get("n");
            let worker = worker
                .parse::<WorkerOutcome>()
                .map_err(StoreError::Corrupt)?;
            let test = test
                .map(|t| t.parse::<TestOutcome>())
                .transpose()
                .map_err(StoreError::Corrupt)?;
            summary.record(worker, test, count as usize);
        }
        Ok(summary)
    }

    /// Replace the stored module fingerprints
    pub async fn set_module_hashes(&self, hashes: &[(PathBuf, String)]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM modules").execute(&mut *tx).await?;
        for (path, hash) in hashes {
            sqlx::query("INSERT INTO modules (module_path, sha256) VALUES (?, ?)")
                .bind(path.to_string_lossy().as_ref())
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn module_hashes(&self) -> Result<BTreeMap<PathBuf, String>, StoreError> {
        let rows = sqlx::query("SELECT module_path, sha256 FROM modules")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let path: String = row.get("module_path");
                (PathBuf::from(path), row.get("sha256"))
            })
            .collect())
    }
}

async fn insert_spec(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    job_id: &str,
    position: usize,
    spec: &MutationSpec,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO mutation_specs (
            job_id, position, module_path, operator_name, occurrence,
            start_line, start_col, end_line, end_col, operator_args
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job_id)
    .bind(position as i64)
    .bind(spec.module_path().to_string_lossy().as_ref())
    .bind(spec.operator_name())
    .bind(spec.occurrence() as i64)
    .bind(spec.start_pos().line as i64)
    .bind(spec.start_pos().column as i64)
    .bind(spec.end_pos().line as i64)
    .bind(spec.end_pos().column as i64)
    .bind(serde_json::to_string(spec.operator_args())?)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Group rows ordered by job into work items.
fn group_items(rows: Vec<MutationSpecRow>) -> Result<Vec<WorkItem>, StoreError> {
    let mut grouped: Vec<(String, Vec<MutationSpec>)> = Vec::new();
    for row in rows {
        let job_id = row.job_id.clone();
        let spec = row.into_spec()?;
        match grouped.last_mut() {
            Some((last, specs)) if *last == job_id => specs.push(spec),
            _ => grouped.push((job_id, vec![spec])),
        }
    }
    grouped
        .into_iter()
        .map(|(job_id, specs)| {
            WorkItem::new(job_id, specs).map_err(|e| StoreError::Corrupt(e.to_string()))
        })
        .collect()
}

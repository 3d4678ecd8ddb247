use super::StoreError;
use crate::mutation::{
    MutationSpec, OperatorArgs, Position, TestOutcome, WorkResult, WorkerOutcome,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One mutation of a stored work item
#[derive(Debug, Clone, FromRow)]
pub struct MutationSpecRow {
    pub job_id: String,
    pub module_path: String,
    pub operator_name: String,
    pub occurrence: i64,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    /// JSON object of operator arguments
    pub operator_args: String,
}

impl MutationSpecRow {
    pub fn into_spec(self) -> Result<MutationSpec, StoreError> {
        let args: OperatorArgs = serde_json::from_str(&self.operator_args)?;
        MutationSpec::new(
            self.module_path,
            self.operator_name,
            to_usize(self.occurrence)?,
            Position::new(to_usize(self.start_line)?, to_usize(self.start_col)?),
            Position::new(to_usize(self.end_line)?, to_usize(self.end_col)?),
            args,
        )
        .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

fn to_usize(value: i64) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative value {}", value)))
}

/// A stored work result
#[derive(Debug, Clone, FromRow)]
pub struct ResultRow {
    pub job_id: String,
    pub worker_outcome: String,
    pub test_outcome: Option<String>,
    pub output: String,
    pub diff: String,
}

impl ResultRow {
    pub fn into_result(self) -> Result<WorkResult, StoreError> {
        let worker_outcome: WorkerOutcome =
            self.worker_outcome.parse().map_err(StoreError::Corrupt)?;
        let test_outcome = self
            .test_outcome
            .map(|t| t.parse::<TestOutcome>())
            .transpose()
            .map_err(StoreError::Corrupt)?;
        WorkResult::from_parts(worker_outcome, test_outcome, self.output, self.diff)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

/// Aggregate counts for a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub normal: usize,
    pub exception: usize,
    pub abnormal: usize,
    pub no_test: usize,
    pub skipped: usize,
    pub killed: usize,
    pub survived: usize,
    pub incompetent: usize,
}

impl Summary {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    pub(crate) fn record(&mut self, worker: WorkerOutcome, test: Option<TestOutcome>, count: usize) {
        self.completed += count;
        match worker {
            WorkerOutcome::Normal => self.normal += count,
            WorkerOutcome::Exception => self.exception += count,
            WorkerOutcome::Abnormal => self.abnormal += count,
            WorkerOutcome::NoTest => self.no_test += count,
            WorkerOutcome::Skipped => self.skipped += count,
        }
        match test {
            Some(TestOutcome::Killed) => self.killed += count,
            Some(TestOutcome::Survived) => self.survived += count,
            Some(TestOutcome::Incompetent) => self.incompetent += count,
            None => {}
        }
    }

    /// Calculate the mutation score (killed / (killed + survived + incompetent))
    pub fn mutation_score(&self) -> f64 {
        let testable = self.killed + self.survived + self.incompetent;
        if testable == 0 {
            0.0
        } else {
            self.killed as f64 / testable as f64
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total work items: {}", self.total)?;
        writeln!(f, "complete: {} ({} pending)", self.completed, self.pending())?;
        writeln!(
            f,
            "killed: {}  survived: {}  incompetent: {}",
            self.killed, self.survived, self.incompetent
        )?;
        writeln!(
            f,
            "no test: {}  skipped: {}  exception: {}  abnormal: {}",
            self.no_test, self.skipped, self.exception, self.abnormal
        )?;
        write!(f, "mutation score: {:.2}%", self.mutation_score() * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_score_counts_incompetent_as_testable() {
        let summary = Summary {
            killed: 6,
            survived: 2,
            incompetent: 2,
            ..Default::default()
        };
        assert!((summary.mutation_score() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mutation_score_ignores_untested_outcomes() {
        let mut summary = Summary::default();
        summary.record(WorkerOutcome::Normal, Some(TestOutcome::Killed), 3);
        summary.record(WorkerOutcome::Normal, Some(TestOutcome::Survived), 1);
        summary.record(WorkerOutcome::NoTest, None, 4);
        summary.record(WorkerOutcome::Skipped, None, 2);
        summary.record(WorkerOutcome::Abnormal, None, 1);
        assert_eq!(summary.completed, 11);
        assert_eq!(summary.normal, 4);
        assert!((summary.mutation_score() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mutation_score_empty() {
        assert!((Summary::default().mutation_score() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pending() {
        let summary = Summary {
            total: 10,
            completed: 4,
            ..Default::default()
        };
        assert_eq!(summary.pending(), 6);
    }

    #[test]
    fn test_result_row_rejects_unknown_outcome() {
        let row = ResultRow {
            job_id: "j".into(),
            worker_outcome: "exploded".into(),
            test_outcome: None,
            output: String::new(),
            diff: String::new(),
        };
        assert!(matches!(row.into_result(), Err(StoreError::Corrupt(_))));
    }
}

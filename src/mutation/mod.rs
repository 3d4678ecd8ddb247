//! Mutation testing core.
//!
//! This module provides:
//! - The data model shared by every part of the engine (mutation specs,
//!   work items, results and their outcome taxonomies)
//! - Site enumeration and addressing (`analyzer`)
//! - The mutate-and-test cycle (`executor`)

pub mod analyzer;
pub mod executor;

pub use executor::mutate_and_test;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Operator-specific configuration attached to a mutation.
pub type OperatorArgs = serde_json::Map<String, serde_json::Value>;

/// Errors raised when constructing the immutable data model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("mutation span must end after it starts ({start} .. {end})")]
    EmptySpan { start: Position, end: Position },
    #[error("work item {0} has no mutations")]
    EmptyWorkItem(String),
    #[error("test outcome is only allowed for normal worker outcomes (got {0})")]
    UnexpectedTestOutcome(WorkerOutcome),
    #[error("normal worker outcome requires a test outcome")]
    MissingTestOutcome,
}

/// A line/column location. Lines are 1-based, columns are 0-based byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Addressable description of a single mutation.
///
/// The site is re-found by `(module_path, operator_name, occurrence)`; the
/// positions are informational and drive overlap detection and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MutationSpecRepr")]
pub struct MutationSpec {
    module_path: PathBuf,
    operator_name: String,
    occurrence: usize,
    start_pos: Position,
    end_pos: Position,
    operator_args: OperatorArgs,
}

#[derive(Deserialize)]
struct MutationSpecRepr {
    module_path: PathBuf,
    operator_name: String,
    occurrence: usize,
    start_pos: Position,
    end_pos: Position,
    #[serde(default)]
    operator_args: OperatorArgs,
}

impl TryFrom<MutationSpecRepr> for MutationSpec {
    type Error = SpecError;

    fn try_from(repr: MutationSpecRepr) -> Result<Self, Self::Error> {
        MutationSpec::new(
            repr.module_path,
            repr.operator_name,
            repr.occurrence,
            repr.start_pos,
            repr.end_pos,
            repr.operator_args,
        )
    }
}

impl MutationSpec {
    pub fn new(
        module_path: impl Into<PathBuf>,
        operator_name: impl Into<String>,
        occurrence: usize,
        start_pos: Position,
        end_pos: Position,
        operator_args: OperatorArgs,
    ) -> Result<Self, SpecError> {
        if end_pos <= start_pos {
            return Err(SpecError::EmptySpan {
                start: start_pos,
                end: end_pos,
            });
        }
        Ok(Self {
            module_path: module_path.into(),
            operator_name: operator_name.into(),
            occurrence,
            start_pos,
            end_pos,
            operator_args,
        })
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    pub fn occurrence(&self) -> usize {
        self.occurrence
    }

    pub fn start_pos(&self) -> Position {
        self.start_pos
    }

    pub fn end_pos(&self) -> Position {
        self.end_pos
    }

    pub fn operator_args(&self) -> &OperatorArgs {
        &self.operator_args
    }

    /// Same site metadata with a different operator and occurrence.
    pub fn with_operator(&self, operator_name: impl Into<String>, occurrence: usize) -> Self {
        Self {
            operator_name: operator_name.into(),
            occurrence,
            operator_args: OperatorArgs::new(),
            ..self.clone()
        }
    }

    /// Whether both mutations touch the same module and their spans intersect.
    pub fn overlaps(&self, other: &MutationSpec) -> bool {
        self.module_path == other.module_path
            && self.start_pos < other.end_pos
            && other.start_pos < self.end_pos
    }
}

impl std::fmt::Display for MutationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} {} #{}",
            self.module_path.display(),
            self.start_pos,
            self.operator_name,
            self.occurrence
        )
    }
}

/// Generate a fresh, random 128-bit job identifier.
pub fn new_job_id() -> String {
    format!("{:032x}", fastrand::u128(..))
}

/// A schedulable unit of work: one or more mutations applied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkItemRepr")]
pub struct WorkItem {
    job_id: String,
    mutations: Vec<MutationSpec>,
}

#[derive(Deserialize)]
struct WorkItemRepr {
    job_id: String,
    mutations: Vec<MutationSpec>,
}

impl TryFrom<WorkItemRepr> for WorkItem {
    type Error = SpecError;

    fn try_from(repr: WorkItemRepr) -> Result<Self, Self::Error> {
        WorkItem::new(repr.job_id, repr.mutations)
    }
}

impl WorkItem {
    pub fn new(job_id: impl Into<String>, mutations: Vec<MutationSpec>) -> Result<Self, SpecError> {
        let job_id = job_id.into();
        if mutations.is_empty() {
            return Err(SpecError::EmptyWorkItem(job_id));
        }
        Ok(Self { job_id, mutations })
    }

    /// Build a work item with a freshly generated job id.
    pub fn with_new_id(mutations: Vec<MutationSpec>) -> Result<Self, SpecError> {
        Self::new(new_job_id(), mutations)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn mutations(&self) -> &[MutationSpec] {
        &self.mutations
    }
}

/// How the worker machinery fared while executing a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// The cycle ran; a test outcome is available
    Normal,
    /// An error was caught in the mutation or test machinery
    Exception,
    /// The worker died or returned nothing usable
    Abnormal,
    /// The requested occurrence does not exist
    NoTest,
    /// An interceptor vetoed the item before execution
    Skipped,
}

impl WorkerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Exception => "exception",
            Self::Abnormal => "abnormal",
            Self::NoTest => "no_test",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "exception" => Ok(Self::Exception),
            "abnormal" => Ok(Self::Abnormal),
            "no_test" => Ok(Self::NoTest),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown worker outcome '{}'", other)),
        }
    }
}

/// Result of running tests against a mutant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    /// All tests passed - mutation was NOT caught
    Survived,
    /// A test failed - mutation was caught
    Killed,
    /// The test harness itself broke (import or syntax errors)
    Incompetent,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Survived => "survived",
            Self::Killed => "killed",
            Self::Incompetent => "incompetent",
        }
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "survived" => Ok(Self::Survived),
            "killed" => Ok(Self::Killed),
            "incompetent" => Ok(Self::Incompetent),
            other => Err(format!("unknown test outcome '{}'", other)),
        }
    }
}

/// Outcome of executing a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkResultRepr")]
pub struct WorkResult {
    worker_outcome: WorkerOutcome,
    test_outcome: Option<TestOutcome>,
    output: String,
    diff: String,
}

#[derive(Deserialize)]
struct WorkResultRepr {
    worker_outcome: WorkerOutcome,
    #[serde(default)]
    test_outcome: Option<TestOutcome>,
    #[serde(default)]
    output: String,
    #[serde(default)]
    diff: String,
}

impl TryFrom<WorkResultRepr> for WorkResult {
    type Error = SpecError;

    fn try_from(repr: WorkResultRepr) -> Result<Self, Self::Error> {
        WorkResult::from_parts(repr.worker_outcome, repr.test_outcome, repr.output, repr.diff)
    }
}

impl WorkResult {
    /// Rebuild a result from stored parts, enforcing the outcome invariant.
    pub fn from_parts(
        worker_outcome: WorkerOutcome,
        test_outcome: Option<TestOutcome>,
        output: String,
        diff: String,
    ) -> Result<Self, SpecError> {
        match (worker_outcome, test_outcome) {
            (WorkerOutcome::Normal, None) => Err(SpecError::MissingTestOutcome),
            (WorkerOutcome::Normal, Some(_)) | (_, None) => Ok(Self {
                worker_outcome,
                test_outcome,
                output,
                diff,
            }),
            (other, Some(_)) => Err(SpecError::UnexpectedTestOutcome(other)),
        }
    }

    pub fn normal(test_outcome: TestOutcome, output: String, diff: String) -> Self {
        Self {
            worker_outcome: WorkerOutcome::Normal,
            test_outcome: Some(test_outcome),
            output,
            diff,
        }
    }

    pub fn exception(output: impl Into<String>) -> Self {
        Self::without_tests(WorkerOutcome::Exception, output.into())
    }

    pub fn abnormal(output: impl Into<String>) -> Self {
        Self::without_tests(WorkerOutcome::Abnormal, output.into())
    }

    pub fn no_test(output: impl Into<String>) -> Self {
        Self::without_tests(WorkerOutcome::NoTest, output.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::without_tests(WorkerOutcome::Skipped, reason.into())
    }

    fn without_tests(worker_outcome: WorkerOutcome, output: String) -> Self {
        Self {
            worker_outcome,
            test_outcome: None,
            output,
            diff: String::new(),
        }
    }

    pub fn worker_outcome(&self) -> WorkerOutcome {
        self.worker_outcome
    }

    pub fn test_outcome(&self) -> Option<TestOutcome> {
        self.test_outcome
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    /// Ran normally and the tests still passed.
    pub fn is_survivor(&self) -> bool {
        self.worker_outcome == WorkerOutcome::Normal
            && self.test_outcome == Some(TestOutcome::Survived)
    }
}

/// How a test run that exceeds its timeout is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// `NORMAL` + `KILLED`: the mutant made the suite hang, which counts as detection
    #[default]
    Killed,
    /// `ABNORMAL`: the run is treated as a worker failure
    Abnormal,
}

/// Settings for one mutate-and-test cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Shell command that runs the test suite
    pub test_command: String,
    /// Wall-clock limit for the test command, in seconds
    pub timeout_seconds: f64,
    /// Classification of a run that exceeds `timeout_seconds`
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    /// Maximum test output to keep (bytes)
    #[serde(default = "default_max_output_bytes")]
    pub max_test_output_bytes: usize,
}

fn default_max_output_bytes() -> usize {
    10_000
}

impl MutationConfig {
    pub fn new(test_command: impl Into<String>, timeout_seconds: f64) -> Self {
        Self {
            test_command: test_command.into(),
            timeout_seconds,
            timeout_policy: TimeoutPolicy::default(),
            max_test_output_bytes: default_max_output_bytes(),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(self.timeout_seconds.max(0.0))
            .unwrap_or(std::time::Duration::MAX)
    }
}

//! The mutate-and-test cycle.
//!
//! Applies every mutation of a work item to the files under a workspace root,
//! runs the test command with a timeout, and restores the touched files on
//! every exit path.

use crate::language::Language;
use crate::mutation::analyzer::locate;
use crate::mutation::{MutationConfig, MutationSpec, TestOutcome, TimeoutPolicy, WorkResult};
use crate::operators::OperatorCatalog;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Output fragments that mean the test harness broke rather than a test failing.
const INCOMPETENCE_MARKERS: &[&str] = &[
    "SyntaxError",
    "IndentationError",
    "ImportError",
    "ModuleNotFoundError",
];

const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute one work item against the tree rooted at `root`.
///
/// Never fails: infrastructure errors and panics become `EXCEPTION`, missing
/// occurrences become `NO_TEST`.
pub async fn mutate_and_test(
    root: PathBuf,
    mutations: Vec<MutationSpec>,
    config: MutationConfig,
    catalog: Arc<OperatorCatalog>,
) -> WorkResult {
    mutate_and_test_until(root, mutations, config, catalog, std::future::pending())
        .await
        .unwrap_or_else(|| WorkResult::exception("Mutate-and-test cycle was interrupted"))
}

/// Like [`mutate_and_test`], but gives up as soon as `shutdown` completes.
///
/// An interrupted cycle kills the test processes, restores every touched
/// file and returns `None`.
pub async fn mutate_and_test_until(
    root: PathBuf,
    mutations: Vec<MutationSpec>,
    config: MutationConfig,
    catalog: Arc<OperatorCatalog>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Option<WorkResult> {
    // Own task so that a panic in the cycle is contained; the restore guard
    // still runs while unwinding.
    let cycle = tokio::spawn(async move {
        run_cycle(&root, &mutations, &config, &catalog, shutdown).await
    });

    match cycle.await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::warn!("Mutate-and-test cycle failed: {:#}", e);
            Some(WorkResult::exception(format!("{:#}", e)))
        }
        Err(e) => {
            tracing::error!("Mutate-and-test task aborted: {}", e);
            Some(WorkResult::exception(format!("Mutate-and-test task aborted: {}", e)))
        }
    }
}

/// A module with every mutation of the work item that targets it applied.
struct MutatedModule {
    /// Path as recorded in the mutation specs (used in diff headers)
    module_path: PathBuf,
    /// Path on disk
    path: PathBuf,
    original: String,
    mutated: String,
}

async fn run_cycle(
    root: &Path,
    mutations: &[MutationSpec],
    config: &MutationConfig,
    catalog: &OperatorCatalog,
    shutdown: impl Future<Output = ()>,
) -> Result<Option<WorkResult>> {
    let Some(modules) = plan_mutations(root, mutations, catalog).await? else {
        return Ok(Some(WorkResult::no_test(
            "Mutation site not found; the module changed since it was scanned",
        )));
    };

    let mut guard = RestoreGuard::default();
    for module in &modules {
        guard.track(module.path.clone(), module.original.clone());
        tokio::fs::write(&module.path, &module.mutated)
            .await
            .with_context(|| format!("Failed to write mutated {}", module.path.display()))?;
        clear_pycache(&module.path);
    }

    let run = tokio::select! {
        run = run_command_with_timeout(root, &config.test_command, config.timeout()) => run,
        _ = shutdown => {
            tracing::warn!("Cycle interrupted; restoring {} module(s)", modules.len());
            guard.restore()?;
            return Ok(None);
        }
    };
    guard.restore()?;
    let run = run?;

    let diff = unified_diff(&modules);
    let output = truncate_output(&run.output, config.max_test_output_bytes);

    let result = if run.timed_out {
        match config.timeout_policy {
            TimeoutPolicy::Killed => WorkResult::normal(TestOutcome::Killed, output, diff),
            TimeoutPolicy::Abnormal => WorkResult::abnormal(output),
        }
    } else {
        WorkResult::normal(classify(&run), output, diff)
    };

    tracing::debug!(
        "{} mutation(s) -> {} {} ({}ms)",
        mutations.len(),
        result.worker_outcome(),
        result
            .test_outcome()
            .map(|o| o.as_str())
            .unwrap_or_default(),
        run.duration_ms
    );

    Ok(Some(result))
}

/// Resolve every mutation against a freshly parsed tree of its module.
///
/// Mutations are grouped per module, in order of first appearance, and their
/// edits rendered together against the pristine text so that several edits
/// to one file compose. Returns `None` when any occurrence cannot be found.
async fn plan_mutations(
    root: &Path,
    mutations: &[MutationSpec],
    catalog: &OperatorCatalog,
) -> Result<Option<Vec<MutatedModule>>> {
    let mut grouped: Vec<(&Path, Vec<&MutationSpec>)> = Vec::new();
    for spec in mutations {
        match grouped.iter_mut().find(|(path, _)| *path == spec.module_path()) {
            Some((_, specs)) => specs.push(spec),
            None => grouped.push((spec.module_path(), vec![spec])),
        }
    }

    let mut modules = Vec::with_capacity(grouped.len());
    for (module_path, specs) in grouped {
        let path = root.join(module_path);
        let original = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read module {}", path.display()))?;
        let tree = Language::Python
            .parse(&original)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let mut edits = Vec::with_capacity(specs.len());
        for spec in specs {
            let operator = catalog
                .get(spec.operator_name())
                .with_context(|| format!("Unknown operator '{}'", spec.operator_name()))?;
            match locate(&tree, operator.as_ref(), spec.occurrence(), spec.operator_args())? {
                Some(edit) => edits.push(edit),
                None => {
                    tracing::debug!("No occurrence for {}", spec);
                    return Ok(None);
                }
            }
        }

        let mutated = tree
            .render(&edits)
            .with_context(|| format!("Failed to render mutated {}", path.display()))?;
        modules.push(MutatedModule {
            module_path: module_path.to_path_buf(),
            path,
            original,
            mutated,
        });
    }

    Ok(Some(modules))
}

/// Writes the remembered original contents back when restored or dropped.
#[derive(Default)]
struct RestoreGuard {
    originals: Vec<(PathBuf, String)>,
    restored: bool,
}

impl RestoreGuard {
    /// Remember `original` for `path`; must happen before the file is touched.
    fn track(&mut self, path: PathBuf, original: String) {
        self.originals.push((path, original));
    }

    fn restore(&mut self) -> Result<()> {
        self.restored = true;
        let mut first_error = None;
        for (path, original) in &self.originals {
            if let Err(e) = std::fs::write(path, original) {
                tracing::error!("CRITICAL: Failed to restore {}: {}", path.display(), e);
                first_error.get_or_insert_with(|| {
                    anyhow::anyhow!("Failed to restore {}: {}", path.display(), e)
                });
            }
            clear_pycache(path);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if !self.restored {
            let _ = self.restore();
        }
    }
}

/// Remove cached bytecode of a module so the next import re-reads the source.
fn clear_pycache(source_file: &Path) {
    let (Some(parent), Some(stem)) = (source_file.parent(), source_file.file_stem()) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(parent.join("__pycache__")) else {
        return;
    };
    let prefix = format!("{}.", stem.to_string_lossy());
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".pyc") {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

/// Result of running a shell command.
#[derive(Debug)]
struct CommandResult {
    success: bool,
    timed_out: bool,
    /// Combined stdout and stderr output.
    output: String,
    duration_ms: u64,
}

/// Kills the process group of a test command when dropped.
///
/// The test command runs in its own process group, so this also reaches
/// test runners and other descendants that `sh` started.
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn kill(&self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            // ESRCH: every member has already exited.
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Output of a reader task. Descendants that left the process group may
/// hold the pipe open, so the wait is bounded.
async fn join_pipe(reader: tokio::task::JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, reader).await {
        Ok(Ok(bytes)) => bytes,
        _ => Vec::new(),
    }
}

/// Run a shell command with a timeout.
///
/// The command is executed via `sh -c` so that test commands may use shell
/// features. When the command finishes or the timeout expires, every process
/// it started is killed, so nothing outlives the cycle.
async fn run_command_with_timeout(
    working_dir: &Path,
    command: &str,
    timeout: Duration,
) -> Result<CommandResult> {
    use std::process::Stdio;

    let start = Instant::now();

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn test command '{}'", command))?;
    let group = ProcessGroup {
        pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
    };

    let stdout = tokio::spawn(read_pipe(child.stdout.take()));
    let stderr = tokio::spawn(read_pipe(child.stderr.take()));

    let status = tokio::time::timeout(timeout, child.wait()).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    // Stragglers would keep the pipes open and race with the restore.
    group.kill();
    if status.is_err() {
        let _ = child.kill().await;
    }

    let stdout = join_pipe(stdout).await;
    let stderr = join_pipe(stderr).await;
    let mut output = format!(
        "{}{}",
        String::from_utf8_lossy(&stdout),
        String::from_utf8_lossy(&stderr)
    );

    match status {
        Ok(Ok(status)) => Ok(CommandResult {
            success: status.success(),
            timed_out: false,
            output,
            duration_ms,
        }),
        Ok(Err(e)) => Err(e).context("Test command execution error"),
        Err(_) => {
            tracing::debug!("Test command timed out after {:?}", timeout);
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&format!(
                "Test command timed out after {:.1} seconds",
                timeout.as_secs_f64()
            ));
            Ok(CommandResult {
                success: false,
                timed_out: true,
                output,
                duration_ms,
            })
        }
    }
}

fn classify(run: &CommandResult) -> TestOutcome {
    if run.success {
        TestOutcome::Survived
    } else if INCOMPETENCE_MARKERS.iter().any(|m| run.output.contains(m)) {
        TestOutcome::Incompetent
    } else {
        TestOutcome::Killed
    }
}

/// Concatenated unified diffs of every mutated module.
fn unified_diff(modules: &[MutatedModule]) -> String {
    use similar::TextDiff;

    modules
        .iter()
        .map(|m| {
            let name = m.module_path.display().to_string();
            TextDiff::from_lines(&m.original, &m.mutated)
                .unified_diff()
                .header(&format!("a/{}", name), &format!("b/{}", name))
                .to_string()
        })
        .collect()
}

fn truncate_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }
    let mut end = max_bytes;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &output[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{OperatorArgs, Position, WorkerOutcome};
    use crate::operators::NOOP_OPERATOR;
    use tempfile::TempDir;

    const MODULE: &str = "def f(x):\n    return x + 1\n";

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/m.py"), MODULE).unwrap();
        dir
    }

    fn spec(operator: &str, occurrence: usize) -> MutationSpec {
        MutationSpec::new(
            "pkg/m.py",
            operator,
            occurrence,
            Position::new(2, 11),
            Position::new(2, 16),
            OperatorArgs::new(),
        )
        .unwrap()
    }

    async fn run(dir: &TempDir, specs: Vec<MutationSpec>, config: MutationConfig) -> WorkResult {
        mutate_and_test(
            dir.path().to_path_buf(),
            specs,
            config,
            Arc::new(OperatorCatalog::standard()),
        )
        .await
    }

    fn module(dir: &TempDir) -> String {
        std::fs::read_to_string(dir.path().join("pkg/m.py")).unwrap()
    }

    #[tokio::test]
    async fn test_failing_tests_kill_and_file_is_restored() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/ReplaceBinaryOperator_Add_Sub", 0)],
            MutationConfig::new("exit 1", 10.0),
        )
        .await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::Normal);
        assert_eq!(result.test_outcome(), Some(TestOutcome::Killed));
        assert!(result.diff().contains("-    return x + 1"));
        assert!(result.diff().contains("+    return x - 1"));
        assert!(result.diff().contains("a/pkg/m.py"));
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_tests_see_the_mutant() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/ReplaceBinaryOperator_Add_Mul", 0)],
            MutationConfig::new("grep -q 'x \\* 1' pkg/m.py", 10.0),
        )
        .await;

        assert_eq!(result.test_outcome(), Some(TestOutcome::Survived));
        assert!(result.is_survivor());
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_higher_order_edits_compose_in_one_file() {
        let dir = project();
        let result = run(
            &dir,
            vec![
                spec("core/ReplaceBinaryOperator_Add_Sub", 0),
                spec("core/NumberReplacer", 0),
            ],
            MutationConfig::new("grep -q 'x - 2' pkg/m.py", 10.0),
        )
        .await;

        assert_eq!(result.test_outcome(), Some(TestOutcome::Survived));
        assert!(result.diff().contains("+    return x - 2"));
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_killed_by_default() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/NumberReplacer", 0)],
            MutationConfig::new("sleep 5", 0.2),
        )
        .await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::Normal);
        assert_eq!(result.test_outcome(), Some(TestOutcome::Killed));
        assert!(result.output().contains("timed out"));
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_timeout_abnormal_policy() {
        let dir = project();
        let mut config = MutationConfig::new("sleep 5", 0.2);
        config.timeout_policy = TimeoutPolicy::Abnormal;
        let result = run(&dir, vec![spec("core/NumberReplacer", 0)], config).await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::Abnormal);
        assert_eq!(result.test_outcome(), None);
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_missing_occurrence_is_no_test_and_runs_nothing() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/ReplaceBinaryOperator_Add_Sub", 1)],
            MutationConfig::new("touch ran", 10.0),
        )
        .await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::NoTest);
        assert!(!dir.path().join("ran").exists());
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_no_test_when_any_mutation_of_an_item_is_missing() {
        let dir = project();
        let result = run(
            &dir,
            vec![
                spec("core/ReplaceBinaryOperator_Add_Sub", 0),
                spec("core/ReplaceTrueWithFalse", 0),
            ],
            MutationConfig::new("exit 0", 10.0),
        )
        .await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::NoTest);
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_harness_errors_are_incompetent() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/NumberReplacer", 1)],
            MutationConfig::new("echo 'ImportError: no module' >&2; exit 2", 10.0),
        )
        .await;

        assert_eq!(result.test_outcome(), Some(TestOutcome::Incompetent));
        assert!(result.output().contains("ImportError"));
    }

    #[tokio::test]
    async fn test_unknown_operator_is_exception() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/DoesNotExist", 0)],
            MutationConfig::new("exit 0", 10.0),
        )
        .await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::Exception);
        assert!(result.output().contains("Unknown operator"));
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_missing_module_is_exception() {
        let dir = TempDir::new().unwrap();
        let result = run(
            &dir,
            vec![spec("core/NumberReplacer", 0)],
            MutationConfig::new("exit 0", 10.0),
        )
        .await;
        assert_eq!(result.worker_outcome(), WorkerOutcome::Exception);
    }

    #[tokio::test]
    async fn test_noop_baseline_survives_without_changes() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec(NOOP_OPERATOR, 0)],
            MutationConfig::new("exit 0", 10.0),
        )
        .await;

        assert_eq!(result.test_outcome(), Some(TestOutcome::Survived));
        assert!(result.diff().is_empty());
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let dir = project();
        let mut config = MutationConfig::new("printf 'abcdefghij'; exit 1", 10.0);
        config.max_test_output_bytes = 4;
        let result = run(&dir, vec![spec("core/NumberReplacer", 0)], config).await;
        assert_eq!(result.output(), "abcd...(truncated)");
    }

    #[tokio::test]
    async fn test_and_or_example_survives_then_runs_out_of_sites() {
        let dir = TempDir::new().unwrap();
        let source = "if True and False: pass\n";
        std::fs::write(dir.path().join("m.py"), source).unwrap();
        let and_or = |occurrence| {
            MutationSpec::new(
                "m.py",
                "core/ReplaceAndWithOr",
                occurrence,
                Position::new(1, 8),
                Position::new(1, 11),
                OperatorArgs::new(),
            )
            .unwrap()
        };

        let first = run(&dir, vec![and_or(0)], MutationConfig::new("exit 0", 10.0)).await;
        assert_eq!(first.worker_outcome(), WorkerOutcome::Normal);
        assert_eq!(first.test_outcome(), Some(TestOutcome::Survived));
        assert!(first.diff().contains("+if True or False: pass"));

        let second = run(&dir, vec![and_or(1)], MutationConfig::new("exit 0", 10.0)).await;
        assert_eq!(second.worker_outcome(), WorkerOutcome::NoTest);
        assert_eq!(std::fs::read(dir.path().join("m.py")).unwrap(), source.as_bytes());
    }

    #[tokio::test]
    async fn test_spawn_failure_after_write_restores_file() {
        let dir = project();
        // The mutation is on disk before the spawn fails on the NUL byte.
        let result = run(
            &dir,
            vec![spec("core/ReplaceBinaryOperator_Add_Sub", 0)],
            MutationConfig::new("exit 0\0", 10.0),
        )
        .await;

        assert_eq!(result.worker_outcome(), WorkerOutcome::Exception);
        assert!(result.output().contains("Failed to spawn test command"));
        assert_eq!(
            std::fs::read(dir.path().join("pkg/m.py")).unwrap(),
            MODULE.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/NumberReplacer", 0)],
            MutationConfig::new("sh -c 'sleep 1; touch marker'; true", 0.2),
        )
        .await;
        assert_eq!(result.test_outcome(), Some(TestOutcome::Killed));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("marker").exists());
        assert_eq!(module(&dir), MODULE);
    }

    #[tokio::test]
    async fn test_background_processes_do_not_outlive_the_run() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/NumberReplacer", 0)],
            MutationConfig::new("(sleep 1; touch marker) & exit 0", 10.0),
        )
        .await;
        assert_eq!(result.test_outcome(), Some(TestOutcome::Survived));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_timeout_keeps_captured_output() {
        let dir = project();
        let result = run(
            &dir,
            vec![spec("core/NumberReplacer", 0)],
            MutationConfig::new("echo collected 3 items; echo warming up >&2; sleep 5", 0.5),
        )
        .await;

        assert_eq!(result.test_outcome(), Some(TestOutcome::Killed));
        assert!(result.output().contains("collected 3 items"));
        assert!(result.output().contains("warming up"));
        assert!(result.output().ends_with("Test command timed out after 0.5 seconds"));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_cycle_and_restores() {
        let dir = project();
        let started = Instant::now();
        let result = mutate_and_test_until(
            dir.path().to_path_buf(),
            vec![spec("core/ReplaceBinaryOperator_Add_Sub", 0)],
            MutationConfig::new("sleep 1; touch marker; sleep 5", 30.0),
            Arc::new(OperatorCatalog::standard()),
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(module(&dir), MODULE);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("marker").exists());
    }

    #[test]
    fn test_restore_guard_restores_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "mutated").unwrap();
        {
            let mut guard = RestoreGuard::default();
            guard.track(path.clone(), "original".to_string());
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_clear_pycache_only_touches_matching_module() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("__pycache__");
        std::fs::create_dir(&cache).unwrap();
        std::fs::write(cache.join("m.cpython-312.pyc"), "").unwrap();
        std::fs::write(cache.join("mod.cpython-312.pyc"), "").unwrap();

        clear_pycache(&dir.path().join("m.py"));

        assert!(!cache.join("m.cpython-312.pyc").exists());
        assert!(cache.join("mod.cpython-312.pyc").exists());
    }

    #[test]
    fn test_classify() {
        let result = |success: bool, output: &str| CommandResult {
            success,
            timed_out: false,
            output: output.to_string(),
            duration_ms: 0,
        };
        assert_eq!(classify(&result(true, "")), TestOutcome::Survived);
        assert_eq!(classify(&result(false, "AssertionError")), TestOutcome::Killed);
        assert_eq!(
            classify(&result(false, "  File \"m.py\"\nSyntaxError: invalid syntax")),
            TestOutcome::Incompetent
        );
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("hello", 100), "hello");
        assert_eq!(truncate_output(&"a".repeat(50), 50), "a".repeat(50));
        assert_eq!(truncate_output("", 10), "");
        let truncated = truncate_output(&"a".repeat(51), 50);
        assert!(truncated.starts_with(&"a".repeat(50)));
        assert!(truncated.ends_with("...(truncated)"));
    }

    #[test]
    fn test_truncate_output_respects_char_boundaries() {
        // "é" is two bytes; cutting after one byte would split it.
        assert_eq!(truncate_output("éé", 1), "...(truncated)");
        assert_eq!(truncate_output("éé", 3), "é...(truncated)");
    }
}

mod config;
mod db;
mod engine;
mod interceptors;
mod language;
mod mutation;
mod operators;
mod session;
mod web;
mod workspace;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::SessionStore;
use crate::language::Language;
use crate::mutation::analyzer::find_mutation_specs;
use crate::mutation::{WorkItem, WorkResult};
use crate::operators::OperatorCatalog;
use crate::session::BaselineError;
use crate::web::{start_worker, WorkerState};

#[derive(Parser)]
#[command(name = "mutiny")]
#[command(version)]
#[command(about = "Mutation testing for Python code bases")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the code base and create a session with one work item per mutation
    Init {
        config: PathBuf,
        session: PathBuf,
        /// Project root that module paths are relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Execute all pending work items of a session
    Exec {
        session: PathBuf,
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Check that the test suite passes on unmutated code
    Baseline {
        session: PathBuf,
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Print result counts and the mutation score
    Status { session: PathBuf },
    /// Apply one mutation in the current directory, run the tests and restore
    MutateAndTest {
        config: PathBuf,
        module: PathBuf,
        operator: String,
        occurrence: usize,
    },
    /// Serve mutate-and-test requests for the http engine
    Worker {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 9876)]
        port: u16,
        /// Checkout of the project under test
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Python version reported to clients and checked against sessions
        #[arg(long)]
        python_version: Option<String>,
    },
    /// Write a configuration file with default settings
    NewConfig {
        config: PathBuf,
        /// Module file or package directory to mutate
        #[arg(long)]
        module_path: PathBuf,
        /// Shell command that runs the test suite
        #[arg(long)]
        test_command: String,
    },
    /// Print one work item and its result
    Show { session: PathBuf, job_id: String },
    /// Print the diff of every mutant that survived
    Survivors { session: PathBuf },
    /// List the available operators
    Operators {
        /// Check every operator against its worked examples
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let catalog = Arc::new(OperatorCatalog::standard());

    match cli.command {
        Commands::Init {
            config,
            session: session_path,
            root,
        } => {
            let config = Config::load(&config)?;
            let store = open_session(&session_path).await?;
            let report = session::init(&store, &config, &root, &catalog).await?;
            println!(
                "{} modules, {} mutation sites, {} work items ({} skipped)",
                report.modules, report.sites, report.work_items, report.skipped
            );
        }
        Commands::Exec {
            session: session_path,
            root,
        } => {
            let store = open_session(&session_path).await?;
            let summary = session::exec(&store, &root, catalog).await?;
            print!("{}", summary);
        }
        Commands::Baseline {
            session: session_path,
            root,
        } => {
            let store = open_session(&session_path).await?;
            match session::baseline(&store, &root, catalog).await {
                Ok(_) => println!("baseline passed"),
                Err(e) => match e.downcast_ref::<BaselineError>() {
                    Some(BaselineError::Failed { outcome, output }) => {
                        eprintln!("baseline failed: {}", outcome);
                        eprintln!("{}", output);
                        std::process::exit(2);
                    }
                    _ => return Err(e),
                },
            }
        }
        Commands::Status {
            session: session_path,
        } => {
            let store = open_session(&session_path).await?;
            print!("{}", store.summary().await?);
        }
        Commands::MutateAndTest {
            config,
            module,
            operator,
            occurrence,
        } => {
            let config = Config::load(&config)?;
            match mutate_and_test(&config, &module, &operator, occurrence, catalog).await? {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => {
                    eprintln!("interrupted; {} restored", module.display());
                    std::process::exit(130);
                }
            }
        }
        Commands::Worker {
            host,
            port,
            path,
            python_version,
        } => {
            let root = path
                .canonicalize()
                .with_context(|| format!("Worker path {:?} does not exist", path))?;
            let state = Arc::new(WorkerState::new(root, python_version, catalog));
            start_worker(state, &host, port, shutdown_signal()).await?;
        }
        Commands::NewConfig {
            config,
            module_path,
            test_command,
        } => {
            let new = Config::new(module_path, test_command);
            new.validate()?;
            new.save(&config)?;
            tracing::info!("Wrote {}", config.display());
        }
        Commands::Show {
            session: session_path,
            job_id,
        } => {
            let store = open_session(&session_path).await?;
            let item = store
                .work_item(&job_id)
                .await?
                .with_context(|| format!("No work item {} in session", job_id))?;
            println!("{}", describe(&item));
            match store.result(&job_id).await? {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => println!("pending"),
            }
        }
        Commands::Survivors {
            session: session_path,
        } => {
            let store = open_session(&session_path).await?;
            for (item, result) in store.completed_work_items().await? {
                if !result.is_survivor() {
                    continue;
                }
                println!("# {} {}", item.job_id(), describe(&item));
                print!("{}", result.diff());
            }
        }
        Commands::Operators { check } => {
            if check {
                let failures = catalog.check_examples();
                for failure in &failures {
                    eprintln!("{}", failure);
                }
                if !failures.is_empty() {
                    std::process::exit(1);
                }
                println!("{} operators match their examples", catalog.names().count());
            } else {
                for name in catalog.names() {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}

fn describe(item: &WorkItem) -> String {
    item.mutations()
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn open_session(path: &Path) -> anyhow::Result<SessionStore> {
    SessionStore::open(path)
        .await
        .with_context(|| format!("Failed to open session {:?}", path))
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run a single first-order mutation in the current directory.
///
/// Returns `None` when a shutdown signal interrupted the cycle; the module
/// has been restored by then.
async fn mutate_and_test(
    config: &Config,
    module: &Path,
    operator_name: &str,
    occurrence: usize,
    catalog: Arc<OperatorCatalog>,
) -> anyhow::Result<Option<WorkResult>> {
    let operator = catalog
        .get(operator_name)
        .with_context(|| format!("Unknown operator: {}", operator_name))?;
    let source = std::fs::read_to_string(module)
        .with_context(|| format!("Failed to read module {:?}", module))?;
    let tree = Language::Python.parse(&source)?;

    let args = config
        .operators
        .args_for(operator_name)
        .into_iter()
        .next()
        .unwrap_or_default();
    let spec = find_mutation_specs(module, &tree, operator.as_ref(), &args)
        .into_iter()
        .find(|spec| spec.occurrence() == occurrence);

    let Some(spec) = spec else {
        return Ok(Some(WorkResult::no_test(format!(
            "{} has no occurrence {} in {}",
            operator_name,
            occurrence,
            module.display()
        ))));
    };

    let root = std::env::current_dir().context("Failed to resolve current directory")?;
    Ok(mutation::executor::mutate_and_test_until(
        root,
        vec![spec],
        config.mutation_config(),
        catalog,
        shutdown_signal(),
    )
    .await)
}

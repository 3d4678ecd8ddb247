use crate::mutation::{MutationConfig, OperatorArgs, TimeoutPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Module file or package directory to mutate, relative to the project root
    pub module_path: PathBuf,

    /// Glob patterns (on paths relative to the project root) of modules to skip
    #[serde(default)]
    pub excluded_modules: Vec<String>,

    /// Shell command that runs the test suite
    pub test_command: String,

    /// Wall-clock limit for one mutate-test cycle, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// How a test run that exceeds the timeout is classified
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,

    /// Python version remote workers must report; empty means unchecked
    #[serde(default)]
    pub python_version: String,

    /// Maximum captured test output per result (bytes)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub operators: OperatorsConfig,

    #[serde(default)]
    pub execution_engine: EngineConfig,

    #[serde(default)]
    pub cloning: CloningConfig,

    #[serde(default)]
    pub interceptors: InterceptorsConfig,
}

/// Work item generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Highest number of mutations combined into one work item
    #[serde(default = "default_max_order")]
    pub max_order: usize,

    /// Only generate items of exactly `max_order` mutations
    #[serde(default)]
    pub exact_order: bool,

    /// Cap on the number of work items (random sample); 0 means unlimited
    #[serde(default)]
    pub max_items: usize,

    /// Seed for the sampling RNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorsConfig {
    /// Glob patterns of operator names left out of the scan
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Argument variants per operator; each variant is scanned separately
    #[serde(default)]
    pub args: BTreeMap<String, Vec<OperatorArgs>>,
}

impl OperatorsConfig {
    pub fn is_excluded(&self, operator: &str) -> bool {
        self.exclude
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, operator))
    }

    /// Argument variants to scan `operator` with (at least one).
    pub fn args_for(&self, operator: &str) -> Vec<OperatorArgs> {
        match self.args.get(operator) {
            Some(variants) if !variants.is_empty() => variants.clone(),
            _ => vec![OperatorArgs::new()],
        }
    }
}

/// Which execution engine runs the work items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub name: EngineKind,

    #[serde(default)]
    pub local: LocalEngineConfig,

    #[serde(default)]
    pub http: HttpEngineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalEngineConfig {
    /// Number of workers; 0 means available parallelism
    #[serde(default)]
    pub pool_size: usize,
}

impl LocalEngineConfig {
    pub fn workers(&self) -> usize {
        if self.pool_size > 0 {
            self.pool_size
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEngineConfig {
    /// Base URLs of the worker servers
    #[serde(default)]
    pub worker_urls: Vec<String>,

    /// Seconds added to the cycle timeout when waiting for a worker response
    #[serde(default = "default_request_timeout_margin")]
    pub request_timeout_margin: f64,
}

/// How workspaces are cloned from the project root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloningConfig {
    /// Setup commands run inside each fresh clone, in order
    #[serde(default)]
    pub commands: Vec<String>,

    /// Glob patterns of top-level entries that are not copied
    #[serde(default = "default_clone_exclude")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterceptorsConfig {
    #[serde(default)]
    pub operators_filter: OperatorsFilterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorsFilterConfig {
    /// Glob patterns of operator names whose work items are skipped
    #[serde(default)]
    pub exclude: Vec<String>,
}

// Default value functions
fn default_timeout() -> f64 {
    30.0
}

fn default_max_output_bytes() -> usize {
    10_000
}

fn default_max_order() -> usize {
    1
}

fn default_request_timeout_margin() -> f64 {
    30.0
}

fn default_clone_exclude() -> Vec<String> {
    vec![".git".to_string(), "__pycache__".to_string()]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_order: default_max_order(),
            exact_order: false,
            max_items: 0,
            seed: None,
        }
    }
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            worker_urls: Vec::new(),
            request_timeout_margin: default_request_timeout_margin(),
        }
    }
}

impl Default for CloningConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            exclude: default_clone_exclude(),
        }
    }
}

impl Config {
    /// Configuration with defaults for everything but the two required keys.
    pub fn new(module_path: impl Into<PathBuf>, test_command: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            excluded_modules: Vec::new(),
            test_command: test_command.into(),
            timeout: default_timeout(),
            timeout_policy: TimeoutPolicy::default(),
            python_version: String::new(),
            max_output_bytes: default_max_output_bytes(),
            generation: GenerationConfig::default(),
            operators: OperatorsConfig::default(),
            execution_engine: EngineConfig::default(),
            cloning: CloningConfig::default(),
            interceptors: InterceptorsConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_toml_str(&contents).with_context(|| format!("Bad config in {:?}", path))
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_command.trim().is_empty() {
            return Err(ConfigError::Invalid("test_command must not be empty".into()));
        }
        if !(self.timeout.is_finite() && self.timeout > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "timeout must be a positive number of seconds (got {})",
                self.timeout
            )));
        }
        let margin = self.execution_engine.http.request_timeout_margin;
        if !(margin.is_finite() && margin >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "execution_engine.http.request_timeout_margin must be a non-negative number of seconds (got {})",
                margin
            )));
        }
        if self.generation.max_order == 0 {
            return Err(ConfigError::Invalid("generation.max_order must be at least 1".into()));
        }
        if self.execution_engine.name == EngineKind::Http
            && self.execution_engine.http.worker_urls.is_empty()
        {
            return Err(ConfigError::Invalid(
                "execution_engine.http.worker_urls must list at least one worker".into(),
            ));
        }
        Ok(())
    }

    pub fn is_module_excluded(&self, relative_path: &Path) -> bool {
        let path = relative_path.to_string_lossy();
        self.excluded_modules
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, &path))
    }

    /// Python version workers must match, if one is configured.
    pub fn required_python_version(&self) -> Option<&str> {
        let version = self.python_version.trim();
        (!version.is_empty()).then_some(version)
    }

    /// Settings for a single mutate-and-test cycle.
    pub fn mutation_config(&self) -> MutationConfig {
        MutationConfig {
            test_command: self.test_command.clone(),
            timeout_seconds: self.timeout,
            timeout_policy: self.timeout_policy,
            max_test_output_bytes: self.max_output_bytes,
        }
    }
}

//! Tuner settings: defaults, optional JSON file, environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use at_optimizer::{AnnealingSchedule, DEFAULT_MAX_ITERS, DEFAULT_SAMPLE_SIZE};
use at_types::{config_error, TuneResult};

pub const ENV_WORKERS: &str = "AUTOTUNE_WORKERS";
pub const ENV_RESULTS_DIR: &str = "AUTOTUNE_RESULTS_DIR";
pub const ENV_COMPILER: &str = "AUTOTUNE_CC";

/// How a configuration becomes a compile command and a program launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub compiler: String,
    /// Passed to the compiler before the configuration's flags.
    pub extra_compile_args: Vec<String>,
    /// Parameters rendered as compiler flags (`O2` becomes `-O2`).
    pub compile_params: Vec<String>,
    /// Parameters passed to the compiled program as positional arguments.
    pub runtime_params: Vec<String>,
    /// Fallback values for compile or runtime parameters a configuration omits.
    pub defaults: BTreeMap<String, String>,
    /// Where per-trial artifacts are written and removed.
    pub artifact_dir: PathBuf,
    /// Upper bound on the program's run time. `None` waits indefinitely.
    pub trial_timeout_secs: Option<f64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            compiler: "clang".to_string(),
            extra_compile_args: Vec::new(),
            compile_params: vec!["optimize_level".to_string()],
            runtime_params: vec!["block_size".to_string()],
            defaults: [("optimize_level", "O0"), ("block_size", "64")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            artifact_dir: PathBuf::from("tmp"),
            trial_timeout_secs: None,
        }
    }
}

impl ExecutorConfig {
    pub fn trial_timeout(&self) -> Option<Duration> {
        self.trial_timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Roster and concurrency of the parallel meta-search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelSettings {
    pub roster: Vec<String>,
    /// Sub-algorithms running at the same time.
    pub max_workers: usize,
    /// Concurrent trials inside each static sub-algorithm.
    pub sub_workers: usize,
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            roster: ["GridSearch", "RandomSearch", "GreedySearch"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_workers: 3,
            sub_workers: 1,
        }
    }
}

/// Per-algorithm knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmSettings {
    pub random_sample_size: usize,
    pub greedy_max_iters: usize,
    pub annealing: AnnealingSchedule,
    pub parallel: ParallelSettings,
    /// Seeds every algorithm RNG for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            random_sample_size: DEFAULT_SAMPLE_SIZE,
            greedy_max_iters: DEFAULT_MAX_ITERS,
            annealing: AnnealingSchedule::default(),
            parallel: ParallelSettings::default(),
            seed: None,
        }
    }
}

/// Top-level settings for a tuning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSettings {
    /// Concurrent trials in static mode.
    pub max_workers: usize,
    pub results_root: PathBuf,
    /// Experiment directory name; defaults to `<algorithm>_<timestamp>`.
    pub experiment_name: Option<String>,
    pub executor: ExecutorConfig,
    pub algorithms: AlgorithmSettings,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            results_root: PathBuf::from("results"),
            experiment_name: None,
            executor: ExecutorConfig::default(),
            algorithms: AlgorithmSettings::default(),
        }
    }
}

impl TunerSettings {
    /// Defaults, overlaid by the JSON file at `path` when given.
    pub fn load(path: Option<&Path>) -> TuneResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read settings {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| config_error!("invalid settings {}: {e}", path.display()))
    }

    /// Apply `AUTOTUNE_*` overrides from the process environment.
    pub fn apply_env(self) -> TuneResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> TuneResult<Self> {
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.max_workers = workers
                .trim()
                .parse()
                .map_err(|_| config_error!("{ENV_WORKERS} must be a positive integer, got '{workers}'"))?;
        }
        if let Some(dir) = lookup(ENV_RESULTS_DIR) {
            self.results_root = PathBuf::from(dir);
        }
        if let Some(compiler) = lookup(ENV_COMPILER) {
            self.executor.compiler = compiler;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    pub fn with_results_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.results_root = root.into();
        self
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = Some(name.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.algorithms.seed = Some(seed);
        self
    }

    pub fn with_trial_timeout(mut self, timeout: Duration) -> Self {
        self.executor.trial_timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.max_workers == 0 {
            return Err(config_error!("max_workers must be at least 1"));
        }
        if self.algorithms.parallel.max_workers == 0 || self.algorithms.parallel.sub_workers == 0 {
            return Err(config_error!("parallel worker counts must be at least 1"));
        }
        let annealing = &self.algorithms.annealing;
        if !(annealing.cooling_rate > 0.0 && annealing.cooling_rate < 1.0) {
            return Err(config_error!(
                "annealing cooling_rate must be in (0, 1), got {}",
                annealing.cooling_rate
            ));
        }
        if annealing.initial_temp <= 0.0 {
            return Err(config_error!("annealing initial_temp must be positive"));
        }
        Ok(())
    }
}

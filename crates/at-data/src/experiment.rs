//! Filesystem-rooted experiments.

use chrono::Local;
use std::path::{Path, PathBuf};

use at_types::{config_error, TuneResult};

use crate::log::RunLogger;
use crate::store::ResultsStore;

pub const STORE_FILE_NAME: &str = "best_config.json";
pub const PARALLEL_SUMMARY_FILE_NAME: &str = "parallel_summary.json";

/// One tuning run's directory. Owns one results store and one log stream.
///
/// Laid out as `<results_root>/<algorithm>/<name>` where `name` defaults to
/// `<algorithm>_<YYYYmmdd_HHMMSS>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    algorithm: String,
    name: String,
    dir: PathBuf,
}

impl Experiment {
    pub fn create<P: AsRef<Path>>(
        results_root: P,
        algorithm: &str,
        name: Option<&str>,
    ) -> TuneResult<Self> {
        let name = match name {
            Some(name) => {
                validate_component(name)?;
                name.to_string()
            }
            None => format!("{algorithm}_{}", Local::now().format("%Y%m%d_%H%M%S")),
        };
        validate_component(algorithm)?;
        let dir = results_root.as_ref().join(algorithm).join(&name);
        Self::at(dir, algorithm, name)
    }

    /// Isolated child experiment under this one, used by meta-algorithms.
    pub fn sub_experiment(&self, algorithm: &str) -> TuneResult<Self> {
        validate_component(algorithm)?;
        Self::at(self.dir.join(algorithm), algorithm, algorithm.to_string())
    }

    fn at(dir: PathBuf, algorithm: &str, name: String) -> TuneResult<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            algorithm: algorithm.to_string(),
            name,
            dir,
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.join(STORE_FILE_NAME)
    }

    pub fn parallel_summary_path(&self) -> PathBuf {
        self.dir.join(PARALLEL_SUMMARY_FILE_NAME)
    }

    pub fn open_store(&self) -> TuneResult<ResultsStore> {
        ResultsStore::open(self.store_path())
    }

    pub fn logger(&self, component: &str) -> TuneResult<RunLogger> {
        RunLogger::open(component, &self.dir)
    }
}

fn validate_component(part: &str) -> TuneResult<()> {
    if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
        return Err(config_error!("'{part}' is not usable as an experiment directory name"));
    }
    Ok(())
}

//! The trial-execution contract shared by the orchestrator and the executors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::space::Configuration;
use crate::trial::Cost;

/// Handle on the program being tuned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProgram {
    pub source: PathBuf,
}

impl TargetProgram {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.source
    }

    /// File stem used to name compiled artifacts (e.g. "matrix" for "matrix.c").
    pub fn stem(&self) -> &str {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("artifact")
    }
}

/// Runs one trial of the target under a configuration.
///
/// Implementations must not fail: every compile, runtime or parse problem is
/// reported as [`Cost::FAILED`]. Each call must be independent of concurrent
/// calls.
#[async_trait]
pub trait TrialExecutor: Send + Sync {
    async fn execute(&self, target: &TargetProgram, config: &Configuration) -> Cost;
}

//! Consolidated summary written by meta-algorithms.

use serde::{Deserialize, Serialize};
use std::path::Path;

use at_types::{BestSoFar, Configuration, Cost, TuneResult};

/// Best result of one sub-algorithm in a parallel run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAlgorithmResult {
    pub algorithm: String,
    pub best_config: Option<Configuration>,
    pub best_time: Cost,
    /// Wall time of the sub-run in seconds.
    pub runtime: f64,
}

/// `parallel_summary.json`: roster, per-algorithm bests and the global best.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelSummary {
    pub sub_algorithms: Vec<String>,
    pub results: Vec<SubAlgorithmResult>,
    pub global_best: BestSoFar,
    pub total_runtime: f64,
}

impl ParallelSummary {
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> TuneResult<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn summary_document_shape() {
        let best: Configuration = [("optimize_level", "O3")].into_iter().collect();
        let summary = ParallelSummary {
            sub_algorithms: vec!["GridSearch".into(), "RandomSearch".into()],
            results: vec![
                SubAlgorithmResult {
                    algorithm: "GridSearch".into(),
                    best_config: Some(best.clone()),
                    best_time: Cost::new(0.5),
                    runtime: 3.2,
                },
                SubAlgorithmResult {
                    algorithm: "RandomSearch".into(),
                    best_config: None,
                    best_time: Cost::FAILED,
                    runtime: 1.0,
                },
            ],
            global_best: BestSoFar {
                config: Some(best),
                time: Cost::new(0.5),
            },
            total_runtime: 3.3,
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("parallel_summary.json");
        summary.write_to(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["global_best"]["config"]["optimize_level"], "O3");
        assert_eq!(raw["global_best"]["time"], 0.5);
        assert_eq!(raw["results"][1]["best_time"], serde_json::Value::Null);

        assert_eq!(ParallelSummary::read_from(&path).unwrap(), summary);
    }
}

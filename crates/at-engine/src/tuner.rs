// Tuning session entry point

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use at_data::{Experiment, TuningInput};
use at_optimizer::{SearchAlgorithm, ShutdownSignal, TrialContext};
use at_types::{TrialExecutor, TuneResult};

use crate::config::TunerSettings;
use crate::orchestrator::{Orchestrator, TuningReport};
use crate::registry::build_algorithm;

/// One tuning session: a parsed input, settings, and the executor trials go
/// through.
///
/// Construction resolves the algorithm and validates settings, so every
/// fatal configuration problem surfaces before an experiment directory,
/// store or log file exists.
pub struct Autotuner {
    input: TuningInput,
    settings: TunerSettings,
    executor: Arc<dyn TrialExecutor>,
    algorithm: SearchAlgorithm,
}

impl Autotuner {
    pub fn new(
        input: TuningInput,
        settings: TunerSettings,
        executor: Arc<dyn TrialExecutor>,
    ) -> TuneResult<Self> {
        settings.validate()?;
        let algorithm = build_algorithm(&input.algorithm, &input.space, &settings.algorithms)?;
        Ok(Self {
            input,
            settings,
            executor,
            algorithm,
        })
    }

    pub fn from_input_file<P: AsRef<Path>>(
        path: P,
        settings: TunerSettings,
        executor: Arc<dyn TrialExecutor>,
    ) -> TuneResult<Self> {
        Self::new(TuningInput::from_file(path)?, settings, executor)
    }

    pub fn algorithm(&self) -> &SearchAlgorithm {
        &self.algorithm
    }

    pub fn settings(&self) -> &TunerSettings {
        &self.settings
    }

    pub async fn run(self, shutdown: ShutdownSignal) -> TuneResult<TuningReport> {
        let experiment = Experiment::create(
            &self.settings.results_root,
            self.algorithm.name(),
            self.settings.experiment_name.as_deref(),
        )?;
        let store = Arc::new(experiment.open_store()?);
        let log = Arc::new(experiment.logger("Autotuner")?);

        log.log(format!(
            "Tuning {} with {} over {} parameter(s)",
            self.input.target.path().display(),
            self.algorithm.name(),
            self.input.space.len()
        ));
        info!(experiment = %experiment.dir().display(), "experiment created");

        let ctx = TrialContext::new(
            self.input.target,
            self.executor,
            store,
            log,
            experiment,
            shutdown,
        );
        Orchestrator::new(ctx, self.settings.max_workers)
            .run(self.algorithm)
            .await
    }
}

impl std::fmt::Debug for Autotuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autotuner")
            .field("input", &self.input)
            .field("settings", &self.settings)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

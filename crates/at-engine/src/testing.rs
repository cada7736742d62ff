// In-process executors and contexts for engine tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use at_data::Experiment;
use at_optimizer::{ShutdownSignal, TrialContext};
use at_types::{Configuration, Cost, TargetProgram, TrialExecutor};

type CostFn = dyn Fn(&Configuration) -> Cost + Send + Sync;

/// Executor whose cost is a pure function of the configuration.
pub struct ScriptedExecutor {
    cost: Box<CostFn>,
    delay: Duration,
    calls: Mutex<Vec<Configuration>>,
}

impl ScriptedExecutor {
    pub fn new(cost: impl Fn(&Configuration) -> Cost + Send + Sync + 'static) -> Self {
        Self {
            cost: Box::new(cost),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Configuration> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TrialExecutor for ScriptedExecutor {
    async fn execute(&self, _target: &TargetProgram, config: &Configuration) -> Cost {
        self.calls.lock().push(config.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.cost)(config)
    }
}

/// `0.1 * (opt level digit + 1) + block / 1000`, with `O3` failing.
pub fn synthetic_cost(config: &Configuration) -> Cost {
    let opt = match config.get("optimize_level") {
        Some("O3") => return Cost::FAILED,
        Some(level) => level.trim_start_matches('O').parse::<f64>().unwrap_or(9.0),
        None => 9.0,
    };
    let block = config
        .get("block_size")
        .and_then(|b| b.parse::<f64>().ok())
        .unwrap_or(0.0);
    Cost::new(0.1 * (opt + 1.0) + block / 1000.0)
}

pub fn context(
    root: &Path,
    algorithm: &str,
    executor: Arc<dyn TrialExecutor>,
    shutdown: ShutdownSignal,
) -> TrialContext {
    let experiment = Experiment::create(root, algorithm, Some("test")).unwrap();
    let store = Arc::new(experiment.open_store().unwrap());
    let log = Arc::new(experiment.logger(algorithm).unwrap());
    TrialContext::new(
        TargetProgram::new("matrix.c"),
        executor,
        store,
        log,
        experiment,
        shutdown,
    )
}

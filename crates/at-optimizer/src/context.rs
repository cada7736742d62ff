//! Everything a search loop needs to run and record trials.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use at_data::{Experiment, ResultsStore, RunLogger};
use at_types::{Configuration, Cost, TargetProgram, TrialExecutor, TrialRecord, TuneResult};

/// Fires once when the run should stop submitting work.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

/// Receiving side of a [`ShutdownTrigger`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), ShutdownSignal(rx))
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        shutdown_channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the trigger fires. Pending forever if the trigger is
    /// dropped without firing.
    pub async fn triggered(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Target, executor, store and log stream shared by one search loop.
///
/// The context is the only path by which a loop persists trials, so each
/// store has exactly one writing task.
#[derive(Clone)]
pub struct TrialContext {
    pub target: TargetProgram,
    pub executor: Arc<dyn TrialExecutor>,
    pub store: Arc<ResultsStore>,
    pub log: Arc<RunLogger>,
    pub experiment: Experiment,
    pub shutdown: ShutdownSignal,
    mirror: Option<mpsc::UnboundedSender<TrialRecord>>,
}

impl TrialContext {
    pub fn new(
        target: TargetProgram,
        executor: Arc<dyn TrialExecutor>,
        store: Arc<ResultsStore>,
        log: Arc<RunLogger>,
        experiment: Experiment,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            target,
            executor,
            store,
            log,
            experiment,
            shutdown,
            mirror: None,
        }
    }

    /// Also forward every recorded trial to `mirror`.
    pub fn with_mirror(mut self, mirror: mpsc::UnboundedSender<TrialRecord>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub async fn run_trial(&self, config: &Configuration) -> Cost {
        self.executor.execute(&self.target, config).await
    }

    /// Persist a finished trial and log its outcome.
    pub fn record(&self, config: &Configuration, cost: Cost) -> TuneResult<()> {
        self.store.save(config, cost)?;
        if cost.is_failure() {
            self.log.warn(format!("Finished: {config} -> {cost} (trial failed)"));
        } else {
            self.log.log(format!("Finished: {config} -> {cost}"));
        }
        if let Some(mirror) = &self.mirror {
            if mirror.send(TrialRecord::new(config.clone(), cost)).is_err() {
                debug!("trial mirror closed, record kept in local store only");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TrialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialContext")
            .field("target", &self.target)
            .field("store", &self.store.path())
            .field("experiment", &self.experiment.dir())
            .finish_non_exhaustive()
    }
}

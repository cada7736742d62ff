// Execution-mode dispatch for search algorithms
// Static algorithms fan out over a bounded worker pool, dynamic ones run one
// trial at a time, custom ones drive themselves

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use at_optimizer::{
    DynamicSearch, SearchAlgorithm, SearchMode, ShutdownTrigger, StaticSearch, TrialContext,
};
use at_types::{Configuration, Cost, TuneResult};

/// What one search loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopOutcome {
    pub trials: usize,
    pub interrupted: bool,
}

/// Final outcome of a tuning session.
#[derive(Debug, Clone)]
pub struct TuningReport {
    pub algorithm: String,
    pub mode: SearchMode,
    pub experiment_dir: PathBuf,
    pub best_config: Option<Configuration>,
    pub best_cost: Cost,
    pub trials: usize,
    pub total_runtime: Duration,
    pub interrupted: bool,
}

impl std::fmt::Display for TuningReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "===== AUTOTUNING FINISHED =====")?;
        writeln!(f, "Algorithm: {} ({} mode)", self.algorithm, self.mode)?;
        match &self.best_config {
            Some(config) => writeln!(f, "Best configuration: {config}")?,
            None => writeln!(f, "Best configuration: none (every trial failed)")?,
        }
        writeln!(f, "Best time: {}", self.best_cost)?;
        writeln!(f, "Trials: {}", self.trials)?;
        write!(f, "Total runtime: {:.3}s", self.total_runtime.as_secs_f64())?;
        if self.interrupted {
            write!(f, "\nRun was interrupted before the search finished")?;
        }
        Ok(())
    }
}

/// Run every candidate of a static algorithm with at most `max_workers`
/// trials in flight. Results are recorded and fed to `update` one at a time,
/// in completion order.
pub async fn run_static(
    alg: &mut dyn StaticSearch,
    ctx: &TrialContext,
    max_workers: usize,
) -> TuneResult<LoopOutcome> {
    let max_workers = max_workers.max(1);
    let mut pending = alg.all_configs();
    let mut in_flight = JoinSet::new();
    let mut shutdown = ctx.shutdown.clone();
    let mut outcome = LoopOutcome::default();
    let mut exhausted = false;

    loop {
        while !exhausted && !shutdown.is_triggered() && in_flight.len() < max_workers {
            match pending.next() {
                Some(config) => {
                    let executor = Arc::clone(&ctx.executor);
                    let target = ctx.target.clone();
                    in_flight.spawn(async move {
                        let cost = executor.execute(&target, &config).await;
                        (config, cost)
                    });
                }
                None => exhausted = true,
            }
        }
        if in_flight.is_empty() {
            // Candidates left over means the submit loop saw the shutdown.
            outcome.interrupted = !exhausted;
            break;
        }

        tokio::select! {
            _ = shutdown.triggered() => {
                let abandoned = in_flight.len();
                in_flight.abort_all();
                while in_flight.join_next().await.is_some() {}
                ctx.log.warn(format!("Interrupted: abandoned {abandoned} running trial(s)"));
                outcome.interrupted = true;
                break;
            }
            joined = in_flight.join_next() => match joined {
                Some(Ok((config, cost))) => {
                    ctx.record(&config, cost)?;
                    alg.update(&config, cost);
                    outcome.trials += 1;
                }
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => error!(error = %e, "trial task panicked, result dropped"),
                None => break,
            },
        }
    }
    Ok(outcome)
}

/// Strict request, execute, record, update cycle until the algorithm stops.
pub async fn run_dynamic(alg: &mut dyn DynamicSearch, ctx: &TrialContext) -> TuneResult<LoopOutcome> {
    let mut shutdown = ctx.shutdown.clone();
    let mut outcome = LoopOutcome::default();

    while !alg.stop() {
        if shutdown.is_triggered() {
            outcome.interrupted = true;
            break;
        }
        let history = ctx.store.get_all()?;
        let config = alg.next_config(&history);
        debug!(algorithm = alg.name(), config = %config, "next candidate");

        let cost = tokio::select! {
            cost = ctx.run_trial(&config) => cost,
            _ = shutdown.triggered() => {
                ctx.log.warn(format!("Interrupted: abandoned trial {config}"));
                outcome.interrupted = true;
                break;
            }
        };
        ctx.record(&config, cost)?;
        alg.update(&config, cost);
        outcome.trials += 1;
    }
    Ok(outcome)
}

/// Runs one algorithm against one experiment.
#[derive(Debug)]
pub struct Orchestrator {
    ctx: TrialContext,
    max_workers: usize,
}

impl Orchestrator {
    pub fn new(ctx: TrialContext, max_workers: usize) -> Self {
        Self { ctx, max_workers }
    }

    pub fn context(&self) -> &TrialContext {
        &self.ctx
    }

    /// Drive `algorithm` in the mode it declares, then persist the run
    /// summary and report the best result.
    pub async fn run(&self, mut algorithm: SearchAlgorithm) -> TuneResult<TuningReport> {
        let started = Instant::now();
        let mode = algorithm.mode();
        let name = algorithm.name().to_string();
        self.ctx.log.log(format!("Detected {mode} mode for {name}"));
        info!(algorithm = %name, mode = %mode, workers = self.max_workers, "starting search");

        let outcome = match &mut algorithm {
            SearchAlgorithm::Static(alg) => run_static(alg.as_mut(), &self.ctx, self.max_workers).await?,
            SearchAlgorithm::Dynamic(alg) => run_dynamic(alg.as_mut(), &self.ctx).await?,
            SearchAlgorithm::Custom(alg) => {
                // A reused experiment store already holds earlier sessions' records.
                let before = self.ctx.store.len()?;
                alg.custom_run(&self.ctx).await?;
                LoopOutcome {
                    trials: self.ctx.store.len()?.saturating_sub(before),
                    interrupted: self.ctx.shutdown.is_triggered(),
                }
            }
        };

        let total_runtime = started.elapsed();
        self.ctx.store.add_summary(&name, total_runtime)?;

        let best = algorithm.best().clone();
        match best.config() {
            Some(config) => self
                .ctx
                .log
                .log(format!("Best configuration: {config} -> {}", best.cost())),
            None => self.ctx.log.warn("No configuration produced a usable result"),
        }
        self.ctx.log.log(format!(
            "Total runtime: {:.3}s over {} trial(s)",
            total_runtime.as_secs_f64(),
            outcome.trials
        ));

        Ok(TuningReport {
            algorithm: name,
            mode,
            experiment_dir: self.ctx.experiment.dir().to_path_buf(),
            best_config: best.config,
            best_cost: best.time,
            trials: outcome.trials,
            total_runtime,
            interrupted: outcome.interrupted,
        })
    }
}

/// Fire `trigger` on Ctrl-C.
pub fn spawn_interrupt_listener(trigger: ShutdownTrigger) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping after in-flight work is abandoned");
                trigger.trigger();
            }
            Err(e) => error!(error = %e, "cannot listen for Ctrl-C"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, synthetic_cost, ScriptedExecutor};
    use at_optimizer::{
        shutdown_channel, AnnealingSchedule, GreedySearch, GridSearch, ShutdownSignal,
        SimulatedAnnealing,
    };
    use at_types::ParameterSpace;
    use tempfile::tempdir;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .add_choice("optimize_level", ["O0", "O1", "O2"])
            .add_choice("block_size", ["8", "16"])
    }

    #[tokio::test]
    async fn grid_runs_every_configuration_once() {
        let root = tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new(synthetic_cost));
        let ctx = context(root.path(), "GridSearch", executor.clone(), ShutdownSignal::never());
        let orchestrator = Orchestrator::new(ctx.clone(), 4);

        let report = orchestrator
            .run(SearchAlgorithm::Static(Box::new(GridSearch::new(space()))))
            .await
            .unwrap();

        assert_eq!(report.trials, 6);
        assert_eq!(executor.calls().len(), 6);
        assert_eq!(ctx.store.len().unwrap(), 6);
        assert!(!report.interrupted);

        let best = report.best_config.unwrap();
        assert_eq!(best.get("optimize_level"), Some("O0"));
        assert_eq!(best.get("block_size"), Some("8"));
        assert_eq!(report.best_cost, ctx.store.get_best().unwrap().time);

        let summary = ctx.store.summary().unwrap().unwrap();
        assert_eq!(summary.algorithm, "GridSearch");
    }

    #[tokio::test]
    async fn failed_trials_are_recorded_and_never_best() {
        let root = tempdir().unwrap();
        let failing = ParameterSpace::new()
            .add_choice("optimize_level", ["O3"])
            .add_choice("block_size", ["8", "16"]);
        let executor = Arc::new(ScriptedExecutor::new(synthetic_cost));
        let ctx = context(root.path(), "GridSearch", executor, ShutdownSignal::never());

        let report = Orchestrator::new(ctx.clone(), 2)
            .run(SearchAlgorithm::Static(Box::new(GridSearch::new(failing))))
            .await
            .unwrap();

        assert_eq!(report.trials, 2);
        assert!(report.best_cost.is_failure());
        assert!(report.best_config.is_none());
        let records = ctx.store.records().unwrap();
        assert!(records.iter().all(|r| r.time.is_failure()));
    }

    #[tokio::test]
    async fn static_mode_respects_the_worker_bound() {
        let root = tempdir().unwrap();
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        struct Gauge {
            active: Arc<std::sync::atomic::AtomicUsize>,
            peak: Arc<std::sync::atomic::AtomicUsize>,
        }

        #[async_trait::async_trait]
        impl at_types::TrialExecutor for Gauge {
            async fn execute(
                &self,
                _target: &at_types::TargetProgram,
                config: &Configuration,
            ) -> Cost {
                use std::sync::atomic::Ordering::SeqCst;
                let now = self.active.fetch_add(1, SeqCst) + 1;
                self.peak.fetch_max(now, SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.active.fetch_sub(1, SeqCst);
                synthetic_cost(config)
            }
        }

        let executor = Arc::new(Gauge {
            active: active.clone(),
            peak: peak.clone(),
        });
        let ctx = context(root.path(), "GridSearch", executor, ShutdownSignal::never());
        let mut grid = GridSearch::new(space());
        let outcome = run_static(&mut grid, &ctx, 2).await.unwrap();

        assert_eq!(outcome.trials, 6);
        assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn dynamic_mode_is_sequential_and_uses_history() {
        let root = tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new(synthetic_cost));
        let ctx = context(root.path(), "GreedySearch", executor.clone(), ShutdownSignal::never());

        let report = Orchestrator::new(ctx.clone(), 4)
            .run(SearchAlgorithm::Dynamic(Box::new(GreedySearch::seeded(space(), 20, 3))))
            .await
            .unwrap();

        assert_eq!(report.mode, SearchMode::Dynamic);
        assert_eq!(report.trials, executor.calls().len());
        assert_eq!(ctx.store.len().unwrap(), report.trials);
        // The bowl minimum is reachable by single steps from anywhere.
        let best = report.best_config.unwrap();
        assert_eq!(best.get("optimize_level"), Some("O0"));
        assert_eq!(best.get("block_size"), Some("8"));
    }

    #[tokio::test]
    async fn annealing_stops_on_schedule() {
        let root = tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new(synthetic_cost));
        let ctx = context(root.path(), "SimulatedAnnealing", executor, ShutdownSignal::never());
        let schedule = AnnealingSchedule {
            max_iter: 5,
            ..AnnealingSchedule::default()
        };
        let mut sa = SimulatedAnnealing::seeded(space(), schedule, 9);

        let outcome = run_dynamic(&mut sa, &ctx).await.unwrap();
        assert_eq!(outcome.trials, 5);
        assert_eq!(sa.iterations(), 5);
    }

    #[tokio::test]
    async fn shutdown_interrupts_static_mode() {
        let root = tempdir().unwrap();
        let (trigger, signal) = shutdown_channel();
        let executor = Arc::new(
            ScriptedExecutor::new(synthetic_cost).with_delay(Duration::from_secs(30)),
        );
        let ctx = context(root.path(), "GridSearch", executor, signal);
        let orchestrator = Orchestrator::new(ctx.clone(), 2);

        let run = tokio::spawn(async move {
            orchestrator
                .run(SearchAlgorithm::Static(Box::new(GridSearch::new(space()))))
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();

        let report = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(report.interrupted);
        assert_eq!(report.trials, 0);
        assert!(ctx.store.summary().unwrap().is_some());
    }

    #[tokio::test]
    async fn shutdown_before_start_runs_nothing_dynamic() {
        let root = tempdir().unwrap();
        let (trigger, signal) = shutdown_channel();
        trigger.trigger();
        let executor = Arc::new(ScriptedExecutor::new(synthetic_cost));
        let ctx = context(root.path(), "GreedySearch", executor.clone(), signal);

        let mut greedy = GreedySearch::seeded(space(), 20, 1);
        let outcome = run_dynamic(&mut greedy, &ctx).await.unwrap();
        assert!(outcome.interrupted);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn report_printout() {
        let report = TuningReport {
            algorithm: "GridSearch".into(),
            mode: SearchMode::Static,
            experiment_dir: PathBuf::from("results/GridSearch/x"),
            best_config: Some([("optimize_level", "O2")].into_iter().collect()),
            best_cost: Cost::new(0.5),
            trials: 4,
            total_runtime: Duration::from_millis(1500),
            interrupted: false,
        };
        let text = report.to_string();
        assert!(text.starts_with("===== AUTOTUNING FINISHED ====="));
        assert!(text.contains("Best configuration: {optimize_level=O2}"));
        assert!(text.contains("Total runtime: 1.500s"));
    }
}

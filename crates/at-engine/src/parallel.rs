// Parallel meta-search
// Runs a roster of sub-algorithms side by side, each in its own
// sub-experiment, and keeps the best result across all of them

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info};

use at_data::{ParallelSummary, SubAlgorithmResult};
use at_optimizer::{CustomSearch, Search, SearchAlgorithm, TrialContext};
use at_types::{
    config_error, internal_error, BestSoFar, Configuration, Cost, ParameterSpace, TuneError,
    TuneResult,
};

use crate::config::AlgorithmSettings;
use crate::orchestrator::{run_dynamic, run_static};
use crate::registry::build_sub_algorithm;

/// Custom-mode algorithm that fans a roster of static and dynamic
/// algorithms out over a bounded number of concurrent sub-runs.
///
/// Each sub-run owns `<experiment>/<SubAlgorithm>/` with its own store and
/// log. Every trial a sub-run records is also forwarded to this run's store,
/// so the parent store holds the union of all trials.
#[derive(Debug)]
pub struct ParallelSearch {
    roster: Vec<String>,
    pending: Vec<SearchAlgorithm>,
    max_workers: usize,
    sub_workers: usize,
    best: BestSoFar,
}

impl ParallelSearch {
    pub fn new(space: &ParameterSpace, settings: &AlgorithmSettings) -> TuneResult<Self> {
        let parallel = &settings.parallel;
        if parallel.roster.is_empty() {
            return Err(config_error!("ParallelSearch roster is empty"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = parallel.roster.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(config_error!("{dup} appears twice in the ParallelSearch roster"));
        }

        let pending = parallel
            .roster
            .iter()
            .enumerate()
            .map(|(index, name)| build_sub_algorithm(name, space, settings, index))
            .collect::<TuneResult<Vec<_>>>()?;

        Ok(Self {
            roster: parallel.roster.clone(),
            pending,
            max_workers: parallel.max_workers.max(1),
            sub_workers: parallel.sub_workers.max(1),
            best: BestSoFar::new(),
        })
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }
}

impl Search for ParallelSearch {
    fn name(&self) -> &str {
        "ParallelSearch"
    }

    fn best(&self) -> &BestSoFar {
        &self.best
    }

    fn update(&mut self, config: &Configuration, result: Cost) {
        self.best.offer(config, result);
    }
}

#[async_trait]
impl CustomSearch for ParallelSearch {
    async fn custom_run(&mut self, ctx: &TrialContext) -> TuneResult<()> {
        let started = Instant::now();
        let log = ctx.experiment.logger(self.name())?;
        let subs = std::mem::take(&mut self.pending);
        log.log(format!(
            "Launching {} sub-algorithm(s) with {} concurrent: {}",
            subs.len(),
            self.max_workers,
            self.roster.join(", ")
        ));

        let slots = Arc::new(Semaphore::new(self.max_workers));
        let (mirror_tx, mut mirror_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        for (index, alg) in subs.into_iter().enumerate() {
            let name = alg.name().to_string();
            let experiment = ctx.experiment.sub_experiment(&name)?;
            let store = Arc::new(experiment.open_store()?);
            let sub_log = Arc::new(experiment.logger(&name)?);
            let sub_ctx = TrialContext::new(
                ctx.target.clone(),
                Arc::clone(&ctx.executor),
                store,
                sub_log,
                experiment,
                ctx.shutdown.clone(),
            )
            .with_mirror(mirror_tx.clone());

            let slots = Arc::clone(&slots);
            let workers = self.sub_workers;
            tasks.spawn(async move {
                let _slot = slots
                    .acquire_owned()
                    .await
                    .map_err(|e| internal_error!("sub-run slot pool closed: {e}"))?;
                run_sub(alg, sub_ctx, workers)
                    .await
                    .map(|result| (index, result))
            });
        }
        // Sub-contexts hold the remaining senders; the channel closes once
        // every sub-run has finished.
        drop(mirror_tx);

        let mut results: Vec<(usize, SubAlgorithmResult)> = Vec::new();
        let mut first_error: Option<TuneError> = None;
        let mut mirror_open = true;

        loop {
            tokio::select! {
                record = mirror_rx.recv(), if mirror_open => match record {
                    Some(record) => {
                        ctx.store.save(&record.config, record.time)?;
                        self.update(&record.config, record.time);
                    }
                    None => mirror_open = false,
                },
                joined = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Some(Ok(Ok((index, result)))) => {
                        log.log(format!(
                            "{} finished in {:.3}s, best {}",
                            result.algorithm, result.runtime, result.best_time
                        ));
                        results.push((index, result));
                    }
                    Some(Ok(Err(e))) => {
                        log.warn(format!("sub-run failed: {e}"));
                        first_error.get_or_insert(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "sub-run task panicked");
                        first_error.get_or_insert(internal_error!("sub-run task panicked: {e}"));
                    }
                    None => {}
                },
                else => break,
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        results.sort_by_key(|(index, _)| *index);
        let summary = ParallelSummary {
            sub_algorithms: self.roster.clone(),
            results: results.into_iter().map(|(_, result)| result).collect(),
            global_best: self.best.clone(),
            total_runtime: round_ms(started.elapsed().as_secs_f64()),
        };
        let path = ctx.experiment.parallel_summary_path();
        summary.write_to(&path)?;

        match self.best.config() {
            Some(config) => log.log(format!("Global best: {config} -> {}", self.best.cost())),
            None => log.warn("No sub-algorithm produced a usable result"),
        }
        info!(path = %path.display(), "parallel summary written");
        Ok(())
    }
}

async fn run_sub(
    mut alg: SearchAlgorithm,
    ctx: TrialContext,
    workers: usize,
) -> TuneResult<SubAlgorithmResult> {
    let started = Instant::now();
    let name = alg.name().to_string();
    ctx.log.log(format!("Starting {name} ({} mode)", alg.mode()));

    match &mut alg {
        SearchAlgorithm::Static(sub) => run_static(sub.as_mut(), &ctx, workers).await?,
        SearchAlgorithm::Dynamic(sub) => run_dynamic(sub.as_mut(), &ctx).await?,
        SearchAlgorithm::Custom(_) => {
            return Err(internal_error!("{name} is a custom algorithm and cannot be nested"));
        }
    };

    let runtime = started.elapsed();
    ctx.store.add_summary(&name, runtime)?;
    let best = alg.best().clone();
    Ok(SubAlgorithmResult {
        algorithm: name,
        best_config: best.config,
        best_time: best.time,
        runtime: round_ms(runtime.as_secs_f64()),
    })
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

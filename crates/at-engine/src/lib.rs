//! # at-engine
//!
//! Runs tuning sessions: resolves the requested algorithm, drives it in its
//! execution mode against a compile-and-run executor, and persists every
//! trial to the experiment's results store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use at_engine::{Autotuner, CompileRunExecutor, TunerSettings};
//! use at_optimizer::ShutdownSignal;
//!
//! # async fn demo() -> at_types::TuneResult<()> {
//! let settings = TunerSettings::load(None)?.apply_env()?;
//! let executor = Arc::new(CompileRunExecutor::new(settings.executor.clone()));
//! let tuner = Autotuner::from_input_file("config.txt", settings, executor)?;
//! let report = tuner.run(ShutdownSignal::never()).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod execution;
pub mod orchestrator;
pub mod parallel;
pub mod registry;
pub mod tuner;

#[cfg(test)]
mod testing;

pub use config::{AlgorithmSettings, ExecutorConfig, ParallelSettings, TunerSettings};
pub use execution::CompileRunExecutor;
pub use orchestrator::{
    run_dynamic, run_static, spawn_interrupt_listener, LoopOutcome, Orchestrator, TuningReport,
};
pub use parallel::ParallelSearch;
pub use registry::{build_algorithm, build_sub_algorithm, AlgorithmKind};
pub use tuner::Autotuner;

//! Search algorithm shapes.
//!
//! An algorithm is one of three shapes, fixed when it is built:
//!
//! * **static** algorithms know every candidate up front, so the orchestrator
//!   may run them in any order and in parallel;
//! * **dynamic** algorithms choose each candidate from the outcome of the
//!   previous one, so their trials run strictly one after another;
//! * **custom** algorithms run their own trial loop.

use async_trait::async_trait;
use std::fmt;

use at_types::{BestSoFar, Configuration, Cost, History, TuneResult};

use crate::context::TrialContext;

/// Behaviour shared by every shape: a name and best-so-far bookkeeping.
pub trait Search: Send {
    /// Registry name (e.g. "GridSearch").
    fn name(&self) -> &str;

    fn best(&self) -> &BestSoFar;

    /// Incorporate one finished trial.
    fn update(&mut self, config: &Configuration, result: Cost);

    fn best_config(&self) -> Option<&Configuration> {
        self.best().config()
    }

    fn best_result(&self) -> Cost {
        self.best().cost()
    }
}

/// Produces its whole candidate set before any trial runs.
pub trait StaticSearch: Search {
    fn all_configs(&mut self) -> Box<dyn Iterator<Item = Configuration> + Send>;
}

/// Picks each next candidate from the results so far.
pub trait DynamicSearch: Search {
    fn next_config(&mut self, history: &History) -> Configuration;

    fn stop(&self) -> bool;
}

/// Drives its own trial loop.
#[async_trait]
pub trait CustomSearch: Search {
    async fn custom_run(&mut self, ctx: &TrialContext) -> TuneResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Static,
    Dynamic,
    Custom,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Dynamic => f.write_str("dynamic"),
            Self::Custom => f.write_str("custom"),
        }
    }
}

/// A search algorithm tagged with its execution shape.
pub enum SearchAlgorithm {
    Static(Box<dyn StaticSearch>),
    Dynamic(Box<dyn DynamicSearch>),
    Custom(Box<dyn CustomSearch>),
}

impl SearchAlgorithm {
    pub fn mode(&self) -> SearchMode {
        match self {
            Self::Static(_) => SearchMode::Static,
            Self::Dynamic(_) => SearchMode::Dynamic,
            Self::Custom(_) => SearchMode::Custom,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Static(alg) => alg.name(),
            Self::Dynamic(alg) => alg.name(),
            Self::Custom(alg) => alg.name(),
        }
    }

    pub fn best(&self) -> &BestSoFar {
        match self {
            Self::Static(alg) => alg.best(),
            Self::Dynamic(alg) => alg.best(),
            Self::Custom(alg) => alg.best(),
        }
    }
}

impl fmt::Debug for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchAlgorithm")
            .field("name", &self.name())
            .field("mode", &self.mode())
            .field("best", self.best())
            .finish()
    }
}

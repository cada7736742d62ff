//! # at-optimizer
//!
//! Search algorithms for the autotuner. Every algorithm tracks its own
//! best-so-far and declares one execution shape (static, dynamic or custom)
//! through [`SearchAlgorithm`]. Grid and random search are static; greedy
//! local search and simulated annealing are dynamic.

mod annealing;
mod context;
mod greedy;
mod grid;
mod random;
mod search;

pub use annealing::{AnnealingSchedule, SimulatedAnnealing};
pub use context::{shutdown_channel, ShutdownSignal, ShutdownTrigger, TrialContext};
pub use greedy::{GreedySearch, DEFAULT_MAX_ITERS};
pub use grid::GridSearch;
pub use random::{RandomSearch, DEFAULT_SAMPLE_SIZE};
pub use search::{CustomSearch, DynamicSearch, Search, SearchAlgorithm, SearchMode, StaticSearch};

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::{Cost, History, ParameterSpace};
    use proptest::prelude::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .add_choice("optimize_level", ["O0", "O1", "O2", "O3"])
            .add_choice("block_size", ["8", "16", "32"])
    }

    fn variants(seed: u64) -> Vec<SearchAlgorithm> {
        vec![
            SearchAlgorithm::Static(Box::new(GridSearch::new(space()))),
            SearchAlgorithm::Static(Box::new(RandomSearch::seeded(space(), 6, seed))),
            SearchAlgorithm::Dynamic(Box::new(GreedySearch::seeded(space(), 20, seed))),
            SearchAlgorithm::Dynamic(Box::new(SimulatedAnnealing::seeded(
                space(),
                AnnealingSchedule::default(),
                seed,
            ))),
        ]
    }

    proptest! {
        #[test]
        fn best_never_increases_for_any_variant(
            seed in any::<u64>(),
            costs in prop::collection::vec(prop::option::of(0.0f64..10.0), 1..30),
        ) {
            for algorithm in variants(seed) {
                let mut previous = Cost::FAILED;
                let mut feed = costs.iter().cycle().map(|c| c.map(Cost::new).unwrap_or(Cost::FAILED));

                match algorithm {
                    SearchAlgorithm::Static(mut alg) => {
                        for config in alg.all_configs() {
                            alg.update(&config, feed.next().unwrap());
                            prop_assert!(alg.best_result() <= previous);
                            previous = alg.best_result();
                        }
                    }
                    SearchAlgorithm::Dynamic(mut alg) => {
                        let mut history = History::new();
                        while !alg.stop() {
                            let config = alg.next_config(&history);
                            prop_assert!(space().contains(&config));
                            let cost = feed.next().unwrap();
                            history.insert(config.canonical_key(), cost);
                            alg.update(&config, cost);
                            prop_assert!(alg.best_result() <= previous);
                            previous = alg.best_result();
                        }
                    }
                    SearchAlgorithm::Custom(_) => unreachable!(),
                }
            }
        }
    }
}

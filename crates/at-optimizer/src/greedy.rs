//! Greedy local search over adjacent candidate values.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::debug;

use at_types::{BestSoFar, Configuration, Cost, History, ParameterSpace};

use crate::search::{DynamicSearch, Search};

pub const DEFAULT_MAX_ITERS: usize = 20;

/// Hill descent that moves one parameter one step at a time.
///
/// Starts from a uniformly random point. Each step tries an untested
/// neighbor of the current position and moves there only on strict
/// improvement. Converges when every neighbor has been tested.
#[derive(Debug, Clone)]
pub struct GreedySearch {
    space: ParameterSpace,
    max_iters: usize,
    rng: StdRng,
    current: Configuration,
    best: BestSoFar,
    iterations: usize,
    converged: bool,
}

impl GreedySearch {
    pub fn new(space: ParameterSpace, max_iters: usize) -> Self {
        Self::with_rng(space, max_iters, StdRng::from_os_rng())
    }

    pub fn seeded(space: ParameterSpace, max_iters: usize, seed: u64) -> Self {
        Self::with_rng(space, max_iters, StdRng::seed_from_u64(seed))
    }

    fn with_rng(space: ParameterSpace, max_iters: usize, mut rng: StdRng) -> Self {
        let current = space.random_configuration(&mut rng);
        Self {
            space,
            max_iters,
            rng,
            current,
            best: BestSoFar::new(),
            iterations: 0,
            converged: false,
        }
    }

    pub fn current(&self) -> &Configuration {
        &self.current
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }
}

impl Search for GreedySearch {
    fn name(&self) -> &str {
        "GreedySearch"
    }

    fn best(&self) -> &BestSoFar {
        &self.best
    }

    fn update(&mut self, config: &Configuration, result: Cost) {
        if self.best.offer(config, result) {
            self.current = config.clone();
        }
    }
}

impl DynamicSearch for GreedySearch {
    fn next_config(&mut self, history: &History) -> Configuration {
        self.iterations += 1;
        if self.iterations == 1 {
            return self.current.clone();
        }

        let untested: Vec<Configuration> = self
            .space
            .neighbors(&self.current)
            .into_iter()
            .filter(|n| !history.contains_key(&n.canonical_key()))
            .collect();

        match untested.choose(&mut self.rng) {
            Some(next) => next.clone(),
            None => {
                debug!(current = %self.current, iterations = self.iterations, "greedy search converged");
                self.converged = true;
                self.current.clone()
            }
        }
    }

    fn stop(&self) -> bool {
        self.converged || self.iterations >= self.max_iters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .add_choice("optimize_level", ["O0", "O1", "O2", "O3"])
            .add_choice("block_size", ["8", "16", "32", "64", "128"])
    }

    /// Cost is the distance from (O2, 32) in index space.
    fn bowl(config: &Configuration) -> Cost {
        let space = space();
        let pos = |name: &str, target: usize| {
            let values = space.values(name).unwrap();
            let idx = values.iter().position(|v| Some(v.as_str()) == config.get(name)).unwrap();
            (idx as f64 - target as f64).abs()
        };
        Cost::new(1.0 + pos("optimize_level", 2) + pos("block_size", 2))
    }

    fn drive(alg: &mut GreedySearch, cost: impl Fn(&Configuration) -> Cost) -> Vec<Configuration> {
        let mut history = History::new();
        let mut offered = Vec::new();
        while !alg.stop() {
            let config = alg.next_config(&history);
            let result = cost(&config);
            history.insert(config.canonical_key(), result);
            alg.update(&config, result);
            offered.push(config);
        }
        offered
    }

    #[test]
    fn first_offer_is_the_random_start() {
        let mut alg = GreedySearch::seeded(space(), 20, 11);
        let start = alg.current().clone();
        assert!(space().contains(&start));
        assert_eq!(alg.next_config(&History::new()), start);
        assert_eq!(alg.iterations(), 1);
    }

    #[test]
    fn later_offers_are_untested_neighbors() {
        let mut alg = GreedySearch::seeded(space(), 20, 5);
        let mut history = History::new();
        let start = alg.next_config(&history);
        history.insert(start.canonical_key(), Cost::new(1.0));
        alg.update(&start, Cost::new(1.0));

        let next = alg.next_config(&history);
        assert!(space().neighbors(&start).contains(&next));
        assert!(!history.contains_key(&next.canonical_key()));
    }

    #[test]
    fn descends_to_the_bowl_minimum() {
        let mut alg = GreedySearch::seeded(space(), 100, 17);
        drive(&mut alg, bowl);

        assert!(alg.is_converged());
        assert_eq!(alg.best_result(), Cost::new(1.0));
        let best = alg.best_config().unwrap();
        assert_eq!(best.get("optimize_level"), Some("O2"));
        assert_eq!(best.get("block_size"), Some("32"));
    }

    #[test]
    fn iteration_cap_stops_the_search() {
        let mut alg = GreedySearch::seeded(space(), 3, 23);
        let offered = drive(&mut alg, |_| Cost::new(1.0));
        assert_eq!(offered.len(), 3);
        assert!(alg.stop());
    }

    #[test]
    fn worse_result_keeps_current_position() {
        let mut alg = GreedySearch::seeded(space(), 20, 31);
        let start = alg.next_config(&History::new());
        alg.update(&start, Cost::new(1.0));

        let worse = space().neighbors(&start).into_iter().next().unwrap();
        alg.update(&worse, Cost::new(5.0));
        assert_eq!(alg.current(), &start);

        alg.update(&worse, Cost::new(0.5));
        assert_eq!(alg.current(), &worse);
    }

    #[test]
    fn converged_search_reoffers_current() {
        let single = ParameterSpace::new().add_choice("optimize_level", ["O2"]);
        let mut alg = GreedySearch::seeded(single, 20, 1);
        let mut history = History::new();

        let first = alg.next_config(&history);
        history.insert(first.canonical_key(), Cost::new(1.0));
        alg.update(&first, Cost::new(1.0));

        assert_eq!(alg.next_config(&history), first);
        assert!(alg.is_converged());
        assert!(alg.stop());
    }
}

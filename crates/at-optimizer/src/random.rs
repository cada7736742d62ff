//! Random sampling without replacement.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::HashSet;

use at_types::{BestSoFar, Configuration, Cost, ParameterSpace};

use crate::search::{Search, StaticSearch};

pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Draws `sample_size` distinct configurations from the space. When the
/// space is smaller than the sample, the whole space is used.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: ParameterSpace,
    sample_size: usize,
    rng: StdRng,
    best: BestSoFar,
}

impl RandomSearch {
    pub fn new(space: ParameterSpace, sample_size: usize) -> Self {
        Self::with_rng(space, sample_size, StdRng::from_os_rng())
    }

    pub fn seeded(space: ParameterSpace, sample_size: usize, seed: u64) -> Self {
        Self::with_rng(space, sample_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(space: ParameterSpace, sample_size: usize, rng: StdRng) -> Self {
        Self {
            space,
            sample_size,
            rng,
            best: BestSoFar::new(),
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    fn sample(&mut self) -> Vec<Configuration> {
        match self.space.size() {
            Some(total) => {
                let amount = self.sample_size.min(total);
                index::sample(&mut self.rng, total, amount)
                    .into_iter()
                    .filter_map(|i| self.space.configuration_at(i))
                    .collect()
            }
            // Too large to index: the space dwarfs any sample, so rejection
            // sampling terminates quickly.
            None => {
                let mut seen = HashSet::with_capacity(self.sample_size);
                let mut picked = Vec::with_capacity(self.sample_size);
                while picked.len() < self.sample_size {
                    let config = self.space.random_configuration(&mut self.rng);
                    if seen.insert(config.clone()) {
                        picked.push(config);
                    }
                }
                picked
            }
        }
    }
}

impl Search for RandomSearch {
    fn name(&self) -> &str {
        "RandomSearch"
    }

    fn best(&self) -> &BestSoFar {
        &self.best
    }

    fn update(&mut self, config: &Configuration, result: Cost) {
        self.best.offer(config, result);
    }
}

impl StaticSearch for RandomSearch {
    fn all_configs(&mut self) -> Box<dyn Iterator<Item = Configuration> + Send> {
        Box::new(self.sample().into_iter())
    }
}

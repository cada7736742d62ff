//! Exhaustive grid search.

use at_types::{BestSoFar, Configuration, Cost, ParameterSpace};

use crate::search::{Search, StaticSearch};

/// Every point of the Cartesian product, outer-to-inner by parameter order.
#[derive(Debug, Clone)]
pub struct GridSearch {
    space: ParameterSpace,
    best: BestSoFar,
}

impl GridSearch {
    pub fn new(space: ParameterSpace) -> Self {
        Self {
            space,
            best: BestSoFar::new(),
        }
    }

    /// Number of configurations the grid will emit.
    pub fn size(&self) -> Option<usize> {
        self.space.size()
    }
}

impl Search for GridSearch {
    fn name(&self) -> &str {
        "GridSearch"
    }

    fn best(&self) -> &BestSoFar {
        &self.best
    }

    fn update(&mut self, config: &Configuration, result: Cost) {
        self.best.offer(config, result);
    }
}

impl StaticSearch for GridSearch {
    fn all_configs(&mut self) -> Box<dyn Iterator<Item = Configuration> + Send> {
        Box::new(self.space.iter_grid())
    }
}

//! Simulated annealing with Metropolis acceptance.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use at_types::{BestSoFar, Configuration, Cost, History, ParameterSpace};

use crate::search::{DynamicSearch, Search};

/// Temperature schedule and iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingSchedule {
    pub initial_temp: f64,
    /// Multiplier applied to the temperature after every update.
    pub cooling_rate: f64,
    /// The search stops once the temperature falls below this floor.
    pub stop_temp: f64,
    pub max_iter: usize,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self {
            initial_temp: 100.0,
            cooling_rate: 0.9,
            stop_temp: 1.0,
            max_iter: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    space: ParameterSpace,
    schedule: AnnealingSchedule,
    rng: StdRng,
    current: Configuration,
    temperature: f64,
    iterations: usize,
    best: BestSoFar,
}

impl SimulatedAnnealing {
    pub fn new(space: ParameterSpace, schedule: AnnealingSchedule) -> Self {
        Self::with_rng(space, schedule, StdRng::from_os_rng())
    }

    pub fn seeded(space: ParameterSpace, schedule: AnnealingSchedule, seed: u64) -> Self {
        Self::with_rng(space, schedule, StdRng::seed_from_u64(seed))
    }

    fn with_rng(space: ParameterSpace, schedule: AnnealingSchedule, mut rng: StdRng) -> Self {
        let current = space.random_configuration(&mut rng);
        Self {
            space,
            temperature: schedule.initial_temp,
            schedule,
            rng,
            current,
            iterations: 0,
            best: BestSoFar::new(),
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn current(&self) -> &Configuration {
        &self.current
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Reassign one randomly chosen parameter to a uniformly random candidate.
    fn perturb(&mut self) -> Configuration {
        let Some(param) = self.space.parameters.choose(&mut self.rng) else {
            return self.current.clone();
        };
        match param.values.choose(&mut self.rng) {
            Some(value) => self.current.with(&param.name, value),
            None => self.current.clone(),
        }
    }

    fn accept(&mut self, result: Cost) -> bool {
        let best = self.best.cost();
        if result <= best {
            return true;
        }
        let delta = result.seconds() - best.seconds();
        let probability = (-delta / self.temperature).exp();
        self.rng.random::<f64>() < probability
    }
}

impl Search for SimulatedAnnealing {
    fn name(&self) -> &str {
        "SimulatedAnnealing"
    }

    fn best(&self) -> &BestSoFar {
        &self.best
    }

    fn update(&mut self, config: &Configuration, result: Cost) {
        self.iterations += 1;
        self.best.offer(config, result);

        if self.accept(result) {
            self.current = config.clone();
        }
        self.temperature *= self.schedule.cooling_rate;
    }
}

impl DynamicSearch for SimulatedAnnealing {
    fn next_config(&mut self, history: &History) -> Configuration {
        if self.iterations == 0 {
            return self.current.clone();
        }
        let candidate = self.perturb();
        if history.contains_key(&candidate.canonical_key()) {
            return self.space.random_configuration(&mut self.rng);
        }
        candidate
    }

    fn stop(&self) -> bool {
        self.temperature < self.schedule.stop_temp || self.iterations >= self.schedule.max_iter
    }
}

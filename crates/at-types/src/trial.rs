//! Trial costs, trial records and best-so-far tracking.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::space::Configuration;

/// Measured cost of a trial in seconds. Failures carry [`Cost::FAILED`].
///
/// Serialized as a plain number; the failure sentinel is written as `null`
/// because JSON has no representation for infinity.
#[derive(Debug, Clone, Copy)]
pub struct Cost(f64);

impl Cost {
    /// Infinite-cost sentinel shared by every trial failure kind.
    pub const FAILED: Cost = Cost(f64::INFINITY);

    /// Wrap a measured value. Negative and NaN readings are not meaningful
    /// elapsed times and are treated as failures.
    pub fn new(seconds: f64) -> Self {
        if seconds.is_nan() || seconds < 0.0 {
            Self::FAILED
        } else {
            Self(seconds)
        }
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn is_failure(self) -> bool {
        !self.0.is_finite()
    }

    pub fn is_better_than(self, other: Cost) -> bool {
        self.0 < other.0
    }
}

impl Default for Cost {
    fn default() -> Self {
        Self::FAILED
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_failure() {
            f.write_str("inf")
        } else {
            write!(f, "{:.6}s", self.0)
        }
    }
}

impl Serialize for Cost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_failure() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Cost {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?
            .map(Cost::new)
            .unwrap_or(Cost::FAILED))
    }
}

/// One executed trial: the configuration and what it cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub config: Configuration,
    pub time: Cost,
}

impl TrialRecord {
    pub fn new(config: Configuration, time: Cost) -> Self {
        Self { config, time }
    }
}

/// Previously executed configurations keyed by [`Configuration::canonical_key`].
pub type History = HashMap<String, Cost>;

/// Lowest-cost record observed so far.
///
/// Only strictly lower costs replace the current best, so ties keep the
/// earlier record and failures never become best.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestSoFar {
    pub config: Option<Configuration>,
    pub time: Cost,
}

impl BestSoFar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a result. Returns `true` when it became the new best.
    pub fn offer(&mut self, config: &Configuration, time: Cost) -> bool {
        if time.is_better_than(self.time) {
            self.config = Some(config.clone());
            self.time = time;
            true
        } else {
            false
        }
    }

    pub fn config(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    pub fn cost(&self) -> Cost {
        self.time
    }

    pub fn is_found(&self) -> bool {
        self.config.is_some()
    }
}

//! Parameter spaces and concrete configurations.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::errors::{TuneError, TuneResult};

/// One tunable parameter and its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name as written in the tuning input (e.g. "optimize_level").
    pub name: String,
    /// Candidate values in declaration order. Order matters for neighbor moves.
    pub values: Vec<String>,
}

/// The full search space: an ordered list of parameter definitions.
///
/// Insertion order is significant: grid enumeration treats the first
/// parameter as the outermost (slowest changing) axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterDef>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Add a parameter. Re-adding an existing name replaces its candidates but
    /// keeps its original position.
    pub fn add_choice<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.values = values,
            None => self.parameters.push(ParameterDef { name, values }),
        }
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Reject spaces in which some parameter has no candidate at all, or
    /// lists the same candidate twice.
    pub fn validate(&self) -> TuneResult<()> {
        for param in &self.parameters {
            if param.values.is_empty() {
                return Err(TuneError::Config(format!(
                    "parameter '{}' has no candidate values",
                    param.name
                )));
            }
            let mut seen = HashSet::with_capacity(param.values.len());
            if let Some(dup) = param.values.iter().find(|v| !seen.insert(v.as_str())) {
                return Err(TuneError::Config(format!(
                    "parameter '{}' lists candidate '{dup}' more than once",
                    param.name
                )));
            }
        }
        Ok(())
    }

    /// Number of points in the Cartesian product, or `None` on overflow.
    pub fn size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for param in &self.parameters {
            total = total.checked_mul(param.values.len())?;
        }
        Some(total)
    }

    /// Decode a mixed-radix index into a configuration. The last parameter
    /// varies fastest, matching [`GridIter`] order.
    pub fn configuration_at(&self, mut index: usize) -> Option<Configuration> {
        if index >= self.size()? {
            return None;
        }
        let mut picks = vec![0usize; self.parameters.len()];
        for (slot, param) in picks.iter_mut().zip(&self.parameters).rev() {
            let radix = param.values.len();
            *slot = index % radix;
            index /= radix;
        }
        Some(self.assemble(&picks))
    }

    /// Lazily enumerate the Cartesian product, outer-to-inner by insertion order.
    pub fn iter_grid(&self) -> GridIter {
        GridIter::new(self.clone())
    }

    /// Pick every parameter uniformly at random.
    pub fn random_configuration<R: Rng + ?Sized>(&self, rng: &mut R) -> Configuration {
        self.parameters
            .iter()
            .filter_map(|p| p.values.choose(rng).map(|v| (p.name.clone(), v.clone())))
            .collect()
    }

    /// True when `config` assigns exactly the declared parameters, each to one
    /// of its candidates.
    pub fn contains(&self, config: &Configuration) -> bool {
        config.len() == self.parameters.len()
            && self.parameters.iter().all(|p| {
                config
                    .get(&p.name)
                    .is_some_and(|value| p.values.iter().any(|c| c == value))
            })
    }

    /// Configurations reachable by moving a single parameter one step along
    /// its ordered candidate list. Interior positions yield two neighbors per
    /// parameter, boundary positions one.
    pub fn neighbors(&self, config: &Configuration) -> Vec<Configuration> {
        let mut neighbors = Vec::new();
        for param in &self.parameters {
            let Some(idx) = config
                .get(&param.name)
                .and_then(|v| param.values.iter().position(|c| c == v))
            else {
                continue;
            };
            if idx > 0 {
                neighbors.push(config.with(&param.name, &param.values[idx - 1]));
            }
            if idx + 1 < param.values.len() {
                neighbors.push(config.with(&param.name, &param.values[idx + 1]));
            }
        }
        neighbors
    }

    fn assemble(&self, picks: &[usize]) -> Configuration {
        self.parameters
            .iter()
            .zip(picks)
            .map(|(p, &i)| (p.name.clone(), p.values[i].clone()))
            .collect()
    }
}

/// Odometer over the Cartesian product of a [`ParameterSpace`].
#[derive(Debug, Clone)]
pub struct GridIter {
    space: ParameterSpace,
    picks: Vec<usize>,
    remaining: Option<usize>,
    done: bool,
}

impl GridIter {
    fn new(space: ParameterSpace) -> Self {
        let done = space.parameters.iter().any(|p| p.values.is_empty());
        let remaining = if done { Some(0) } else { space.size() };
        let picks = vec![0; space.parameters.len()];
        Self {
            space,
            picks,
            remaining,
            done,
        }
    }

    fn advance(&mut self) {
        for (slot, param) in self.picks.iter_mut().zip(&self.space.parameters).rev() {
            *slot += 1;
            if *slot < param.values.len() {
                return;
            }
            *slot = 0;
        }
        // Carried past the outermost axis.
        self.done = true;
    }
}

impl Iterator for GridIter {
    type Item = Configuration;

    fn next(&mut self) -> Option<Configuration> {
        if self.done {
            return None;
        }
        let config = self.space.assemble(&self.picks);
        self.advance();
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        Some(config)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining {
            Some(n) => (n, Some(n)),
            None => (0, None),
        }
    }
}

/// One concrete assignment of a value to every tunable parameter.
///
/// Backed by a sorted map so that equal mappings always serialize to the same
/// canonical key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, String>);

impl Configuration {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of this configuration with one parameter reassigned.
    pub fn with(&self, name: &str, value: &str) -> Self {
        let mut next = self.0.clone();
        next.insert(name.to_string(), value.to_string());
        Self(next)
    }

    /// Canonical serialization used as the store's history key.
    pub fn canonical_key(&self) -> String {
        // A map of strings always serializes.
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Parse a key produced by [`Configuration::canonical_key`].
    pub fn from_key(key: &str) -> TuneResult<Self> {
        Ok(Self(serde_json::from_str(key)?))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

// Algorithm registry: maps input names to configured search algorithms

use std::fmt;
use std::str::FromStr;

use at_optimizer::{
    GreedySearch, GridSearch, RandomSearch, SearchAlgorithm, SearchMode, SimulatedAnnealing,
};
use at_types::{config_error, ParameterSpace, TuneError, TuneResult};

use crate::config::AlgorithmSettings;
use crate::parallel::ParallelSearch;

/// Every algorithm the tuner can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Grid,
    Random,
    Greedy,
    SimulatedAnnealing,
    Parallel,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 5] = [
        Self::Grid,
        Self::Random,
        Self::Greedy,
        Self::SimulatedAnnealing,
        Self::Parallel,
    ];

    /// Name used in tuning input files and experiment directories.
    pub fn name(self) -> &'static str {
        match self {
            Self::Grid => "GridSearch",
            Self::Random => "RandomSearch",
            Self::Greedy => "GreedySearch",
            Self::SimulatedAnnealing => "SimulatedAnnealing",
            Self::Parallel => "ParallelSearch",
        }
    }

    pub fn mode(self) -> SearchMode {
        match self {
            Self::Grid | Self::Random => SearchMode::Static,
            Self::Greedy | Self::SimulatedAnnealing => SearchMode::Dynamic,
            Self::Parallel => SearchMode::Custom,
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| TuneError::UnsupportedAlgorithm(name.to_string()))
    }
}

/// Build the top-level algorithm named in the tuning input.
pub fn build_algorithm(
    name: &str,
    space: &ParameterSpace,
    settings: &AlgorithmSettings,
) -> TuneResult<SearchAlgorithm> {
    let kind: AlgorithmKind = name.parse()?;
    space.validate()?;
    build(kind, space, settings, settings.seed)
}

/// Build one roster member of a parallel run. `index` is its roster
/// position; it varies the seed so siblings do not sample in lockstep.
pub fn build_sub_algorithm(
    name: &str,
    space: &ParameterSpace,
    settings: &AlgorithmSettings,
    index: usize,
) -> TuneResult<SearchAlgorithm> {
    let kind: AlgorithmKind = name.parse()?;
    if kind.mode() == SearchMode::Custom {
        return Err(config_error!(
            "{kind} cannot run inside a parallel roster; nested meta-searches are not supported"
        ));
    }
    space.validate()?;
    let seed = settings
        .seed
        .map(|seed| seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    build(kind, space, settings, seed)
}

fn build(
    kind: AlgorithmKind,
    space: &ParameterSpace,
    settings: &AlgorithmSettings,
    seed: Option<u64>,
) -> TuneResult<SearchAlgorithm> {
    let space = space.clone();
    let algorithm = match kind {
        AlgorithmKind::Grid => SearchAlgorithm::Static(Box::new(GridSearch::new(space))),
        AlgorithmKind::Random => {
            let n = settings.random_sample_size;
            SearchAlgorithm::Static(Box::new(match seed {
                Some(seed) => RandomSearch::seeded(space, n, seed),
                None => RandomSearch::new(space, n),
            }))
        }
        AlgorithmKind::Greedy => {
            let iters = settings.greedy_max_iters;
            SearchAlgorithm::Dynamic(Box::new(match seed {
                Some(seed) => GreedySearch::seeded(space, iters, seed),
                None => GreedySearch::new(space, iters),
            }))
        }
        AlgorithmKind::SimulatedAnnealing => {
            let schedule = settings.annealing;
            SearchAlgorithm::Dynamic(Box::new(match seed {
                Some(seed) => SimulatedAnnealing::seeded(space, schedule, seed),
                None => SimulatedAnnealing::new(space, schedule),
            }))
        }
        AlgorithmKind::Parallel => {
            SearchAlgorithm::Custom(Box::new(ParallelSearch::new(&space, settings)?))
        }
    };
    Ok(algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParallelSettings;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .add_choice("optimize_level", ["O0", "O1", "O2"])
            .add_choice("block_size", ["8", "16"])
    }

    #[test]
    fn names_round_trip() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.name().parse::<AlgorithmKind>().unwrap(), kind);
        }
    }

    #[test]
    fn every_algorithm_builds_with_its_mode() {
        let settings = AlgorithmSettings::default();
        for kind in AlgorithmKind::ALL {
            let algorithm = build_algorithm(kind.name(), &space(), &settings).unwrap();
            assert_eq!(algorithm.mode(), kind.mode());
            assert_eq!(algorithm.name(), kind.name());
        }
    }

    #[test]
    fn unknown_name_is_unsupported() {
        let err = build_algorithm("BayesianSearch", &space(), &AlgorithmSettings::default())
            .unwrap_err();
        assert!(matches!(err, TuneError::UnsupportedAlgorithm(ref n) if n == "BayesianSearch"));
    }

    #[test]
    fn parameter_without_candidates_is_rejected() {
        let mut space = space();
        space.insert("unroll", Vec::new());
        let err = build_algorithm("GridSearch", &space, &AlgorithmSettings::default()).unwrap_err();
        assert!(matches!(err, TuneError::Config(_)));
    }

    #[test]
    fn repeated_candidate_is_rejected_for_every_algorithm() {
        let mut space = space();
        space.insert("unroll", vec!["2".into(), "4".into(), "2".into()]);
        for kind in AlgorithmKind::ALL {
            let err = build_algorithm(kind.name(), &space, &AlgorithmSettings::default()).unwrap_err();
            assert!(matches!(err, TuneError::Config(_)), "{kind} accepted a repeated candidate");
        }
    }

    #[test]
    fn nested_parallel_roster_is_rejected() {
        let settings = AlgorithmSettings {
            parallel: ParallelSettings {
                roster: vec!["GridSearch".into(), "ParallelSearch".into()],
                ..ParallelSettings::default()
            },
            ..AlgorithmSettings::default()
        };
        let err = build_algorithm("ParallelSearch", &space(), &settings).unwrap_err();
        assert!(matches!(err, TuneError::Config(_)));
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn sub_algorithm_seeds_differ_by_roster_index() {
        let settings = AlgorithmSettings {
            random_sample_size: 3,
            seed: Some(7),
            ..AlgorithmSettings::default()
        };
        let wide = ParameterSpace::new().add_choice("x", (0..100).map(|i| i.to_string()));
        let sample = |index| match build_sub_algorithm("RandomSearch", &wide, &settings, index).unwrap() {
            SearchAlgorithm::Static(mut alg) => alg.all_configs().collect::<Vec<_>>(),
            _ => unreachable!(),
        };
        assert_eq!(sample(0), sample(0));
        assert_ne!(sample(0), sample(1));
    }
}

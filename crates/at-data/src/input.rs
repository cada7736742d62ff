//! Line-oriented `key=value` tuning input.
//!
//! ```text
//! # comment
//! target_program=kernels/matrix.c
//! search_algorithm=GridSearch
//! optimize_level=O0,O1,O2,O3
//! block_size=8,16,32,64
//! ```

use at_types::{config_error, ParameterSpace, TargetProgram, TuneResult};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

const TARGET_KEY: &str = "target_program";
const ALGORITHM_KEY: &str = "search_algorithm";

/// Everything the tuning input declares.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningInput {
    pub target: TargetProgram,
    pub algorithm: String,
    pub space: ParameterSpace,
}

impl TuningInput {
    pub fn from_file<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read tuning input {}: {e}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> TuneResult<Self> {
        let mut target = None;
        let mut algorithm = None;
        let mut space = ParameterSpace::new();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(config_error!("line {}: expected key=value, got '{line}'", number + 1));
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                TARGET_KEY | ALGORITHM_KEY => {
                    let slot = if key == TARGET_KEY { &mut target } else { &mut algorithm };
                    if slot.is_some() {
                        return Err(config_error!("line {}: '{key}' given more than once", number + 1));
                    }
                    if value.is_empty() {
                        return Err(config_error!("line {}: '{key}' has an empty value", number + 1));
                    }
                    *slot = Some(value.to_string());
                }
                "" => return Err(config_error!("line {}: missing parameter name", number + 1)),
                name => {
                    let candidates: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect();
                    if candidates.is_empty() {
                        return Err(config_error!(
                            "line {}: parameter '{name}' has no candidate values",
                            number + 1
                        ));
                    }
                    let mut seen = HashSet::with_capacity(candidates.len());
                    if let Some(dup) = candidates.iter().find(|v| !seen.insert(v.as_str())) {
                        return Err(config_error!(
                            "line {}: parameter '{name}' lists candidate '{dup}' more than once",
                            number + 1
                        ));
                    }
                    debug!(parameter = name, candidates = candidates.len(), "parsed parameter");
                    space.insert(name, candidates);
                }
            }
        }

        match (target, algorithm) {
            (Some(target), Some(algorithm)) => Ok(Self {
                target: TargetProgram::new(target),
                algorithm,
                space,
            }),
            _ => Err(config_error!(
                "missing required configuration fields: '{TARGET_KEY}' and '{ALGORITHM_KEY}' are both required"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use at_types::TuneError;

    const SAMPLE: &str = "\
# matrix multiplication tuning
target_program = kernels/matrix.c
search_algorithm=GridSearch

optimize_level=O0, O1,O2
block_size=8,16
";

    #[test]
    fn parses_required_keys_and_parameters() {
        let input = TuningInput::parse(SAMPLE).unwrap();
        assert_eq!(input.target.path(), Path::new("kernels/matrix.c"));
        assert_eq!(input.algorithm, "GridSearch");
        assert_eq!(
            input.space.names().collect::<Vec<_>>(),
            vec!["optimize_level", "block_size"]
        );
        assert_eq!(
            input.space.values("optimize_level").unwrap(),
            &["O0".to_string(), "O1".to_string(), "O2".to_string()]
        );
        assert_eq!(input.space.size(), Some(6));
    }

    #[test]
    fn missing_algorithm_is_fatal() {
        let err = TuningInput::parse("target_program=a.c\nopt=O1").unwrap_err();
        assert!(matches!(err, TuneError::Config(_)));
    }

    #[test]
    fn line_without_separator_is_rejected() {
        let err = TuningInput::parse("target_program=a.c\nsearch_algorithm=GridSearch\nopt O1").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn empty_candidate_list_is_rejected() {
        let err = TuningInput::parse("target_program=a.c\nsearch_algorithm=GridSearch\nopt= , ,").unwrap_err();
        assert!(err.to_string().contains("opt"));
    }

    #[test]
    fn repeated_candidate_is_rejected() {
        let text = "target_program=a.c\nsearch_algorithm=GridSearch\nblock=8,16\nopt=O1, O1,O2";
        let err = TuningInput::parse(text).unwrap_err();
        assert!(matches!(err, TuneError::Config(_)));
        let msg = err.to_string();
        assert!(msg.contains("line 4"));
        assert!(msg.contains("'O1'"));
    }

    #[test]
    fn duplicate_required_key_is_rejected() {
        let text = "target_program=a.c\ntarget_program=b.c\nsearch_algorithm=GridSearch";
        assert!(TuningInput::parse(text).is_err());
    }

    #[test]
    fn values_may_contain_equals_signs() {
        let text = "target_program=a.c\nsearch_algorithm=GridSearch\narch=-march=native,-march=x86-64";
        let input = TuningInput::parse(text).unwrap();
        assert_eq!(
            input.space.values("arch").unwrap(),
            &["-march=native".to_string(), "-march=x86-64".to_string()]
        );
    }
}

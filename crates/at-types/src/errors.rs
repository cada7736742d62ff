use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the autotuner
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported search algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Results-store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store document at {path} is corrupt: {message}")]
    Corruption { path: PathBuf, message: String },

    #[error("Failed to persist store document at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single trial produced no usable cost.
///
/// Trial failures never escape the executor; they are logged and mapped to
/// [`crate::Cost::FAILED`].
#[derive(Error, Debug)]
pub enum TrialFailure {
    #[error("compilation failed ({status}): {stderr}")]
    Compile { status: String, stderr: String },

    #[error("program exited with {status}: {stderr}")]
    Runtime { status: String, stderr: String },

    #[error("program output is not a single number: {output:?}")]
    MalformedResult { output: String },

    #[error("could not launch {stage}: {message}")]
    Launch { stage: &'static str, message: String },

    #[error("program did not finish within {seconds:.1}s")]
    Timeout { seconds: f64 },
}

impl TrialFailure {
    /// Short, stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Compile { .. } => "compile_failure",
            Self::Runtime { .. } => "runtime_failure",
            Self::MalformedResult { .. } => "malformed_result",
            Self::Launch { .. } => "launch_failure",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Result type alias for autotuner operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}

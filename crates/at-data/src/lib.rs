//! # at-data
//!
//! Everything the autotuner reads from or writes to disk: the tuning input,
//! experiment directories, per-experiment run logs, the results store and the
//! parallel run summary.

pub mod experiment;
pub mod input;
pub mod log;
pub mod store;
pub mod summary;

pub use experiment::*;
pub use input::*;
pub use log::*;
pub use store::*;
pub use summary::*;

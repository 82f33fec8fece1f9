//! # Data Module
//!
//! In-memory representation of the crossing-step dataset. This is the core
//! "Model" layer.
//!
//! ## Design Philosophy
//! - **Validate once, trust forever:** every invariant (closed enumerations,
//!   outcome in {0,1}, finite covariates) is enforced at load time, so the
//!   fitting code never re-checks.
//! - **Immutable after load:** the dataset is shared read-only across
//!   concurrent model fits; nothing downstream mutates it.
//! - **Integer-coded grouping:** the individual×winter random-effect key is
//!   mapped to contiguous level indices at load time so the fitter works with
//!   plain `usize` group labels.

pub mod dataset;
pub mod observation;

pub use dataset::Dataset;
pub use observation::{Observation, Season, WinterSeason};

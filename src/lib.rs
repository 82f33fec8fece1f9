//! # Elkcross Library Root
//!
//! ## Role
//! The crate root that declares all public modules and re-exports common types.
//!
//! ## Module Structure
//! ```text
//! elkcross
//! ├── data       # In-memory dataset (observations, grouping index)
//! ├── io         # CSV loading and validation
//! ├── model      # Formula, GLMM fitter, fitted-model object, AIC comparison
//! ├── report     # Text rendering of summaries and comparison tables
//! └── pipelines  # The fixed analysis sequence
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod report;

pub use config::Config;
pub use data::{Dataset, Observation, Season, WinterSeason};
pub use error::{ElkError, Result};
pub use model::{AicTable, FitOptions, FittedModel, Formula, GlmmFitter, Term};
pub use pipelines::AnalysisPipeline;

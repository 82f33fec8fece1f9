//! # Pipelines Module
//!
//! High-level orchestration. A single pipeline exists: the fixed
//! crossing-analysis sequence (load, fit the model set, report, compare).

pub mod analysis;

pub use analysis::AnalysisPipeline;

//! # I/O Module
//!
//! File reading boundary. Converts the on-disk CSV into the in-memory
//! `Dataset` representation.

pub mod csv;

pub use csv::load_dataset;

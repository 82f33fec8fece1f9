//! # Dataset Table
//!
//! Column-accessible table of validated observations plus the grouping-level
//! index for the random effect. Built once by the loader, then shared
//! read-only across all model fits.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::data::observation::Observation;
use crate::error::{ElkError, Result};

/// The loaded study dataset.
///
/// Rows are hourly travel steps; the grouping index maps each row to a
/// contiguous level index of the individual×winter random-effect key.
#[derive(Clone, Debug)]
pub struct Dataset {
    observations: Vec<Observation>,
    /// Distinct id_winter levels, in first-appearance order.
    levels: Vec<String>,
    /// Per-row level index into `levels`.
    group_of_row: Vec<usize>,
    /// Identity of the likelihood base, for AIC comparability checks.
    fingerprint: u64,
}

impl Dataset {
    /// Build a dataset from validated observations.
    ///
    /// Fails with `DataFormat` if the table is empty; a random intercept
    /// cannot be estimated from zero grouping levels.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(ElkError::data_format("dataset contains no observations"));
        }

        let mut levels: Vec<String> = Vec::new();
        let mut level_of: HashMap<String, usize> = HashMap::new();
        let mut group_of_row = Vec::with_capacity(observations.len());
        for obs in &observations {
            let idx = match level_of.get(obs.id_winter.as_str()) {
                Some(&idx) => idx,
                None => {
                    let idx = levels.len();
                    levels.push(obs.id_winter.clone());
                    level_of.insert(obs.id_winter.clone(), idx);
                    idx
                }
            };
            group_of_row.push(idx);
        }

        let fingerprint = Self::compute_fingerprint(&observations, levels.len());

        Ok(Self {
            observations,
            levels,
            group_of_row,
            fingerprint,
        })
    }

    fn compute_fingerprint(observations: &[Observation], n_levels: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        observations.len().hash(&mut hasher);
        n_levels.hash(&mut hasher);
        for obs in observations {
            obs.crossed.hash(&mut hasher);
            obs.traffic.to_bits().hash(&mut hasher);
            obs.id_winter.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn n_obs(&self) -> usize {
        self.observations.len()
    }

    pub fn n_groups(&self) -> usize {
        self.levels.len()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Random-effect level index for each row.
    pub fn group_of_row(&self) -> &[usize] {
        &self.group_of_row
    }

    /// Distinct id_winter levels in first-appearance order.
    pub fn group_levels(&self) -> &[String] {
        &self.levels
    }

    /// Binary outcome column as f64 (0.0 or 1.0).
    pub fn outcome(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.crossed as f64).collect()
    }

    /// Identity of the likelihood base. Two models are AIC-comparable only if
    /// their datasets carry the same fingerprint.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

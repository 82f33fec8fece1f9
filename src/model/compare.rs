//! # AIC Model Comparison
//!
//! Ranks previously fitted models by AIC and reports ΔAIC and Akaike
//! weights. AIC comparison requires an identical likelihood base, so models
//! fit on different observation subsets are rejected with
//! `IncomparableModels`.

use crate::error::{ElkError, Result};
use crate::model::fit::FittedModel;

/// One row of a ranked AIC table.
#[derive(Clone, Debug)]
pub struct AicRow {
    pub name: String,
    pub df: usize,
    pub log_likelihood: f64,
    pub aic: f64,
    /// AIC − min(AIC) within the table.
    pub delta_aic: f64,
    /// Akaike weight within the table.
    pub weight: f64,
}

/// AIC comparison table, sorted ascending by AIC.
#[derive(Clone, Debug)]
pub struct AicTable {
    rows: Vec<AicRow>,
}

impl AicTable {
    /// Rank the given named models. Fails with `IncomparableModels` when any
    /// two models were fit on different row subsets.
    pub fn rank(models: &[(&str, &FittedModel)]) -> Result<Self> {
        if models.len() < 2 {
            return Err(ElkError::incomparable(
                "AIC ranking requires at least two models",
            ));
        }
        for (name, model) in &models[1..] {
            check_comparable(models[0].1, model)
                .map_err(|e| ElkError::incomparable(format!("{} vs {}: {e}", models[0].0, name)))?;
        }

        let min_aic = models
            .iter()
            .map(|(_, m)| m.aic())
            .fold(f64::INFINITY, f64::min);
        let mut rows: Vec<AicRow> = models
            .iter()
            .map(|(name, m)| AicRow {
                name: name.to_string(),
                df: m.df(),
                log_likelihood: m.log_likelihood(),
                aic: m.aic(),
                delta_aic: m.aic() - min_aic,
                weight: (-(m.aic() - min_aic) / 2.0).exp(),
            })
            .collect();
        let weight_sum: f64 = rows.iter().map(|r| r.weight).sum();
        for row in &mut rows {
            row.weight /= weight_sum;
        }
        rows.sort_by(|a, b| a.aic.total_cmp(&b.aic));
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[AicRow] {
        &self.rows
    }

    /// Name of the lowest-AIC model.
    pub fn best(&self) -> &str {
        &self.rows[0].name
    }
}

/// Pairwise ΔAIC = AIC(a) − AIC(b). Antisymmetric by construction.
pub fn delta_aic(a: &FittedModel, b: &FittedModel) -> Result<f64> {
    check_comparable(a, b)?;
    Ok(a.aic() - b.aic())
}

fn check_comparable(a: &FittedModel, b: &FittedModel) -> Result<()> {
    if a.n_obs() != b.n_obs() {
        return Err(ElkError::incomparable(format!(
            "models were fit on {} vs {} observations",
            a.n_obs(),
            b.n_obs()
        )));
    }
    if a.dataset_fingerprint() != b.dataset_fingerprint() {
        return Err(ElkError::incomparable(
            "models were fit on different datasets",
        ));
    }
    Ok(())
}

//! # Fitted Model
//!
//! Immutable result object produced by the fitter. Everything downstream
//! (reporting, AIC comparison) reads from this; nothing recomputes.

use crate::error::{ElkError, Result};
use crate::model::formula::Formula;

/// One fixed-effect coefficient with its Wald statistics.
#[derive(Clone, Debug)]
pub struct Coefficient {
    pub label: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
}

/// A fitted random-intercept binomial GLMM.
#[derive(Clone, Debug)]
pub struct FittedModel {
    formula: Formula,
    coefficients: Vec<Coefficient>,
    /// Random-intercept variance σ² = θ̂².
    re_variance: f64,
    log_likelihood: f64,
    aic: f64,
    /// Parameter count entering the AIC penalty (fixed effects + variance
    /// component).
    df: usize,
    r2_marginal: f64,
    r2_conditional: f64,
    n_obs: usize,
    n_groups: usize,
    singular: bool,
    dataset_fingerprint: u64,
}

impl FittedModel {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        formula: Formula,
        coefficients: Vec<Coefficient>,
        re_variance: f64,
        log_likelihood: f64,
        aic: f64,
        df: usize,
        r2_marginal: f64,
        r2_conditional: f64,
        n_obs: usize,
        n_groups: usize,
        singular: bool,
        dataset_fingerprint: u64,
    ) -> Self {
        Self {
            formula,
            coefficients,
            re_variance,
            log_likelihood,
            aic,
            df,
            r2_marginal,
            r2_conditional,
            n_obs,
            n_groups,
            singular,
            dataset_fingerprint,
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    /// Random-intercept variance σ².
    pub fn re_variance(&self) -> f64 {
        self.re_variance
    }

    /// Random-intercept standard deviation θ̂.
    pub fn re_std_dev(&self) -> f64 {
        self.re_variance.sqrt()
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    /// Parameter count in the AIC penalty.
    pub fn df(&self) -> usize {
        self.df
    }

    /// Variance explained by the fixed effects only (latent scale).
    pub fn r2_marginal(&self) -> f64 {
        self.r2_marginal
    }

    /// Variance explained by fixed plus random effects (latent scale).
    pub fn r2_conditional(&self) -> f64 {
        self.r2_conditional
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Whether the random-intercept variance collapsed to numerical zero,
    /// suggesting the grouping structure may be unnecessary.
    pub fn is_singular(&self) -> bool {
        self.singular
    }

    /// Escalate a singular fit into an error, for callers that require a
    /// non-degenerate variance component.
    pub fn check_singular(&self) -> Result<()> {
        if self.singular {
            Err(ElkError::SingularFit {
                formula: self.formula.to_string(),
                variance: self.re_variance,
            })
        } else {
            Ok(())
        }
    }

    /// Identity of the likelihood base this model was fit on.
    pub fn dataset_fingerprint(&self) -> u64 {
        self.dataset_fingerprint
    }
}

//! # Model Module
//!
//! Statistical model implementation for the crossing analysis.
//!
//! ## Core pieces
//! - `formula`: fixed-effects specification and design-matrix construction
//! - `glmm`: random-intercept binomial GLMM fitter (Laplace approximation,
//!   penalized IRLS inner loop, golden-section outer loop)
//! - `fit`: the immutable fitted-model result object
//! - `compare`: AIC-based model comparison
//!
//! ## Why Laplace instead of quadrature
//!
//! With a single scalar random intercept the Laplace approximation to the
//! marginal likelihood is the standard estimator (it is what `lme4::glmer`
//! uses by default, nAGQ = 1). The grouped-intercept structure makes the
//! random-effect block of the penalized normal equations diagonal, so each
//! inner iteration is one dense Cholesky factorization of a small
//! (p + q) × (p + q) system; no sparse machinery is needed at this scale
//! (p ≤ 6 fixed terms, q = a few dozen individual×winter levels).

pub mod compare;
pub mod fit;
pub mod formula;
pub mod glmm;

pub use compare::{delta_aic, AicTable};
pub use fit::{Coefficient, FittedModel};
pub use formula::{Formula, Term};
pub use glmm::{FitOptions, GlmmFitter};

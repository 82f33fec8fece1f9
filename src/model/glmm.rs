//! # GLMM Fitter
//!
//! Fits y ~ Bernoulli(logit⁻¹(Xβ + θ·u[g])), u ~ N(0, I), by Laplace
//! approximation. θ is the random-intercept standard deviation (the single
//! variance component, grouped by individual×winter).
//!
//! Two nested loops:
//! - **Inner (PIRLS):** penalized iteratively reweighted least squares jointly
//!   updating (β, u) at fixed θ. Each iteration solves the augmented normal
//!   equations with one dense Cholesky factorization; step-halving guards
//!   against deviance increases.
//! - **Outer:** golden-section minimization of the profiled Laplace deviance
//!   over θ ∈ [0, θ_max]. With a grouped intercept the log-determinant term
//!   reduces to Σ_g log(1 + θ²·w_g).
//!
//! Each fit is a pure function of (formula, dataset): no state is shared
//! between calls, so fits are freely dispatched in parallel.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::data::Dataset;
use crate::error::{ElkError, Result};
use crate::model::fit::{Coefficient, FittedModel};
use crate::model::formula::Formula;

use std::f64::consts::PI;

/// Latent-scale clamp bounds for the logistic mean.
const MU_EPS: f64 = 1e-10;
/// Maximum step-halvings per PIRLS iteration.
const MAX_HALVINGS: usize = 12;

/// Fitter tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct FitOptions {
    /// Maximum PIRLS iterations per θ evaluation.
    pub max_pirls: usize,
    /// Maximum profiled-deviance evaluations in the outer search.
    pub max_outer: usize,
    /// Relative deviance-change convergence tolerance.
    pub tol: f64,
    /// Upper bound for the random-intercept standard deviation.
    pub theta_max: f64,
    /// Jittered restarts before declaring a convergence failure.
    pub restarts: usize,
    /// Seed for restart jitter (attempt index is added).
    pub seed: u64,
    /// θ below this is reported as a singular fit.
    pub singular_tol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_pirls: 200,
            max_outer: 80,
            tol: 1e-10,
            theta_max: 10.0,
            restarts: 3,
            seed: 7,
            singular_tol: 1e-6,
        }
    }
}

/// Converged PIRLS state at a fixed θ.
struct PirlsState {
    beta: DVector<f64>,
    u: DVector<f64>,
    /// IRLS weights μ(1−μ) at the mode.
    weights: DVector<f64>,
    /// −2·(conditional log-likelihood) + uᵀu.
    penalized_deviance: f64,
}

/// Random-intercept binomial GLMM fitter over one immutable dataset.
pub struct GlmmFitter<'a> {
    data: &'a Dataset,
    opts: FitOptions,
}

impl<'a> GlmmFitter<'a> {
    pub fn new(data: &'a Dataset) -> Self {
        Self {
            data,
            opts: FitOptions::default(),
        }
    }

    pub fn with_options(data: &'a Dataset, opts: FitOptions) -> Self {
        Self { data, opts }
    }

    /// Fit one formula. Retries with jittered starting values before giving
    /// up with `Convergence`; a collapsed variance component is flagged on
    /// the returned model, not treated as an error.
    pub fn fit(&self, formula: &Formula) -> Result<FittedModel> {
        let (x, labels) = formula.design_matrix(self.data);
        let y = DVector::from_vec(self.data.outcome());

        let mut last_err = None;
        for attempt in 0..=self.opts.restarts {
            let beta0 = self.starting_values(x.ncols(), attempt);
            match self.fit_from(formula, &x, &y, &labels, beta0) {
                Ok(model) => {
                    if attempt > 0 {
                        debug!(formula = %formula, attempt, "converged after restart");
                    }
                    return Ok(model);
                }
                Err(err @ ElkError::Convergence { .. }) => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ElkError::convergence(formula.to_string(), "no fit attempt was made")
        }))
    }

    /// Zero start on the first attempt, small deterministic jitter afterwards.
    fn starting_values(&self, p: usize, attempt: usize) -> DVector<f64> {
        if attempt == 0 {
            return DVector::zeros(p);
        }
        let mut rng = StdRng::seed_from_u64(self.opts.seed.wrapping_add(attempt as u64));
        DVector::from_fn(p, |_, _| rng.gen_range(-0.5..0.5))
    }

    fn fit_from(
        &self,
        formula: &Formula,
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        labels: &[String],
        beta0: DVector<f64>,
    ) -> Result<FittedModel> {
        let groups = self.data.group_of_row();
        let q = self.data.n_groups();
        let p = x.ncols();

        // Golden-section search over θ. The profiled Laplace deviance is
        // unimodal in θ for this model class.
        let gr = (5.0_f64.sqrt() - 1.0) / 2.0;
        let mut lo = 0.0;
        let mut hi = self.opts.theta_max;
        let mut warm = (beta0.clone(), DVector::<f64>::zeros(q));

        let mut evals = 0usize;
        let profile = |theta: f64, warm: &mut (DVector<f64>, DVector<f64>)| -> Result<f64> {
            let state = self.pirls(formula, x, y, groups, q, theta, &warm.0, &warm.1)?;
            let dev = laplace_deviance(&state, groups, q, theta);
            warm.0 = state.beta;
            warm.1 = state.u;
            Ok(dev)
        };

        let mut t1 = hi - gr * (hi - lo);
        let mut t2 = lo + gr * (hi - lo);
        let mut f1 = profile(t1, &mut warm)?;
        let mut f2 = profile(t2, &mut warm)?;
        evals += 2;
        while evals < self.opts.max_outer && (hi - lo) > 1e-8 * self.opts.theta_max {
            if f1 < f2 {
                hi = t2;
                t2 = t1;
                f2 = f1;
                t1 = hi - gr * (hi - lo);
                f1 = profile(t1, &mut warm)?;
            } else {
                lo = t1;
                t1 = t2;
                f1 = f2;
                t2 = lo + gr * (hi - lo);
                f2 = profile(t2, &mut warm)?;
            }
            evals += 1;
        }
        let theta = 0.5 * (lo + hi);

        // Final solve at θ̂ for the mode, weights and information matrix.
        let state = self.pirls(formula, x, y, groups, q, theta, &warm.0, &warm.1)?;
        let deviance = laplace_deviance(&state, groups, q, theta);
        let log_likelihood = -0.5 * deviance;

        let k = p + 1; // fixed coefficients + one variance component
        let aic = deviance + 2.0 * k as f64;

        // Wald standard errors: β-block of the inverse penalized Fisher
        // information at the mode.
        let (info, _) = assemble_system(x, groups, q, theta, &state.weights, None);
        let chol = info.cholesky().ok_or_else(|| {
            ElkError::convergence(
                formula.to_string(),
                "information matrix is not positive definite at the optimum",
            )
        })?;
        let cov = chol.inverse();

        let coefficients = (0..p)
            .map(|j| {
                let estimate = state.beta[j];
                let std_error = cov[(j, j)].max(0.0).sqrt();
                let z_value = if std_error > 0.0 {
                    estimate / std_error
                } else {
                    f64::NAN
                };
                Coefficient {
                    label: labels[j].clone(),
                    estimate,
                    std_error,
                    z_value,
                    p_value: two_sided_p(z_value),
                }
            })
            .collect();

        // Nakagawa & Schielzeth theoretical R² for a binomial-logit GLMM:
        // latent-scale variance partition with π²/3 distribution variance.
        let eta_fixed = x * &state.beta;
        let var_fixed = population_variance(eta_fixed.as_slice());
        let var_random = theta * theta;
        let var_total = var_fixed + var_random + PI * PI / 3.0;
        let r2_marginal = var_fixed / var_total;
        let r2_conditional = (var_fixed + var_random) / var_total;

        debug!(formula = %formula, theta, aic, evals, "fit complete");

        Ok(FittedModel::new(
            formula.clone(),
            coefficients,
            var_random,
            log_likelihood,
            aic,
            k,
            r2_marginal,
            r2_conditional,
            self.data.n_obs(),
            self.data.n_groups(),
            theta < self.opts.singular_tol,
            self.data.fingerprint(),
        ))
    }

    /// Penalized IRLS at fixed θ. Converges on the penalized deviance
    /// −2·ℓ(y|β,u) + uᵀu; fails with `Convergence` when the iteration or
    /// step-halving budget is exhausted.
    #[allow(clippy::too_many_arguments)]
    fn pirls(
        &self,
        formula: &Formula,
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        groups: &[usize],
        q: usize,
        theta: f64,
        beta0: &DVector<f64>,
        u0: &DVector<f64>,
    ) -> Result<PirlsState> {
        let n = x.nrows();
        let p = x.ncols();
        let mut beta = beta0.clone();
        let mut u = u0.clone();

        let eta_of = |beta: &DVector<f64>, u: &DVector<f64>| -> DVector<f64> {
            let mut eta = x * beta;
            for i in 0..n {
                eta[i] += theta * u[groups[i]];
            }
            eta
        };

        let mut eta = eta_of(&beta, &u);
        let mut dev = penalized_deviance(y, &eta, &u);

        for iter in 0..self.opts.max_pirls {
            let mut weights = DVector::<f64>::zeros(n);
            let mut working = DVector::<f64>::zeros(n);
            for i in 0..n {
                let mu = logistic(eta[i]);
                let w = (mu * (1.0 - mu)).max(MU_EPS);
                weights[i] = w;
                working[i] = eta[i] + (y[i] - mu) / w;
            }

            let (a, rhs) = assemble_system(x, groups, q, theta, &weights, Some(&working));
            let chol = a.cholesky().ok_or_else(|| {
                ElkError::convergence(
                    formula.to_string(),
                    "penalized normal equations are not positive definite \
                     (collinear fixed effects?)",
                )
            })?;
            let solution = chol.solve(&rhs);
            let beta_new = solution.rows(0, p).into_owned();
            let u_new = solution.rows(p, q).into_owned();

            // Step-halve toward the previous iterate if the full update
            // increases the penalized deviance.
            let mut accepted = false;
            let mut step = 1.0;
            for _ in 0..MAX_HALVINGS {
                let beta_try = &beta + (&beta_new - &beta) * step;
                let u_try = &u + (&u_new - &u) * step;
                let eta_try = eta_of(&beta_try, &u_try);
                let dev_try = penalized_deviance(y, &eta_try, &u_try);
                // acceptance slack scales with the deviance magnitude so a
                // rounding-level increase at the optimum is not rejected
                if dev_try.is_finite() && dev_try <= dev + self.opts.tol * (dev.abs() + 1.0) {
                    let delta = dev - dev_try;
                    beta = beta_try;
                    u = u_try;
                    eta = eta_try;
                    dev = dev_try;
                    accepted = true;
                    if delta.abs() < self.opts.tol * (dev.abs() + 0.1) {
                        let mut final_weights = DVector::<f64>::zeros(n);
                        for i in 0..n {
                            let mu = logistic(eta[i]);
                            final_weights[i] = (mu * (1.0 - mu)).max(MU_EPS);
                        }
                        return Ok(PirlsState {
                            beta,
                            u,
                            weights: final_weights,
                            penalized_deviance: dev,
                        });
                    }
                    break;
                }
                step *= 0.5;
            }
            if !accepted {
                return Err(ElkError::convergence(
                    formula.to_string(),
                    format!("step-halving failed at PIRLS iteration {iter}"),
                ));
            }
        }

        Err(ElkError::convergence(
            formula.to_string(),
            format!("PIRLS did not converge within {} iterations", self.opts.max_pirls),
        ))
    }
}

/// Assemble the penalized weighted normal equations
/// `[XᵀWX, θXᵀWZ; θZᵀWX, θ²ZᵀWZ + I]` and, when a working response is given,
/// the matching right-hand side. ZᵀWZ is diagonal for a grouped intercept.
fn assemble_system(
    x: &DMatrix<f64>,
    groups: &[usize],
    q: usize,
    theta: f64,
    weights: &DVector<f64>,
    working: Option<&DVector<f64>>,
) -> (DMatrix<f64>, DVector<f64>) {
    let n = x.nrows();
    let p = x.ncols();
    let dim = p + q;
    let mut a = DMatrix::<f64>::zeros(dim, dim);
    let mut rhs = DVector::<f64>::zeros(dim);

    for i in 0..n {
        let g = groups[i];
        let w = weights[i];
        for j in 0..p {
            let xij = x[(i, j)];
            for k in j..p {
                a[(j, k)] += w * xij * x[(i, k)];
            }
            a[(j, p + g)] += theta * w * xij;
        }
        a[(p + g, p + g)] += theta * theta * w;
        if let Some(z) = working {
            let wz = w * z[i];
            for j in 0..p {
                rhs[j] += x[(i, j)] * wz;
            }
            rhs[p + g] += theta * wz;
        }
    }
    // unit penalty on the spherical random effects
    for g in 0..q {
        a[(p + g, p + g)] += 1.0;
    }
    // mirror the upper triangle
    for j in 0..dim {
        for k in (j + 1)..dim {
            a[(k, j)] = a[(j, k)];
        }
    }
    (a, rhs)
}

/// −2·Laplace log-likelihood: penalized deviance plus the log-determinant of
/// the conditional precision, Σ_g log(1 + θ²·w_g).
fn laplace_deviance(state: &PirlsState, groups: &[usize], q: usize, theta: f64) -> f64 {
    let mut group_weight = vec![0.0_f64; q];
    for (i, &g) in groups.iter().enumerate() {
        group_weight[g] += state.weights[i];
    }
    let log_det: f64 = group_weight
        .iter()
        .map(|&w| (1.0 + theta * theta * w).ln())
        .sum();
    state.penalized_deviance + log_det
}

fn penalized_deviance(y: &DVector<f64>, eta: &DVector<f64>, u: &DVector<f64>) -> f64 {
    let mut ll = 0.0;
    for i in 0..y.len() {
        let mu = logistic(eta[i]).clamp(MU_EPS, 1.0 - MU_EPS);
        ll += y[i] * mu.ln() + (1.0 - y[i]) * (1.0 - mu).ln();
    }
    -2.0 * ll + u.dot(u)
}

#[inline]
fn logistic(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// Population variance (divide by n, not n−1), per the latent-variance R²
/// definition.
fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Two-sided p-value from a standard-normal z statistic.
fn two_sided_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    statrs::function::erf::erfc(z.abs() / std::f64::consts::SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::observation::{Observation, Season, WinterSeason};
    use crate::model::formula::Term;
    use approx::assert_abs_diff_eq;

    fn obs_with(id: &str, crossed: u8, traffic_100: f64) -> Observation {
        Observation {
            animal_id: id.to_string(),
            winter: WinterSeason::W2,
            id_winter: Observation::composite_key(id, WinterSeason::W2),
            season: Season::Winter,
            crossed,
            traffic: traffic_100 * 100.0,
            traffic_100,
            n_collared: 2.0,
            collar_prop: 0.5,
            group_size_pred: 5.0,
            elo: 0.0,
            centrality: 0.0,
            familiarity: 0.0,
            stability: 0.0,
            group_elo_max: 0.0,
            group_centrality_max: 0.0,
            group_familiarity_med: 0.0,
            group_stability_med: 0.0,
        }
    }

    /// With a single grouping level the variance component collapses and the
    /// fit reduces to plain logistic regression. The x = {0, ln 2} pattern
    /// has the closed-form MLE β = (0, 1).
    #[test]
    fn reduces_to_logistic_regression_with_one_group() {
        let ln2 = std::f64::consts::LN_2;
        let data = Dataset::new(vec![
            obs_with("a", 1, 0.0),
            obs_with("a", 0, 0.0),
            obs_with("a", 1, ln2),
            obs_with("a", 1, ln2),
            obs_with("a", 0, ln2),
            obs_with("a", 1, 0.0),
            obs_with("a", 0, 0.0),
            obs_with("a", 1, ln2),
            obs_with("a", 1, ln2),
            obs_with("a", 0, ln2),
        ])
        .unwrap();

        let formula = Formula::additive(&[Term::Traffic100]).unwrap();
        let model = GlmmFitter::new(&data).fit(&formula).unwrap();

        assert!(model.is_singular());
        assert_abs_diff_eq!(model.coefficients()[0].estimate, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(model.coefficients()[1].estimate, 1.0, epsilon = 1e-3);
        assert!(model.check_singular().is_err());
    }

    #[test]
    fn repeated_fits_are_deterministic() {
        let ln2 = std::f64::consts::LN_2;
        let mut rows = Vec::new();
        for i in 0..40 {
            let id = if i % 4 == 0 { "a" } else { "b" };
            rows.push(obs_with(id, (i % 3 == 0) as u8, (i % 5) as f64 * ln2));
        }
        let data = Dataset::new(rows).unwrap();
        let formula = Formula::additive(&[Term::Traffic100]).unwrap();

        let fitter = GlmmFitter::new(&data);
        let m1 = fitter.fit(&formula).unwrap();
        let m2 = fitter.fit(&formula).unwrap();
        for (c1, c2) in m1.coefficients().iter().zip(m2.coefficients()) {
            assert_abs_diff_eq!(c1.estimate, c2.estimate, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(m1.aic(), m2.aic(), epsilon = 1e-9);
    }

    #[test]
    fn marginal_r2_never_exceeds_conditional() {
        let ln2 = std::f64::consts::LN_2;
        let mut rows = Vec::new();
        for i in 0..60 {
            let id = ["a", "b", "c"][i % 3];
            rows.push(obs_with(id, (i % 2) as u8, (i % 7) as f64 * ln2));
        }
        let data = Dataset::new(rows).unwrap();
        let formula = Formula::additive(&[Term::Traffic100]).unwrap();
        let model = GlmmFitter::new(&data).fit(&formula).unwrap();
        assert!(model.r2_marginal() <= model.r2_conditional() + 1e-12);
        assert!(model.r2_marginal() >= 0.0);
        assert!(model.r2_conditional() < 1.0);
    }

    #[test]
    fn population_variance_matches_hand_computation() {
        assert_abs_diff_eq!(
            population_variance(&[1.0, 2.0, 3.0, 4.0]),
            1.25,
            epsilon = 1e-12
        );
        assert_eq!(population_variance(&[]), 0.0);
    }

    #[test]
    fn two_sided_p_is_calibrated() {
        assert_abs_diff_eq!(two_sided_p(0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(two_sided_p(1.959964), 0.05, epsilon = 1e-4);
        assert!(two_sided_p(5.0) < 1e-5);
    }
}

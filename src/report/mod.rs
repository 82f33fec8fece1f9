//! # Report Rendering
//!
//! Human-readable text summaries for fitted models and AIC tables. Pure
//! presentation: every number here was computed by the model layer.

use std::fmt::Write as _;

use crate::model::compare::AicTable;
use crate::model::fit::FittedModel;

/// R-style significance codes.
fn signif_code(p: f64) -> &'static str {
    if p.is_nan() {
        return " ";
    }
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else if p < 0.1 {
        "."
    } else {
        " "
    }
}

fn format_p(p: f64) -> String {
    if p.is_nan() {
        "NA".to_string()
    } else if p < 1e-4 {
        format!("{p:.2e}")
    } else {
        format!("{p:.4}")
    }
}

/// Render a full model summary: formula, sample sizes, coefficient table,
/// variance component, information criteria and pseudo-R².
pub fn render_summary(name: &str, model: &FittedModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model: {name}");
    let _ = writeln!(out, "Formula: {}", model.formula());
    let _ = writeln!(
        out,
        "Observations: {}   Groups (id_winter): {}",
        model.n_obs(),
        model.n_groups()
    );
    if model.is_singular() {
        let _ = writeln!(
            out,
            "Warning: singular fit; random-intercept variance is effectively zero"
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Fixed effects:");
    let label_width = model
        .coefficients()
        .iter()
        .map(|c| c.label.len())
        .max()
        .unwrap_or(12)
        .max(12);
    let _ = writeln!(
        out,
        "{:label_width$}  {:>10}  {:>10}  {:>8}  {:>9}",
        "", "Estimate", "Std.Error", "z value", "Pr(>|z|)"
    );
    for c in model.coefficients() {
        let _ = writeln!(
            out,
            "{:label_width$}  {:>10.4}  {:>10.4}  {:>8.3}  {:>9} {}",
            c.label,
            c.estimate,
            c.std_error,
            c.z_value,
            format_p(c.p_value),
            signif_code(c.p_value)
        );
    }
    let _ = writeln!(
        out,
        "Signif. codes: 0 '***' 0.001 '**' 0.01 '*' 0.05 '.' 0.1 ' ' 1"
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Random effects: id_winter (Intercept)  Variance: {:.4}  Std.Dev.: {:.4}",
        model.re_variance(),
        model.re_std_dev()
    );
    let _ = writeln!(
        out,
        "logLik: {:.2}   AIC: {:.2}   (df = {})",
        model.log_likelihood(),
        model.aic(),
        model.df()
    );
    let _ = writeln!(
        out,
        "R2 (marginal): {:.4}   R2 (conditional): {:.4}",
        model.r2_marginal(),
        model.r2_conditional()
    );
    out
}

/// Render a ranked AIC table with ΔAIC and Akaike weights.
pub fn render_aic_table(title: &str, table: &AicTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AIC comparison: {title}");
    let name_width = table
        .rows()
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(10)
        .max(10);
    let _ = writeln!(
        out,
        "{:name_width$}  {:>4}  {:>10}  {:>10}  {:>8}  {:>7}",
        "model", "df", "logLik", "AIC", "dAIC", "weight"
    );
    for row in table.rows() {
        let _ = writeln!(
            out,
            "{:name_width$}  {:>4}  {:>10.2}  {:>10.2}  {:>8.2}  {:>7.3}",
            row.name, row.df, row.log_likelihood, row.aic, row.delta_aic, row.weight
        );
    }
    out
}

//! # Crossing Analysis Pipeline
//!
//! The fixed fit/report/compare sequence of the study. The model set is
//! statically known; no model is chosen adaptively from intermediate
//! results. Fits are independent, so they are dispatched over the rayon
//! pool; output order stays fixed by the analysis design.
//!
//! Failure isolation: a convergence failure in one formula is recorded and
//! reported without aborting the remaining fits. Only the loader aborts the
//! whole run.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{info_span, instrument, warn};

use crate::config::Config;
use crate::error::{ElkError, Result};
use crate::io::load_dataset;
use crate::model::compare::{delta_aic, AicTable};
use crate::model::fit::FittedModel;
use crate::model::formula::{Formula, Term};
use crate::model::glmm::{FitOptions, GlmmFitter};
use crate::report;

/// One named model fit in the analysis sequence.
pub struct ModelStep {
    pub name: &'static str,
    pub formula: Formula,
}

fn step(name: &'static str, terms: &[Term]) -> Result<ModelStep> {
    Ok(ModelStep {
        name,
        formula: Formula::additive(terms)?,
    })
}

/// The study's model set, in reporting order.
///
/// Three question blocks: does traffic volume deter crossing, does group
/// size buffer it, and do social phenotypes (individual and group-level)
/// explain who crosses.
pub fn model_set() -> Result<Vec<ModelStep>> {
    let mut steps = vec![
        step("null", &[])?,
        step("traffic", &[Term::Traffic100])?,
        step("n_collared", &[Term::NCollared])?,
        step("collar_prop", &[Term::CollarProp])?,
        step("group_size", &[Term::GroupSizePred])?,
        step("traffic_n_collared", &[Term::Traffic100, Term::NCollared])?,
        step("traffic_group_size", &[Term::Traffic100, Term::GroupSizePred])?,
    ];
    steps.push(ModelStep {
        name: "traffic_x_group_size",
        formula: Formula::additive(&[Term::Traffic100, Term::GroupSizePred])?
            .with_interaction(Term::Traffic100, Term::GroupSizePred)?,
    });
    steps.extend([
        step("elo", &[Term::Elo])?,
        step("traffic_elo", &[Term::Traffic100, Term::Elo])?,
        step("centrality", &[Term::Centrality])?,
        step("traffic_centrality", &[Term::Traffic100, Term::Centrality])?,
        step("familiarity", &[Term::Familiarity])?,
        step("traffic_familiarity", &[Term::Traffic100, Term::Familiarity])?,
        step("stability", &[Term::Stability])?,
        step("traffic_stability", &[Term::Traffic100, Term::Stability])?,
        step("traffic_group_elo", &[Term::Traffic100, Term::GroupEloMax])?,
        step(
            "traffic_group_centrality",
            &[Term::Traffic100, Term::GroupCentralityMax],
        )?,
        step(
            "traffic_group_familiarity",
            &[Term::Traffic100, Term::GroupFamiliarityMed],
        )?,
        step(
            "traffic_group_stability",
            &[Term::Traffic100, Term::GroupStabilityMed],
        )?,
        step("season_traffic", &[Term::Season, Term::Traffic100])?,
    ]);
    Ok(steps)
}

/// AIC tables produced after the fits, each over a designated member set.
const AIC_TABLES: &[(&str, &[&str])] = &[
    (
        "traffic and group size",
        &[
            "null",
            "traffic",
            "n_collared",
            "collar_prop",
            "group_size",
            "traffic_n_collared",
            "traffic_group_size",
            "traffic_x_group_size",
        ],
    ),
    (
        "individual social phenotypes",
        &[
            "traffic",
            "traffic_elo",
            "traffic_centrality",
            "traffic_familiarity",
            "traffic_stability",
        ],
    ),
    (
        "group-level social phenotypes",
        &[
            "traffic",
            "traffic_group_elo",
            "traffic_group_centrality",
            "traffic_group_familiarity",
            "traffic_group_stability",
        ],
    ),
];

/// Designated pairwise ΔAIC contrasts: (description, a, b) reporting
/// AIC(a) − AIC(b).
const AIC_PAIRS: &[(&str, &str, &str)] = &[
    (
        "interaction vs additive traffic×group size",
        "traffic_x_group_size",
        "traffic_group_size",
    ),
    ("elo: individual vs group", "traffic_elo", "traffic_group_elo"),
    (
        "centrality: individual vs group",
        "traffic_centrality",
        "traffic_group_centrality",
    ),
    (
        "familiarity: individual vs group",
        "traffic_familiarity",
        "traffic_group_familiarity",
    ),
    (
        "stability: individual vs group",
        "traffic_stability",
        "traffic_group_stability",
    ),
    ("season adjustment", "season_traffic", "traffic"),
];

/// Crossing analysis pipeline
pub struct AnalysisPipeline {
    config: Config,
}

impl AnalysisPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full analysis: load, fit every step, print each summary,
    /// then the designated AIC comparisons.
    #[instrument(name = "analysis", skip(self))]
    pub fn run(&self) -> Result<()> {
        let data = load_dataset(&self.config.input)?;
        let opts = FitOptions {
            max_pirls: self.config.max_iter,
            tol: self.config.tol,
            restarts: self.config.restarts,
            seed: self.config.seed.unwrap_or(FitOptions::default().seed),
            ..FitOptions::default()
        };
        let fitter = GlmmFitter::with_options(&data, opts);

        let steps = model_set()?;
        let results: Vec<(&'static str, Result<FittedModel>)> = {
            let _span = info_span!("fit_all", n_models = steps.len()).entered();
            steps
                .par_iter()
                .map(|s| (s.name, fitter.fit(&s.formula)))
                .collect()
        };

        let mut fitted: HashMap<&str, FittedModel> = HashMap::new();
        for (name, result) in results {
            match result {
                Ok(model) => {
                    println!("{}", report::render_summary(name, &model));
                    fitted.insert(name, model);
                }
                Err(err) => {
                    warn!(model = name, %err, "fit failed");
                    println!("Model: {name}\n  fit failed: {err}\n");
                }
            }
        }

        for (title, members) in AIC_TABLES {
            self.print_aic_table(title, members, &fitted);
        }

        println!("Pairwise dAIC contrasts:");
        for (desc, a, b) in AIC_PAIRS {
            match (fitted.get(a), fitted.get(b)) {
                (Some(ma), Some(mb)) => match delta_aic(ma, mb) {
                    Ok(d) => println!("  {desc}: dAIC({a} - {b}) = {d:.2}"),
                    Err(err) => println!("  {desc}: not comparable ({err})"),
                },
                _ => println!("  {desc}: skipped (one or both fits unavailable)"),
            }
        }

        Ok(())
    }

    fn print_aic_table(&self, title: &str, members: &[&str], fitted: &HashMap<&str, FittedModel>) {
        let present: Vec<(&str, &FittedModel)> = members
            .iter()
            .filter_map(|&name| fitted.get(name).map(|m| (name, m)))
            .collect();
        if present.len() < members.len() {
            warn!(title, "AIC table is missing failed fits");
        }
        if present.len() < 2 {
            println!("AIC comparison: {title} skipped (fewer than two fitted models)\n");
            return;
        }
        match AicTable::rank(&present) {
            Ok(table) => println!("{}", report::render_aic_table(title, &table)),
            Err(ElkError::IncomparableModels { message }) => {
                println!("AIC comparison: {title} failed: {message}\n");
            }
            Err(err) => println!("AIC comparison: {title} failed: {err}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_set_has_the_designed_shape() {
        let steps = model_set().unwrap();
        assert_eq!(steps.len(), 21);
        assert_eq!(steps[0].name, "null");
        assert!(steps[0].formula.terms().is_empty());
        let interaction = steps
            .iter()
            .find(|s| s.name == "traffic_x_group_size")
            .unwrap();
        assert!(interaction.formula.interaction().is_some());
    }

    #[test]
    fn every_comparison_member_is_a_known_step() {
        let steps = model_set().unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.name).collect();
        for (_, members) in AIC_TABLES {
            for member in *members {
                assert!(names.contains(member), "unknown member {member}");
            }
        }
        for (_, a, b) in AIC_PAIRS {
            assert!(names.contains(a), "unknown pair member {a}");
            assert!(names.contains(b), "unknown pair member {b}");
        }
    }
}

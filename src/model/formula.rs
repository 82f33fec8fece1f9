//! # Fixed-Effects Formula
//!
//! A formula is an ordered list of additive covariate terms plus at most one
//! pairwise interaction, over the covariate set of the dataset schema. The
//! intercept and the random grouping key (always individual×winter) are
//! implicit.
//!
//! `design_matrix` lowers the formula to a dense n × p matrix: intercept
//! column, one column per continuous term, treatment-coded dummies for the
//! categorical season term (reference level Fall), and an elementwise product
//! column for the interaction.

use std::fmt;

use nalgebra::DMatrix;

use crate::data::observation::{Observation, Season};
use crate::data::Dataset;
use crate::error::{ElkError, Result};

/// A fixed-effects covariate term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Raw hourly traffic volume.
    Traffic,
    /// Traffic volume ÷ 100.
    Traffic100,
    /// Number of collared elk in the group.
    NCollared,
    /// Proportion of deployed collars present.
    CollarProp,
    /// Model-predicted total group size.
    GroupSizePred,
    /// Focal individual dominance (elo-score).
    Elo,
    /// Focal individual social connectedness (scaled eigenvector centrality).
    Centrality,
    /// Focal individual social familiarity (median simple ratio index).
    Familiarity,
    /// Focal individual social stability (median hours since fusion).
    Stability,
    /// Group maximum elo-score.
    GroupEloMax,
    /// Group maximum centrality.
    GroupCentralityMax,
    /// Group median simple ratio index.
    GroupFamiliarityMed,
    /// Group median hours since fusion.
    GroupStabilityMed,
    /// Calendar season, treatment-coded against Fall.
    Season,
}

impl Term {
    /// Column label as it appears in the dataset and in reports.
    pub fn name(self) -> &'static str {
        match self {
            Term::Traffic => "traffic",
            Term::Traffic100 => "traffic_100",
            Term::NCollared => "n_collared",
            Term::CollarProp => "collar_prop",
            Term::GroupSizePred => "group_size_pred",
            Term::Elo => "elo",
            Term::Centrality => "centrality",
            Term::Familiarity => "familiarity",
            Term::Stability => "stability",
            Term::GroupEloMax => "group_elo_max",
            Term::GroupCentralityMax => "group_centrality_max",
            Term::GroupFamiliarityMed => "group_familiarity_med",
            Term::GroupStabilityMed => "group_stability_med",
            Term::Season => "season",
        }
    }

    pub fn is_categorical(self) -> bool {
        matches!(self, Term::Season)
    }

    /// Value of a continuous term for one observation.
    fn value(self, obs: &Observation) -> f64 {
        match self {
            Term::Traffic => obs.traffic,
            Term::Traffic100 => obs.traffic_100,
            Term::NCollared => obs.n_collared,
            Term::CollarProp => obs.collar_prop,
            Term::GroupSizePred => obs.group_size_pred,
            Term::Elo => obs.elo,
            Term::Centrality => obs.centrality,
            Term::Familiarity => obs.familiarity,
            Term::Stability => obs.stability,
            Term::GroupEloMax => obs.group_elo_max,
            Term::GroupCentralityMax => obs.group_centrality_max,
            Term::GroupFamiliarityMed => obs.group_familiarity_med,
            Term::GroupStabilityMed => obs.group_stability_med,
            Term::Season => unreachable!("season is expanded to dummy columns"),
        }
    }
}

/// Fixed-effects specification: additive terms plus at most one pairwise
/// interaction between continuous terms. Intercept and the id_winter random
/// intercept are always included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula {
    terms: Vec<Term>,
    interaction: Option<(Term, Term)>,
}

impl Formula {
    /// Intercept-only (null) model.
    pub fn null() -> Self {
        Self {
            terms: Vec::new(),
            interaction: None,
        }
    }

    /// Additive formula over the given terms. Duplicate terms are rejected.
    pub fn additive(terms: &[Term]) -> Result<Self> {
        for (i, term) in terms.iter().enumerate() {
            if terms[..i].contains(term) {
                return Err(ElkError::config(format!(
                    "duplicate term '{}' in formula",
                    term.name()
                )));
            }
        }
        Ok(Self {
            terms: terms.to_vec(),
            interaction: None,
        })
    }

    /// Add the single pairwise interaction. Both operands must be continuous;
    /// operands missing from the additive terms are appended so that the
    /// interaction is never fit without its main effects.
    pub fn with_interaction(mut self, a: Term, b: Term) -> Result<Self> {
        if a.is_categorical() || b.is_categorical() {
            return Err(ElkError::config(format!(
                "interaction operands must be continuous, got {}:{}",
                a.name(),
                b.name()
            )));
        }
        if a == b {
            return Err(ElkError::config(format!(
                "interaction requires two distinct terms, got {0}:{0}",
                a.name()
            )));
        }
        if self.interaction.is_some() {
            return Err(ElkError::config(
                "a formula carries at most one interaction term",
            ));
        }
        for operand in [a, b] {
            if !self.terms.contains(&operand) {
                self.terms.push(operand);
            }
        }
        self.interaction = Some((a, b));
        Ok(self)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn interaction(&self) -> Option<(Term, Term)> {
        self.interaction
    }

    /// Number of fixed-effect coefficients (including the intercept).
    pub fn n_coefficients(&self) -> usize {
        let mut p = 1; // intercept
        for term in &self.terms {
            p += if term.is_categorical() { 2 } else { 1 };
        }
        if self.interaction.is_some() {
            p += 1;
        }
        p
    }

    /// Build the n × p design matrix and the coefficient labels.
    pub fn design_matrix(&self, data: &Dataset) -> (DMatrix<f64>, Vec<String>) {
        let n = data.n_obs();
        let p = self.n_coefficients();
        let mut x = DMatrix::<f64>::zeros(n, p);
        let mut labels = Vec::with_capacity(p);

        labels.push("(Intercept)".to_string());
        for i in 0..n {
            x[(i, 0)] = 1.0;
        }

        let mut col = 1;
        for &term in &self.terms {
            if term.is_categorical() {
                // treatment coding, Fall is the reference level
                labels.push("season[Winter]".to_string());
                labels.push("season[Spring]".to_string());
                for (i, obs) in data.observations().iter().enumerate() {
                    match obs.season {
                        Season::Fall => {}
                        Season::Winter => x[(i, col)] = 1.0,
                        Season::Spring => x[(i, col + 1)] = 1.0,
                    }
                }
                col += 2;
            } else {
                labels.push(term.name().to_string());
                for (i, obs) in data.observations().iter().enumerate() {
                    x[(i, col)] = term.value(obs);
                }
                col += 1;
            }
        }

        if let Some((a, b)) = self.interaction {
            labels.push(format!("{}:{}", a.name(), b.name()));
            for (i, obs) in data.observations().iter().enumerate() {
                x[(i, col)] = a.value(obs) * b.value(obs);
            }
        }

        (x, labels)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crossed ~ ")?;
        if self.terms.is_empty() {
            write!(f, "1")?;
        } else {
            for (i, term) in self.terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " + ")?;
                }
                write!(f, "{}", term.name())?;
            }
        }
        if let Some((a, b)) = self.interaction {
            write!(f, " + {}:{}", a.name(), b.name())?;
        }
        write!(f, " + (1 | id_winter)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::observation::{Observation, WinterSeason};

    fn tiny_dataset() -> Dataset {
        let mk = |id: &str, season: Season, traffic: f64, group: f64| Observation {
            animal_id: id.to_string(),
            winter: WinterSeason::W2,
            id_winter: Observation::composite_key(id, WinterSeason::W2),
            season,
            crossed: 0,
            traffic,
            traffic_100: traffic / 100.0,
            n_collared: 2.0,
            collar_prop: 0.5,
            group_size_pred: group,
            elo: 0.1,
            centrality: 0.2,
            familiarity: 0.3,
            stability: 4.0,
            group_elo_max: 0.5,
            group_centrality_max: 0.6,
            group_familiarity_med: 0.7,
            group_stability_med: 8.0,
        };
        Dataset::new(vec![
            mk("a", Season::Fall, 100.0, 5.0),
            mk("a", Season::Winter, 200.0, 6.0),
            mk("b", Season::Spring, 300.0, 7.0),
        ])
        .unwrap()
    }

    #[test]
    fn null_formula_is_intercept_only() {
        let data = tiny_dataset();
        let (x, labels) = Formula::null().design_matrix(&data);
        assert_eq!(x.shape(), (3, 1));
        assert_eq!(labels, vec!["(Intercept)"]);
        assert!(x.column(0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn interaction_column_is_elementwise_product() {
        let data = tiny_dataset();
        let formula = Formula::additive(&[Term::Traffic100, Term::GroupSizePred])
            .unwrap()
            .with_interaction(Term::Traffic100, Term::GroupSizePred)
            .unwrap();
        let (x, labels) = formula.design_matrix(&data);
        assert_eq!(x.shape(), (3, 4));
        assert_eq!(labels[3], "traffic_100:group_size_pred");
        for i in 0..3 {
            assert_eq!(x[(i, 3)], x[(i, 1)] * x[(i, 2)]);
        }
    }

    #[test]
    fn interaction_appends_missing_main_effects() {
        let formula = Formula::additive(&[])
            .unwrap()
            .with_interaction(Term::Traffic100, Term::Elo)
            .unwrap();
        assert_eq!(formula.terms(), &[Term::Traffic100, Term::Elo]);
        assert_eq!(formula.n_coefficients(), 4);
    }

    #[test]
    fn season_expands_to_two_dummies() {
        let data = tiny_dataset();
        let formula = Formula::additive(&[Term::Season]).unwrap();
        let (x, labels) = formula.design_matrix(&data);
        assert_eq!(labels, vec!["(Intercept)", "season[Winter]", "season[Spring]"]);
        // rows: Fall, Winter, Spring
        assert_eq!((x[(0, 1)], x[(0, 2)]), (0.0, 0.0));
        assert_eq!((x[(1, 1)], x[(1, 2)]), (1.0, 0.0));
        assert_eq!((x[(2, 1)], x[(2, 2)]), (0.0, 1.0));
    }

    #[test]
    fn categorical_interaction_rejected() {
        let err = Formula::additive(&[Term::Traffic100, Term::Season])
            .unwrap()
            .with_interaction(Term::Traffic100, Term::Season)
            .unwrap_err();
        assert!(err.to_string().contains("continuous"));
    }

    #[test]
    fn duplicate_terms_rejected() {
        assert!(Formula::additive(&[Term::Elo, Term::Elo]).is_err());
    }

    #[test]
    fn display_renders_r_style() {
        let formula = Formula::additive(&[Term::Traffic100, Term::GroupSizePred])
            .unwrap()
            .with_interaction(Term::Traffic100, Term::GroupSizePred)
            .unwrap();
        assert_eq!(
            formula.to_string(),
            "crossed ~ traffic_100 + group_size_pred + traffic_100:group_size_pred + (1 | id_winter)"
        );
        assert_eq!(Formula::null().to_string(), "crossed ~ 1 + (1 | id_winter)");
    }
}

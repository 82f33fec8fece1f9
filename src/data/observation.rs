//! # Observation Schema
//!
//! One row per classified "traveling" hourly step with at least two collared
//! elk together. Columns are produced upstream (HMM step classification,
//! social-network metrics, group-size prediction) and arrive here as static
//! values; this crate only validates and consumes them.

use std::fmt;

use serde::Deserialize;

use crate::error::{ElkError, Result};

/// Calendar season of the step (closed enumeration).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum Season {
    Fall,
    Winter,
    Spring,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Fall => "Fall",
            Season::Winter => "Winter",
            Season::Spring => "Spring",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Fall" => Ok(Season::Fall),
            "Winter" => Ok(Season::Winter),
            "Spring" => Ok(Season::Spring),
            other => Err(ElkError::data_format(format!(
                "unknown season {other:?} (expected Fall, Winter or Spring)"
            ))),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Winter field season during which the step was recorded (closed enumeration).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum WinterSeason {
    #[serde(rename = "w2")]
    W2,
    #[serde(rename = "w3")]
    W3,
}

impl WinterSeason {
    pub fn as_str(self) -> &'static str {
        match self {
            WinterSeason::W2 => "w2",
            WinterSeason::W3 => "w3",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "w2" => Ok(WinterSeason::W2),
            "w3" => Ok(WinterSeason::W3),
            other => Err(ElkError::data_format(format!(
                "unknown winter season {other:?} (expected w2 or w3)"
            ))),
        }
    }
}

impl fmt::Display for WinterSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated hourly travel step.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Focal individual ID.
    pub animal_id: String,
    /// Winter field season label.
    pub winter: WinterSeason,
    /// Composite individual×winter key; the random-effect grouping unit.
    pub id_winter: String,
    /// Calendar season of the step.
    pub season: Season,
    /// Binary highway-crossing outcome.
    pub crossed: u8,
    /// Hourly traffic volume (vehicles/hour).
    pub traffic: f64,
    /// Traffic volume divided by 100.
    pub traffic_100: f64,
    /// Number of collared elk in the group.
    pub n_collared: f64,
    /// Proportion of deployed collars present in the group.
    pub collar_prop: f64,
    /// Model-predicted total group size.
    pub group_size_pred: f64,
    /// Dominance phenotype (elo-score) of the focal individual.
    pub elo: f64,
    /// Social connectedness (scaled eigenvector centrality).
    pub centrality: f64,
    /// Social familiarity (median simple ratio index).
    pub familiarity: f64,
    /// Social stability (median hours since dyadic fusion).
    pub stability: f64,
    /// Maximum elo-score across group members.
    pub group_elo_max: f64,
    /// Maximum scaled eigenvector centrality across group members.
    pub group_centrality_max: f64,
    /// Median simple ratio index across group members.
    pub group_familiarity_med: f64,
    /// Median hours since fusion across group members.
    pub group_stability_med: f64,
}

impl Observation {
    /// Deterministic composite grouping key for an individual and winter.
    pub fn composite_key(animal_id: &str, winter: WinterSeason) -> String {
        format!("{}_{}", animal_id, winter.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_round_trip() {
        for s in [Season::Fall, Season::Winter, Season::Spring] {
            assert_eq!(Season::parse(s.as_str()).unwrap(), s);
        }
        assert!(Season::parse("Summer").is_err());
    }

    #[test]
    fn winter_round_trip() {
        assert_eq!(WinterSeason::parse("w2").unwrap(), WinterSeason::W2);
        assert_eq!(WinterSeason::parse("w3").unwrap(), WinterSeason::W3);
        assert!(WinterSeason::parse("w1").is_err());
    }

    #[test]
    fn composite_key_is_deterministic() {
        assert_eq!(Observation::composite_key("E042", WinterSeason::W2), "E042_w2");
    }
}

//! # CSV Loading
//!
//! Parse the crossing-step CSV into a `Dataset`. Uses the `csv` crate with
//! serde deserialization.
//!
//! Column names are part of the external contract (§ dataset documentation).
//! Two columns are derivable and therefore optional in the file:
//! `traffic_100` (traffic ÷ 100) and `id_winter` (animal_id × winter). When
//! present they are validated against their recomputation so a silently
//! inconsistent file cannot skew the random-effect structure.

use std::path::Path;

use serde::Deserialize;
use tracing::info_span;

use crate::data::observation::{Observation, Season, WinterSeason};
use crate::data::Dataset;
use crate::error::{ElkError, Result};

/// Columns that must be present in the header row.
const REQUIRED_COLUMNS: &[&str] = &[
    "animal_id",
    "winter",
    "season",
    "crossed",
    "traffic",
    "n_collared",
    "collar_prop",
    "group_size_pred",
    "elo",
    "centrality",
    "familiarity",
    "stability",
    "group_elo_max",
    "group_centrality_max",
    "group_familiarity_med",
    "group_stability_med",
];

/// Relative tolerance when checking derivable columns against recomputation.
const DERIVED_TOL: f64 = 1e-6;

/// Raw CSV record prior to validation. Enum-valued and derivable columns are
/// read as plain strings/options so that malformed values produce a
/// `DataFormat` error carrying the line number instead of a generic serde
/// message.
#[derive(Debug, Deserialize)]
struct RawRecord {
    animal_id: String,
    winter: String,
    #[serde(default)]
    id_winter: Option<String>,
    season: String,
    crossed: f64,
    traffic: f64,
    #[serde(default)]
    traffic_100: Option<f64>,
    n_collared: f64,
    collar_prop: f64,
    group_size_pred: f64,
    elo: f64,
    centrality: f64,
    familiarity: f64,
    stability: f64,
    group_elo_max: f64,
    group_centrality_max: f64,
    group_familiarity_med: f64,
    group_stability_med: f64,
}

/// Load and validate the crossing-step dataset.
///
/// Fails with `DataFormat` on a missing required column, an outcome value
/// outside {0,1}, an unknown season label, a non-finite covariate, or a
/// violated schema invariant. The read has no side effects.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let _span = info_span!("load_dataset", path = %path.display()).entered();

    if !path.exists() {
        return Err(ElkError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| ElkError::data_format(format!("cannot open CSV: {e}")))?;

    check_header(&mut reader)?;

    let mut observations = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        // header is line 1, first record is line 2
        let line = i + 2;
        let raw: RawRecord =
            row.map_err(|e| ElkError::data_format(format!("line {line}: {e}")))?;
        observations.push(validate_record(raw, line)?);
    }

    let data = Dataset::new(observations)?;
    tracing::info!(
        n_obs = data.n_obs(),
        n_groups = data.n_groups(),
        "dataset loaded"
    );
    Ok(data)
}

fn check_header(reader: &mut csv::Reader<std::fs::File>) -> Result<()> {
    let headers = reader
        .headers()
        .map_err(|e| ElkError::data_format(format!("cannot read CSV header: {e}")))?;
    let present: Vec<&str> = headers.iter().collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !present.contains(col))
        .collect();
    if !missing.is_empty() {
        return Err(ElkError::data_format(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn validate_record(raw: RawRecord, line: usize) -> Result<Observation> {
    let at = |message: String| ElkError::data_format(format!("line {line}: {message}"));

    let crossed = if raw.crossed == 0.0 {
        0u8
    } else if raw.crossed == 1.0 {
        1u8
    } else {
        return Err(at(format!(
            "outcome 'crossed' must be 0 or 1, got {}",
            raw.crossed
        )));
    };

    let winter = WinterSeason::parse(&raw.winter)
        .map_err(|e| at(e.to_string()))?;
    let season = Season::parse(&raw.season).map_err(|e| at(e.to_string()))?;

    let numeric = [
        ("traffic", raw.traffic),
        ("n_collared", raw.n_collared),
        ("collar_prop", raw.collar_prop),
        ("group_size_pred", raw.group_size_pred),
        ("elo", raw.elo),
        ("centrality", raw.centrality),
        ("familiarity", raw.familiarity),
        ("stability", raw.stability),
        ("group_elo_max", raw.group_elo_max),
        ("group_centrality_max", raw.group_centrality_max),
        ("group_familiarity_med", raw.group_familiarity_med),
        ("group_stability_med", raw.group_stability_med),
    ];
    for (name, value) in numeric {
        if !value.is_finite() {
            return Err(at(format!("column '{name}' is not finite: {value}")));
        }
    }

    if raw.traffic < 0.0 {
        return Err(at(format!("traffic volume must be >= 0, got {}", raw.traffic)));
    }
    if !(0.0..=1.0).contains(&raw.collar_prop) {
        return Err(at(format!(
            "collar_prop must be in [0, 1], got {}",
            raw.collar_prop
        )));
    }
    if raw.group_size_pred < raw.n_collared {
        return Err(at(format!(
            "predicted group size {} is smaller than collared count {}",
            raw.group_size_pred, raw.n_collared
        )));
    }

    let expected_traffic_100 = raw.traffic / 100.0;
    let traffic_100 = match raw.traffic_100 {
        Some(v) => {
            if !v.is_finite() {
                return Err(at(format!("column 'traffic_100' is not finite: {v}")));
            }
            let scale = expected_traffic_100.abs().max(1.0);
            if (v - expected_traffic_100).abs() > DERIVED_TOL * scale {
                return Err(at(format!(
                    "traffic_100 = {v} does not match traffic/100 = {expected_traffic_100}"
                )));
            }
            v
        }
        None => expected_traffic_100,
    };

    let expected_key = Observation::composite_key(&raw.animal_id, winter);
    let id_winter = match raw.id_winter {
        Some(key) => {
            if key != expected_key {
                return Err(at(format!(
                    "id_winter {key:?} does not match animal_id and winter ({expected_key:?})"
                )));
            }
            key
        }
        None => expected_key,
    };

    Ok(Observation {
        animal_id: raw.animal_id,
        winter,
        id_winter,
        season,
        crossed,
        traffic: raw.traffic,
        traffic_100,
        n_collared: raw.n_collared,
        collar_prop: raw.collar_prop,
        group_size_pred: raw.group_size_pred,
        elo: raw.elo,
        centrality: raw.centrality,
        familiarity: raw.familiarity,
        stability: raw.stability,
        group_elo_max: raw.group_elo_max,
        group_centrality_max: raw.group_centrality_max,
        group_familiarity_med: raw.group_familiarity_med,
        group_stability_med: raw.group_stability_med,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "animal_id,winter,season,crossed,traffic,n_collared,collar_prop,\
group_size_pred,elo,centrality,familiarity,stability,group_elo_max,group_centrality_max,\
group_familiarity_med,group_stability_med";

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("create temp file");
        writeln!(file, "{HEADER}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn loads_valid_rows() {
        let file = write_csv(&[
            "e1,w2,Fall,0,250,2,0.4,6.5,0.3,0.7,0.2,30,0.8,0.9,0.15,45",
            "e1,w2,Winter,1,80,3,0.6,7.2,0.3,0.7,0.2,30,0.8,0.9,0.15,45",
            "e2,w3,Spring,0,0,2,0.5,4.0,0.6,0.2,0.4,12,0.7,0.5,0.35,20",
        ]);
        let data = load_dataset(file.path()).unwrap();
        assert_eq!(data.n_obs(), 3);
        assert_eq!(data.n_groups(), 2);
        assert_eq!(data.observations()[0].id_winter, "e1_w2");
        assert!((data.observations()[0].traffic_100 - 2.5).abs() < 1e-12);
    }

    #[test]
    fn missing_column_is_data_format_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "animal_id,winter,season,crossed").unwrap();
        writeln!(file, "e1,w2,Fall,0").unwrap();
        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, ElkError::DataFormat { .. }), "{err}");
        assert!(err.to_string().contains("traffic"));
    }

    #[test]
    fn outcome_outside_01_rejected() {
        let file = write_csv(&["e1,w2,Fall,2,250,2,0.4,6.5,0.3,0.7,0.2,30,0.8,0.9,0.15,45"]);
        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, ElkError::DataFormat { .. }), "{err}");
        assert!(err.to_string().contains("crossed"));
    }

    #[test]
    fn negative_traffic_rejected() {
        let file = write_csv(&["e1,w2,Fall,0,-5,2,0.4,6.5,0.3,0.7,0.2,30,0.8,0.9,0.15,45"]);
        assert!(load_dataset(file.path()).is_err());
    }

    #[test]
    fn group_size_below_collared_count_rejected() {
        let file = write_csv(&["e1,w2,Fall,0,10,4,0.4,3.0,0.3,0.7,0.2,30,0.8,0.9,0.15,45"]);
        let err = load_dataset(file.path()).unwrap_err();
        assert!(err.to_string().contains("group size"));
    }

    #[test]
    fn unknown_season_rejected() {
        let file = write_csv(&["e1,w2,Summer,0,10,2,0.4,6.5,0.3,0.7,0.2,30,0.8,0.9,0.15,45"]);
        let err = load_dataset(file.path()).unwrap_err();
        assert!(err.to_string().contains("Summer"));
    }

    #[test]
    fn missing_file_reported() {
        let err = load_dataset(Path::new("/nonexistent/steps.csv")).unwrap_err();
        assert!(matches!(err, ElkError::FileNotFound { .. }));
    }
}

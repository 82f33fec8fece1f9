//! # Configuration Logic
//!
//! CLI argument parsing and validation via `clap`.
//!
//! ## Example CLI
//! ```bash
//! elkcross steps.csv --nthreads 8 --seed 42
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::error::{ElkError, Result};

/// Binomial GLMM analysis of elk highway-crossing behaviour.
#[derive(Parser, Debug, Clone)]
#[command(name = "elkcross", version, about)]
pub struct Config {
    /// Input CSV of classified hourly travel steps
    pub input: PathBuf,

    /// Number of worker threads (0 = all cores)
    #[arg(long, default_value_t = 0)]
    pub nthreads: usize,

    /// Seed for jittered optimizer restarts
    #[arg(long)]
    pub seed: Option<u64>,

    /// Jittered restart attempts before declaring a convergence failure
    #[arg(long, default_value_t = 3)]
    pub restarts: usize,

    /// Maximum PIRLS iterations per variance-component evaluation
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Relative deviance-change convergence tolerance
    #[arg(long, default_value_t = 1e-10)]
    pub tol: f64,
}

impl Config {
    /// Parse CLI arguments and validate them.
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(ElkError::FileNotFound {
                path: self.input.clone(),
            });
        }
        if self.max_iter == 0 {
            return Err(ElkError::config("--max-iter must be at least 1"));
        }
        if !(self.tol > 0.0 && self.tol < 1.0) {
            return Err(ElkError::config(format!(
                "--tol must be in (0, 1), got {}",
                self.tol
            )));
        }
        if self.restarts > 20 {
            return Err(ElkError::config(format!(
                "--restarts must be at most 20, got {}",
                self.restarts
            )));
        }
        Ok(())
    }

    /// Effective worker-thread count.
    pub fn nthreads(&self) -> usize {
        if self.nthreads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.nthreads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(input: PathBuf) -> Config {
        Config {
            input,
            nthreads: 0,
            seed: None,
            restarts: 3,
            max_iter: 200,
            tol: 1e-10,
        }
    }

    #[test]
    fn missing_input_fails_validation() {
        let config = config_for(PathBuf::from("/nonexistent/steps.csv"));
        assert!(matches!(
            config.validate(),
            Err(ElkError::FileNotFound { .. })
        ));
    }

    #[test]
    fn bad_tolerance_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = config_for(file.path().to_path_buf());
        config.tol = 0.0;
        assert!(config.validate().is_err());
        config.tol = 2.0;
        assert!(config.validate().is_err());
        config.tol = 1e-8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nthreads_zero_means_all_cores() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = config_for(file.path().to_path_buf());
        assert!(config.nthreads() >= 1);
    }
}

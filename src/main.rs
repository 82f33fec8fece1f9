//! # Elkcross: Highway-Crossing GLMM Analysis
//!
//! Fits the study's fixed sequence of binomial mixed-effects logistic
//! regressions to a CSV of classified elk travel steps and prints coefficient
//! summaries, pseudo-R² values and AIC comparisons.
//!
//! ## Usage
//! ```bash
//! elkcross steps.csv
//! elkcross steps.csv --nthreads 8 --seed 42
//! ```

use std::time::Instant;

use elkcross::config::Config;
use elkcross::error::Result;
use elkcross::pipelines::AnalysisPipeline;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let start = Instant::now();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse_and_validate()?;

    let n_threads = config.nthreads();
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
        .ok();

    eprintln!("elkcross v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Input: {:?}", config.input);
    eprintln!("Threads: {}", n_threads);

    let pipeline = AnalysisPipeline::new(config);
    pipeline.run()?;

    let elapsed = start.elapsed();
    eprintln!("Completed in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

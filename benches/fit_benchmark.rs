use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use elkcross::data::{Dataset, Observation, Season, WinterSeason};
use elkcross::model::formula::{Formula, Term};
use elkcross::model::glmm::GlmmFitter;

/// Deterministic synthetic dataset; no RNG so the benchmark input is stable
/// across runs.
fn synthetic_dataset(n_rows: usize, n_groups: usize) -> Dataset {
    let seasons = [Season::Fall, Season::Winter, Season::Spring];
    let rows: Vec<Observation> = (0..n_rows)
        .map(|i| {
            let g = i % n_groups;
            let animal = format!("e{}", g / 2);
            let winter = if g % 2 == 0 {
                WinterSeason::W2
            } else {
                WinterSeason::W3
            };
            let elo = ((i * 37 % 400) as f64 - 200.0) / 100.0;
            let traffic = (i * 13 % 500) as f64;
            Observation {
                id_winter: Observation::composite_key(&animal, winter),
                animal_id: animal,
                winter,
                season: seasons[i % 3],
                crossed: u8::from((i * 7919) % 97 < 30),
                traffic,
                traffic_100: traffic / 100.0,
                n_collared: 2.0 + (i % 4) as f64,
                collar_prop: 0.2 + ((i * 11 % 70) as f64) / 100.0,
                group_size_pred: 6.0 + (i * 17 % 9) as f64,
                elo,
                centrality: ((i * 53 % 100) as f64) / 100.0,
                familiarity: ((i * 29 % 100) as f64) / 100.0,
                stability: 1.0 + (i * 31 % 72) as f64,
                group_elo_max: ((i * 41 % 100) as f64) / 100.0,
                group_centrality_max: ((i * 43 % 100) as f64) / 100.0,
                group_familiarity_med: ((i * 47 % 100) as f64) / 100.0,
                group_stability_med: 1.0 + (i * 59 % 72) as f64,
            }
        })
        .collect();
    Dataset::new(rows).expect("non-empty synthetic dataset")
}

fn bench_single_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("glmm_fit");

    for n_rows in [250, 1000, 4000] {
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", n_rows), &n_rows, |b, &n_rows| {
            let data = synthetic_dataset(n_rows, 10);
            let formula = Formula::additive(&[Term::Traffic100, Term::Elo])
                .expect("valid formula");
            let fitter = GlmmFitter::new(&data);
            b.iter(|| black_box(fitter.fit(black_box(&formula)).expect("fit converges")))
        });
    }

    group.finish();
}

fn bench_interaction_fit(c: &mut Criterion) {
    let data = synthetic_dataset(1000, 10);
    let formula = Formula::additive(&[Term::Traffic100, Term::GroupSizePred])
        .expect("valid formula")
        .with_interaction(Term::Traffic100, Term::GroupSizePred)
        .expect("valid interaction");
    let fitter = GlmmFitter::new(&data);

    c.bench_function("glmm_fit_interaction_1000", |b| {
        b.iter(|| black_box(fitter.fit(black_box(&formula)).expect("fit converges")))
    });
}

criterion_group!(benches, bench_single_fit, bench_interaction_fit);
criterion_main!(benches);

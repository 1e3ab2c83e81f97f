use cohortfit::evaluate::{CurveBuilder, Evaluator, ExactRocBuilder, ScoredOutcome};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn scored_outcomes(size: usize) -> Vec<ScoredOutcome> {
    let mut rng = StdRng::seed_from_u64(0x5EED_0C + size as u64);
    (0..size)
        .map(|_| {
            let actual = rng.gen_bool(0.2);
            let noise: f64 = rng.sample(Standard);
            ScoredOutcome {
                actual,
                // Rounded to three decimals so large inputs carry many ties.
                probability: ((0.7 * noise + if actual { 0.3 } else { 0.0 }) * 1000.0).round()
                    / 1000.0,
            }
        })
        .collect()
}

fn benchmark_roc(c: &mut Criterion) {
    let sizes = [1_000_usize, 10_000, 100_000];
    let inputs: Vec<_> = sizes.iter().map(|&n| (n, scored_outcomes(n))).collect();

    let mut group = c.benchmark_group("roc_curve");
    for (size, scores) in inputs.iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("exact_curve", size), scores, |b, input| {
            b.iter(|| {
                let curve = ExactRocBuilder.build(black_box(input));
                black_box(curve.map(|c| c.auc()).ok());
            });
        });

        group.bench_with_input(BenchmarkId::new("full_evaluation", size), scores, |b, input| {
            let evaluator = Evaluator::new(0.5);
            b.iter(|| {
                let evaluation = evaluator.evaluate(black_box(input));
                black_box(evaluation.ok());
            });
        });
    }
    group.finish();
}

criterion_group!(roc_curve, benchmark_roc);
criterion_main!(roc_curve);

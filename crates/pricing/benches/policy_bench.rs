use criterion::{Criterion, criterion_group, criterion_main};
use pricing::DiscountPolicy;

const POLICY: &str = include_str!("../../../assets/ticket-discounted.json");

fn bench_load(c: &mut Criterion) {
    c.bench_function("pricing/load_policy", |b| {
        b.iter(|| DiscountPolicy::from_json(POLICY).unwrap());
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let policy = DiscountPolicy::from_json(POLICY).unwrap();

    c.bench_function("pricing/evaluate_first_rule", |b| {
        b.iter(|| policy.evaluate(100_000, "Jakarta", true).unwrap());
    });

    c.bench_function("pricing/evaluate_fallthrough", |b| {
        b.iter(|| policy.evaluate(0, "Medan", false).unwrap());
    });
}

criterion_group!(benches, bench_load, bench_evaluate);
criterion_main!(benches);

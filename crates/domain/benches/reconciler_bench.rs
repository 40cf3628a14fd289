use criterion::{Criterion, criterion_group, criterion_main};
use domain::VenueStatusReconciler;
use venue_store::InMemoryVenueStore;

fn bench_sold_out_signal(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let reconciler = VenueStatusReconciler::new(InMemoryVenueStore::new());
    rt.block_on(async {
        reconciler
            .apply_sold_out_signal("Jakarta", true)
            .await
            .unwrap()
    });

    c.bench_function("domain/sold_out_signal_repeat", |b| {
        b.iter(|| {
            rt.block_on(async {
                reconciler
                    .apply_sold_out_signal("Jakarta", true)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_explicit_transfer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let reconciler = VenueStatusReconciler::new(InMemoryVenueStore::new());
    let venues = ["Jakarta", "Bandung", "Surabaya", "Medan"];
    let mut next = 0;

    c.bench_function("domain/explicit_marker_transfer", |b| {
        b.iter(|| {
            let venue = venues[next % venues.len()];
            next += 1;
            rt.block_on(async {
                reconciler
                    .apply_explicit_status(venue, true, true)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_sold_out_signal, bench_explicit_transfer);
criterion_main!(benches);

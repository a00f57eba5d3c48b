//! Benchmarks for whitelist domain lookup.
//!
//! Measures how quickly we can check if a domain bypasses the portal.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use portal::filter::Whitelist;

/// Random lowercase domain with `labels` labels, ending in a dot like parsed names.
fn random_domain(rng: &mut impl Rng, labels: usize) -> String {
    let mut domain = String::new();
    for _ in 0..labels {
        let len = rng.random_range(3..=12);
        for _ in 0..len {
            domain.push(rng.random_range(b'a'..=b'z') as char);
        }
        domain.push('.');
    }
    domain
}

fn bench_matches(c: &mut Criterion) {
    let mut rng = rand::rng();
    let mut entries: Vec<String> = (0..50)
        .map(|_| random_domain(&mut rng, 2).trim_end_matches('.').to_string())
        .collect();
    entries.push("python.quectel.com".to_string());
    let whitelist = Whitelist::new(&entries);

    let mut group = c.benchmark_group("whitelist");
    group.throughput(Throughput::Elements(1));

    // Hit on the last entry, the worst case for an ordered scan
    group.bench_function(BenchmarkId::new("matches", "hit_last"), |b| {
        b.iter(|| whitelist.matches(black_box("docs.python.quectel.com.")))
    });

    // Miss (hijacked)
    group.bench_function(BenchmarkId::new("matches", "miss"), |b| {
        b.iter(|| whitelist.matches(black_box("www.google.com.")))
    });

    // Deep random names
    let deep: Vec<String> = (0..100).map(|_| random_domain(&mut rng, 6)).collect();
    group.bench_function(BenchmarkId::new("matches", "deep_random"), |b| {
        b.iter(|| {
            for domain in &deep {
                black_box(whitelist.matches(domain));
            }
        })
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_matches(&mut criterion);
    criterion.final_summary();
}

//! Canonicalization and hashing performance benchmarks: NFC/blank-node
//! checks, triple sort, and SHA-256 derivation over varying graph sizes.

use std::time::Duration;

use adaptive_term::{canonical, Graph, Iri, Literal, Term, Triple};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn make_graph(size: u32) -> Graph {
    let mut graph = Graph::new();
    for i in 0..size {
        let subject = Term::Iri(Iri::new(format!("https://paperhat.dev/ns/wd#node{i}")));
        let predicate = Iri::new("https://paperhat.dev/ns/wd#strokeWidth");
        let object = Term::Literal(Literal::typed(i.to_string(), Iri::new("http://www.w3.org/2001/XMLSchema#integer")));
        graph.add(Triple::new(subject, predicate, object));
    }
    graph
}

fn bench_canonical_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_bytes");
    for size in [100u32, 1_000, 10_000] {
        let graph = make_graph(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| canonical::canonical_bytes(&graph).unwrap());
        });
    }
    group.finish();
}

fn bench_graph_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_hash");
    for size in [100u32, 1_000, 10_000] {
        let graph = make_graph(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| canonical::graph_hash(&graph).unwrap());
        });
    }
    group.finish();
}

fn bench_scoped_subgraph(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_subgraph");
    for size in [100u32, 1_000, 10_000] {
        let mut graph = make_graph(size);
        let composition = Iri::new("https://paperhat.dev/ns/wd#comp1");
        let owned_by = Iri::new("https://paperhat.dev/ns/wd#ownedBy");
        for i in 0..size {
            graph.add(Triple::new(
                Term::Iri(Iri::new(format!("https://paperhat.dev/ns/wd#node{i}"))),
                owned_by.clone(),
                Term::Iri(composition.clone()),
            ));
        }
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| canonical::scoped_subgraph(&graph, &composition, &owned_by));
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_canonical_bytes, bench_graph_hash, bench_scoped_subgraph
}
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use cptfuse::{collapse, expand, Network, Node};

/// A node with three 4-state parents: 4^3 x 3 = 192 array entries.
fn wide_network() -> Network {
    let mut network = Network::new();
    for parent in ["weather", "light", "surface"] {
        let states: Vec<String> = (1..=4).map(|i| format!("State{i}")).collect();
        network
            .insert(Node::root(parent, states, vec![0.25; 4]))
            .unwrap();
    }
    let len = 4 * 4 * 4 * 3;
    network
        .insert(Node {
            id: "severity".to_string(),
            states: (1..=3).map(|i| format!("State{i}")).collect(),
            parents: vec![
                "weather".to_string(),
                "light".to_string(),
                "surface".to_string(),
            ],
            probabilities: (0..len).map(|i| (i % 10) as f64 / 10.0).collect(),
        })
        .unwrap();
    network
}

fn bench_expand_collapse(c: &mut Criterion) {
    let network = wide_network();
    let node = network.node("severity").unwrap();

    c.bench_function("expand_192", |b| {
        b.iter(|| expand(black_box(node), black_box(&network)).unwrap());
    });

    let rows = expand(node, &network).unwrap();
    c.bench_function("collapse_192", |b| {
        b.iter(|| collapse(black_box(&rows), black_box(node), black_box(&network)).unwrap());
    });

    c.bench_function("roundtrip_192", |b| {
        b.iter(|| {
            let rows = expand(black_box(node), black_box(&network)).unwrap();
            collapse(&rows, node, &network).unwrap()
        });
    });
}

criterion_group!(benches, bench_expand_collapse);
criterion_main!(benches);

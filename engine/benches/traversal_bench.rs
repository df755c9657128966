use criterion::{black_box, criterion_group, criterion_main, Criterion};
use synaptic_memory::graph::traversal::MemoryGraph;
use synaptic_memory::graph::PathQuery;
use synaptic_memory::model::{Concept, MemoryStatus, Relationship, ORIGIN_ID};

/// Origin plus `width` hubs, each fanning out to `fanout` leaves that link to their neighbour.
fn synthetic_graph(width: usize, fanout: usize) -> MemoryGraph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut origin = Concept::new("Nexus", 0);
    origin.id = ORIGIN_ID.to_string();
    origin.status = MemoryStatus::LongTerm;
    nodes.push(origin);
    for h in 0..width {
        let hub_id = format!("hub-{}", h);
        let mut hub = Concept::new(&format!("area {}", h), 0);
        hub.id = hub_id.clone();
        hub.status = MemoryStatus::LongTerm;
        nodes.push(hub);
        let mut rel = Relationship::new(ORIGIN_ID, &hub_id, "KNOWS", 0);
        rel.intrinsic_confidence = 0.5 + (h % 5) as f64 * 0.1;
        edges.push(rel);
        for l in 0..fanout {
            let leaf_id = format!("leaf-{}-{}", h, l);
            let mut leaf = Concept::new(&format!("topic {} of area {}", l, h), 0);
            leaf.id = leaf_id.clone();
            if l % 3 == 0 {
                leaf.status = MemoryStatus::LongTerm;
            }
            nodes.push(leaf);
            edges.push(Relationship::new(&hub_id, &leaf_id, "HAS_TOPIC", 0));
            if l > 0 {
                let prev = format!("leaf-{}-{}", h, l - 1);
                edges.push(Relationship::new(&prev, &leaf_id, "RELATED_TO", 0));
            }
        }
    }
    MemoryGraph::build(nodes, edges)
}

fn bench_weighted_paths(c: &mut Criterion) {
    let graph = synthetic_graph(20, 10);
    let query = |exclude_short_term| PathQuery {
        origin: ORIGIN_ID.to_string(),
        max_depth: 4,
        term: "topic 7".to_string(),
        exclude_short_term,
        limit: 5,
    };
    let casual = query(false);
    c.bench_function("weighted_paths_20x10", |b| b.iter(|| black_box(graph.weighted_paths(black_box(&casual)))));
    let critical = query(true);
    c.bench_function("weighted_paths_20x10_long_term_only", |b| {
        b.iter(|| black_box(graph.weighted_paths(black_box(&critical))))
    });
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_graph_50x20", |b| b.iter(|| black_box(synthetic_graph(50, 20).edge_count())));
}

criterion_group!(benches, bench_weighted_paths, bench_build);
criterion_main!(benches);

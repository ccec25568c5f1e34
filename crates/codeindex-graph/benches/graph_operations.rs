use codeindex_graph::{
    Edge, EdgeKind, Entity, EntityKind, GraphStore, SourceUnit, Span, UnitId,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// One unit with `size` functions, each calling its successor and one
/// external symbol.
fn unit_batch(path: &str, size: usize) -> (SourceUnit, Vec<Entity>, Vec<Edge>) {
    let unit = UnitId::new(path);
    let entities: Vec<Entity> = (0..size)
        .map(|i| {
            Entity::new(
                unit.clone(),
                EntityKind::Function,
                format!("func_{i}"),
                Span::new(i * 100, i * 100 + 90),
            )
        })
        .collect();
    let mut edges = Vec::with_capacity(size * 2);
    for i in 0..size {
        let at = i * 100 + 10;
        let mut call = Edge::new(
            EdgeKind::Calls,
            entities[i].id.clone(),
            format!("func_{}", (i + 1) % size),
            vec![EntityKind::Function],
            Span::new(at, at + 8),
        );
        call.target = Some(entities[(i + 1) % size].id.clone());
        edges.push(call);
        edges.push(Edge::new(
            EdgeKind::Calls,
            entities[i].id.clone(),
            "memcpy",
            vec![EntityKind::Function],
            Span::new(at + 20, at + 26),
        ));
    }
    (SourceUnit::new(unit, path, "c"), entities, edges)
}

fn bench_entity_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_lookup");

    for size in [1000, 10_000, 100_000].iter() {
        let mut store = GraphStore::new();
        let (unit, entities, edges) = unit_batch("big.c", *size);
        let middle = entities[entities.len() / 2].id.clone();
        store.upsert(unit, entities, edges).unwrap();

        group.bench_with_input(BenchmarkId::new("get_entity", size), size, |b, _| {
            b.iter(|| {
                black_box(store.get_entity(&middle).unwrap());
            });
        });
        group.bench_with_input(BenchmarkId::new("find_by_name", size), size, |b, _| {
            b.iter(|| {
                black_box(store.find_by_name("func_7"));
            });
        });
    }

    group.finish();
}

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");

    for size in [100, 1000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("fresh", size), size, |b, &size| {
            b.iter_with_setup(
                || (GraphStore::new(), unit_batch("fresh.c", size)),
                |(mut store, (unit, entities, edges))| {
                    black_box(store.upsert(unit, entities, edges).unwrap());
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("unchanged", size), size, |b, &size| {
            b.iter_with_setup(
                || {
                    let mut store = GraphStore::new();
                    let (unit, entities, edges) = unit_batch("same.c", size);
                    store
                        .upsert(unit.clone(), entities.clone(), edges.clone())
                        .unwrap();
                    (store, (unit, entities, edges))
                },
                |(mut store, (unit, entities, edges))| {
                    black_box(store.upsert(unit, entities, edges).unwrap());
                },
            );
        });
    }

    group.finish();
}

fn bench_remove_and_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_and_reconcile");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("cycle", size), size, |b, &size| {
            b.iter_with_setup(
                || {
                    let mut store = GraphStore::new();
                    let lib = UnitId::new("lib.c");
                    let memcpy = Entity::new(lib.clone(), EntityKind::Function, "memcpy", Span::new(0, 10));
                    store
                        .upsert(SourceUnit::new(lib, "lib.c", "c"), vec![memcpy], vec![])
                        .unwrap();
                    let (unit, entities, edges) = unit_batch("user.c", size);
                    store.upsert(unit, entities, edges).unwrap();
                    store
                },
                |mut store| {
                    let lib = UnitId::new("lib.c");
                    let memcpy = Entity::new(lib.clone(), EntityKind::Function, "memcpy", Span::new(0, 10));
                    store.remove_unit(&lib).unwrap();
                    store
                        .upsert(SourceUnit::new(lib.clone(), "lib.c", "c"), vec![memcpy], vec![])
                        .unwrap();
                    black_box(store.reconcile(&lib).unwrap());
                },
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_entity_lookup, bench_upsert, bench_remove_and_reconcile);
criterion_main!(benches);

//! Benchmarks for full scans and incremental updates

use codeindex::{Indexer, IndexerConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// `files` units, each defining a few functions and calling into the
/// previous unit.
fn generate_corpus(files: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..files {
        let prev = i.saturating_sub(1);
        let source = format!(
            r#"#include "unit_{prev}.h"
#include <string.h>

struct record_{i} {{
    int id;
    char name[32];
}};

static int check_{i}(const struct record_{i} *r) {{
    return r->id > 0;
}}

int process_{i}(struct record_{i} *r) {{
    int (*validate)(const struct record_{i} *) = check_{i};
    memset(r->name, 0, sizeof(r->name));
    return validate(r) + process_{prev}(0);
}}
"#
        );
        fs::write(dir.path().join(format!("unit_{i}.c")), source).unwrap();
        fs::write(
            dir.path().join(format!("unit_{i}.h")),
            format!("int process_{i}(struct record_{i} *r);\n#define UNIT_{i} {i}\n"),
        )
        .unwrap();
    }
    dir
}

fn indexer(root: &Path, config: IndexerConfig) -> Indexer {
    Indexer::for_root(root, config).unwrap()
}

fn benchmark_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(10);

    for size in [20, 100] {
        let corpus = generate_corpus(size);
        group.bench_with_input(BenchmarkId::new("parallel", size), &corpus, |b, corpus| {
            b.iter(|| {
                indexer(corpus.path(), IndexerConfig::default())
                    .scan_root()
                    .unwrap()
            })
        });
        group.bench_with_input(BenchmarkId::new("sequential", size), &corpus, |b, corpus| {
            b.iter(|| {
                indexer(corpus.path(), IndexerConfig::sequential())
                    .scan_root()
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn benchmark_unchanged_rescan(c: &mut Criterion) {
    let corpus = generate_corpus(100);
    let indexer = indexer(corpus.path(), IndexerConfig::default());
    indexer.scan_root().unwrap();

    c.bench_function("unchanged_rescan_100_units", |b| {
        b.iter(|| indexer.scan_root().unwrap())
    });
}

fn benchmark_single_file_change(c: &mut Criterion) {
    let corpus = generate_corpus(100);
    let indexer = indexer(corpus.path(), IndexerConfig::default());
    indexer.scan_root().unwrap();
    let path = corpus.path().join("unit_50.c");
    let original = fs::read_to_string(&path).unwrap();

    let mut flip = false;
    c.bench_function("single_file_change_100_units", |b| {
        b.iter(|| {
            flip = !flip;
            let edited = if flip {
                format!("/* edited */\n{original}")
            } else {
                original.clone()
            };
            fs::write(&path, edited).unwrap();
            indexer.on_file_changed(&path).unwrap()
        })
    });
}

criterion_group!(
    benches,
    benchmark_full_scan,
    benchmark_unchanged_rescan,
    benchmark_single_file_change
);
criterion_main!(benches);

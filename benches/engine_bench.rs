use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fathom::{
    DocumentPayload, Engine, EngineOptions, IndexKind, SearchRequest, UnicodeSegmenter,
};

const WORDS: &[&str] = &[
    "search", "engine", "index", "shard", "token", "ranking", "query", "score", "document",
    "keyword", "posting", "proximity",
];

fn make_content(doc_id: u64) -> String {
    let mut words = Vec::with_capacity(12);
    for i in 0..12 {
        words.push(WORDS[(doc_id as usize + i * 7) % WORDS.len()]);
    }
    words.join(" ")
}

fn build_engine(doc_count: u64, kind: IndexKind) -> Engine {
    let engine: Engine = Engine::new(
        EngineOptions::new(Arc::new(UnicodeSegmenter))
            .with_num_shards(4)
            .with_index_kind(kind),
    )
    .expect("engine construction");
    for doc_id in 0..doc_count {
        engine.index_document(doc_id, DocumentPayload::from_content(make_content(doc_id)));
    }
    engine.flush_index();
    engine
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    for &doc_count in &[1_000u64, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(doc_count),
            &doc_count,
            |b, &doc_count| {
                b.iter(|| {
                    let engine = build_engine(doc_count, IndexKind::Frequencies);
                    black_box(engine.num_documents_indexed());
                    engine.close();
                });
            },
        );
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let engine = build_engine(10_000, IndexKind::Locations);
    let mut group = c.benchmark_group("search");

    group.bench_function("single_token", |b| {
        b.iter(|| black_box(engine.search(&SearchRequest::from_text("search"))));
    });
    group.bench_function("two_tokens", |b| {
        b.iter(|| black_box(engine.search(&SearchRequest::from_text("search engine"))));
    });
    group.bench_function("with_range", |b| {
        let request = SearchRequest::from_tokens(["index"]).with_doc_id_range(1_000, 2_000);
        b.iter(|| black_box(engine.search(&request)));
    });

    group.finish();
    engine.close();
}

criterion_group!(benches, bench_ingest, bench_search);
criterion_main!(benches);

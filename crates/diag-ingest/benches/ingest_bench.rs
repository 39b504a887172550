//! Criterion benchmarks for diag-ingest.
//!
//! ## Benchmark groups
//!
//! 1. **reader** — plist parsing and bundle decoding.
//! 2. **hashing** — identity hashes for a single diagnostic.
//! 3. **pipeline** — full single-bundle ingestion, and a synthetic bundle
//!    with many diagnostics.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/diag-ingest/Cargo.toml
//! # Run only the pipeline group:
//! cargo bench --manifest-path crates/diag-ingest/Cargo.toml -- pipeline
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use diag_ingest::hashing::HashEngine;
use diag_ingest::normalize::normalize;
use diag_ingest::reader::plist::parse_document;
use diag_ingest::{ingest, read_bundle, CheckerTable, IngestConfig, MemorySourceProvider};

const CLANG40: &str = include_str!("../testdata/clang-4.0.plist");
const CLANG36_UNNAMED: &str = include_str!("../testdata/clang-3.6-unnamed.plist");
const TEST_CPP: &str = include_str!("../testdata/test.cpp");
const TEST_H: &str = include_str!("../testdata/test.h");

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sources() -> MemorySourceProvider {
    MemorySourceProvider::new()
        .with_file("test.cpp", TEST_CPP)
        .with_file("./test.h", TEST_H)
}

/// A bundle with `n` distinct dead-store diagnostics spread over one
/// generated source file of `n` functions.
fn synthetic(n: usize) -> (String, String) {
    let mut source = String::new();
    let mut diagnostics = String::new();
    for i in 0..n {
        let decl_line = i * 5 + 1;
        source.push_str(&format!(
            "void f{i}(int a)\n{{\n  int v{i} = a;\n  v{i} = {i};\n}}\n"
        ));
        diagnostics.push_str(&format!(
            "<dict>\
             <key>description</key><string>Value stored to 'v{i}' is never read</string>\
             <key>category</key><string>Dead store</string>\
             <key>type</key><string>Dead assignment</string>\
             <key>issue_context_kind</key><string>function</string>\
             <key>issue_context</key><string>f{i}</string>\
             <key>location</key><dict>\
               <key>line</key><integer>{}</integer>\
               <key>col</key><integer>3</integer>\
               <key>file</key><integer>0</integer>\
             </dict>\
             </dict>",
            decl_line + 3
        ));
    }
    let bundle = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <plist version=\"1.0\"><dict>\
         <key>files</key><array><string>gen.c</string></array>\
         <key>diagnostics</key><array>{diagnostics}</array>\
         </dict></plist>"
    );
    (bundle, source)
}

// ---------------------------------------------------------------------------
// 1. reader
// ---------------------------------------------------------------------------

fn bench_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader");

    group.bench_function("parse_document", |b| {
        b.iter(|| parse_document(black_box(CLANG40.as_bytes())).unwrap());
    });

    group.bench_function("read_bundle", |b| {
        b.iter(|| read_bundle(black_box(CLANG40.as_bytes())).unwrap());
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. hashing
// ---------------------------------------------------------------------------

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");
    let provider = sources();
    let table = CheckerTable::builtin();
    let bundle = read_bundle(CLANG36_UNNAMED.as_bytes()).unwrap();
    let diagnostic = normalize(bundle.diagnostics[0].clone(), &table);
    let path = bundle.files[diagnostic.raw.location.file_index].clone();

    for window in [0usize, 1, 4] {
        let config = IngestConfig {
            context_window: window,
            ..IngestConfig::default()
        };
        let engine = HashEngine::new(&provider, &config);
        group.bench_with_input(BenchmarkId::new("compute", window), &window, |b, _| {
            b.iter(|| engine.compute(black_box(&diagnostic), black_box(&path)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let table = CheckerTable::builtin();
    let config = IngestConfig::default();
    let provider = sources();

    group.bench_function("ingest_clang40", |b| {
        b.iter(|| ingest(black_box(CLANG40.as_bytes()), &table, &provider, &config).unwrap());
    });

    for n in [10usize, 100, 1000] {
        let (bundle, source) = synthetic(n);
        let provider = MemorySourceProvider::new().with_file("gen.c", source);
        group.bench_with_input(BenchmarkId::new("ingest_synthetic", n), &n, |b, _| {
            b.iter(|| ingest(black_box(bundle.as_bytes()), &table, &provider, &config).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_reader, bench_hashing, bench_pipeline);
criterion_main!(benches);

use refpack::indexer::ExtractorRegistry;
use refpack::indexing::JobStatus;
use refpack::storage::Store;
use refpack::symbol::{symbols_namespace, SymbolType};

use crate::helpers::test_harness::{test_config, CALC_PY};
use crate::helpers::{RefusingExtractor, TestHarness};

#[tokio::test]
async fn test_full_index_extracts_symbols_and_usages() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();

    let job = harness.index_all().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.total_files, 1);
    assert_eq!(job.stats.files_processed, 1);
    assert_eq!(job.stats.errors, 0);
    assert_eq!(job.stats.symbols_found, 4);
    assert!(job.finished_at.is_some());

    let add = harness.symbol_named("add").await.unwrap();
    assert_eq!(add.symbol_type, SymbolType::Function);
    assert_eq!((add.start_line, add.end_line), (1, 2));
    assert_eq!(add.usage_count, 2);

    let refs = harness.store.references_from(add.id).await.unwrap();
    let lines: Vec<usize> = refs.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![8, 17]);
    assert!(refs.iter().all(|r| r.to_symbol_id == add.id));

    let total = harness.symbol_named("total").await.unwrap();
    assert_eq!((total.start_line, total.end_line), (13, 14));
    assert_eq!(total.usage_count, 0);
}

#[tokio::test]
async fn test_every_chunk_gets_a_vector() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();

    let counts = harness.store.counts(harness.project.id).await.unwrap();
    assert_eq!(counts.symbols, 4);
    assert_eq!(counts.chunks, 4);
    assert_eq!(counts.embeddings, 4);

    for symbol in harness.symbols().await {
        let meta = harness.store.embedding_metadata(symbol.id).await.unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].namespace, symbols_namespace(harness.project.id));
        assert_eq!(meta[0].dim, 64);

        let chunks = harness.store.chunks_for_symbol(symbol.id).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].embedding_vector_id.as_deref(), Some(meta[0].external_vector_id.as_str()));
    }
}

#[tokio::test]
async fn test_reindex_keeps_symbol_identity() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();

    let mut before: Vec<(String, i64)> = harness.symbols().await.into_iter().map(|s| (s.name, s.id)).collect();
    let counts_before = harness.store.counts(harness.project.id).await.unwrap();

    harness.index_all().await.unwrap();

    let mut after: Vec<(String, i64)> = harness.symbols().await.into_iter().map(|s| (s.name, s.id)).collect();
    let counts_after = harness.store.counts(harness.project.id).await.unwrap();

    before.sort();
    after.sort();
    assert_eq!(before, after);
    assert_eq!(counts_before.symbols, counts_after.symbols);
    assert_eq!(counts_before.chunks, counts_after.chunks);
    assert_eq!(counts_before.references, counts_after.references);
    assert_eq!(counts_before.embeddings, counts_after.embeddings);
}

#[tokio::test]
async fn test_incremental_index_prunes_removed_symbols() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.create_test_file("other.py", "def other():\n    return 1\n").unwrap();
    harness.index_all().await.unwrap();
    let other = harness.symbol_named("other").await.unwrap();

    harness
        .create_test_file("calc.py", "def add(a, b):\n    return a + b\n")
        .unwrap();
    let job = harness.index_files(&["calc.py"]).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.total_files, 1);

    let names: Vec<String> = harness.symbols().await.into_iter().map(|s| s.name).collect();
    assert!(names.contains(&"add".to_string()));
    assert!(!names.contains(&"multiply".to_string()));
    assert!(!names.contains(&"Calculator".to_string()));

    // Files outside the changed set are untouched.
    assert_eq!(harness.symbol_named("other").await.unwrap().id, other.id);

    let counts = harness.store.counts(harness.project.id).await.unwrap();
    assert_eq!(counts.symbols, 2);
    assert_eq!(counts.embeddings, 2);
}

#[tokio::test]
async fn test_deleted_changed_file_drops_its_symbols() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();

    harness.remove_test_file("calc.py").unwrap();
    let job = harness.index_files(&["calc.py"]).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.errors, 0);
    assert!(harness.symbols().await.is_empty());
    let counts = harness.store.counts(harness.project.id).await.unwrap();
    assert_eq!(counts.references, 0);
    assert_eq!(counts.chunks, 0);
}

#[tokio::test]
async fn test_changed_non_code_files_are_ignored() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.create_test_file("README.md", "# calc\n").unwrap();

    let job = harness.index_files(&["README.md", "calc.py", "calc.py"]).await.unwrap();
    assert_eq!(job.stats.total_files, 1);
    assert_eq!(job.stats.files_processed, 1);
}

#[tokio::test]
async fn test_multi_language_project() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .create_test_file("src/lib.rs", "pub fn parse_config(input: &str) -> usize {\n    input.len()\n}\n")
        .unwrap();
    harness
        .create_test_file("server/main.go", "package main\n\nfunc StartServer() error {\n\treturn nil\n}\n")
        .unwrap();
    harness
        .create_test_file(
            "web/app.ts",
            "export function renderPage(title: string): string {\n  return title;\n}\n",
        )
        .unwrap();
    harness
        .create_test_file("node_modules/dep/index.js", "function vendored() {}\n")
        .unwrap();

    let job = harness.index_all().await.unwrap();
    assert_eq!(job.stats.total_files, 3);
    assert_eq!(job.stats.errors, 0);

    let parse = harness.symbol_named("parse_config").await.unwrap();
    assert_eq!(parse.language, "rust");
    let start = harness.symbol_named("StartServer").await.unwrap();
    assert_eq!(start.language, "go");
    assert_eq!((start.start_line, start.end_line), (3, 5));
    let render = harness.symbol_named("renderPage").await.unwrap();
    assert_eq!(render.language, "typescript");
    assert!(harness.symbol_named("vendored").await.is_none());
}

#[tokio::test]
async fn test_rejected_file_is_isolated() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.create_test_file("bad.py", "def broken():\n    return 0\n").unwrap();
    harness.store.reject_writes_for("bad.py").await;

    let job = harness.index_all().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.total_files, 2);
    assert_eq!(job.stats.files_processed, 1);
    assert_eq!(job.stats.errors, 1);
    assert!(harness.symbol_named("add").await.is_some());
    assert!(harness.symbol_named("broken").await.is_none());
}

#[tokio::test]
async fn test_small_batches_cover_every_file() {
    let mut config = test_config();
    config.indexer.batch_size = 1;
    let harness = TestHarness::with_config(config).await.unwrap();
    for name in ["a", "b", "c"] {
        harness
            .create_test_file(&format!("{}.py", name), &format!("def fn_{}():\n    return 1\n", name))
            .unwrap();
    }

    let job = harness.index_all().await.unwrap();
    assert_eq!(job.stats.files_processed, 3);
    assert_eq!(job.stats.symbols_found, 3);
}

#[tokio::test]
async fn test_single_function_project() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("math.py", "def add(a,b):\n    return a+b\n").unwrap();
    harness.index_all().await.unwrap();

    let symbols = harness.symbols().await;
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "add");
    assert_eq!(symbols[0].symbol_type, SymbolType::Function);
    assert_eq!((symbols[0].start_line, symbols[0].end_line), (1, 2));
}

#[tokio::test]
async fn test_changed_path_spelling_does_not_duplicate_symbols() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();

    let mut before: Vec<(String, i64)> = harness.symbols().await.into_iter().map(|s| (s.name, s.id)).collect();
    let counts_before = harness.store.counts(harness.project.id).await.unwrap();

    let job = harness.index_files(&["./calc.py", ".//calc.py"]).await.unwrap();
    assert_eq!(job.stats.total_files, 1);
    assert_eq!(job.stats.errors, 0);

    let symbols = harness.symbols().await;
    assert!(symbols.iter().all(|s| s.file_path == "calc.py"));
    let mut after: Vec<(String, i64)> = symbols.into_iter().map(|s| (s.name, s.id)).collect();
    let counts_after = harness.store.counts(harness.project.id).await.unwrap();

    before.sort();
    after.sort();
    assert_eq!(before, after);
    assert_eq!(counts_before.symbols, counts_after.symbols);
    assert_eq!(counts_before.chunks, counts_after.chunks);
    assert_eq!(counts_before.references, counts_after.references);
}

#[tokio::test]
async fn test_changed_paths_outside_repository_are_ignored() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();

    let job = harness.index_files(&["../calc.py", "calc.py"]).await.unwrap();
    assert_eq!(job.stats.total_files, 1);
    assert_eq!(job.stats.files_processed, 1);
    assert!(harness.symbols().await.iter().all(|s| s.file_path == "calc.py"));
}

#[tokio::test]
async fn test_extraction_failure_is_counted() {
    let mut extractors = ExtractorRegistry::new();
    extractors.register(Box::new(RefusingExtractor { marker: "# broken" }));
    let harness = TestHarness::with_extractors(test_config(), extractors).await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness
        .create_test_file("broken.py", "# broken\ndef lost():\n    return 0\n")
        .unwrap();

    let job = harness.index_all().await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stats.total_files, 2);
    assert_eq!(job.stats.files_processed, 1);
    assert_eq!(job.stats.errors, 1);
    assert!(harness.symbol_named("add").await.is_some());
    assert!(harness.symbol_named("lost").await.is_none());
}

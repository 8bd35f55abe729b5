use refpack::symbol::EnclosingSymbol;

use crate::helpers::test_harness::CALC_PY;
use crate::helpers::TestHarness;

const MULTIPLY_BODY: &str = "def multiply(a, b):\n    result = 0\n    for _ in range(b):\n        result = add(result, a)\n    return result";

async fn indexed() -> TestHarness {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();
    harness
}

#[tokio::test]
async fn test_innermost_stored_symbol_wins() {
    let harness = indexed().await;
    let total = harness.symbol_named("total").await.unwrap();

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "calc.py", Some(14), Some(14), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, EnclosingSymbol::Stored(total));

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "calc.py", Some(12), Some(14), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name(), "Calculator");
}

#[tokio::test]
async fn test_line_range_takes_precedence_over_snippet() {
    let harness = indexed().await;

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "calc.py", Some(1), Some(2), Some(MULTIPLY_BODY))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name(), "add");
}

#[tokio::test]
async fn test_range_outside_any_symbol() {
    let harness = indexed().await;

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "calc.py", Some(17), Some(17), None)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_unindexed_file_resolves_to_parsed_draft() {
    let harness = indexed().await;
    harness
        .create_test_file("fresh.py", "def lonely():\n    return 1\n")
        .unwrap();

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "fresh.py", Some(2), Some(2), None)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(found, EnclosingSymbol::Parsed(_)));
    assert_eq!(found.name(), "lonely");
    assert_eq!(found.id(), None);
}

#[tokio::test]
async fn test_no_range_uses_semantic_search() {
    let harness = indexed().await;

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "calc.py", None, None, Some(MULTIPLY_BODY))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name(), "multiply");
}

#[tokio::test]
async fn test_semantic_search_filters_by_file() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness
        .create_test_file("copy.py", &format!("{}\n", MULTIPLY_BODY))
        .unwrap();
    harness.index_all().await.unwrap();

    let all = harness
        .engine
        .semantic_find_symbols(harness.project.id, MULTIPLY_BODY, None, 10)
        .await
        .unwrap();
    assert!(all.iter().any(|m| m.symbol.file_path == "copy.py"));
    assert!(all.windows(2).all(|w| w[0].similarity >= w[1].similarity));

    let filtered = harness
        .engine
        .semantic_find_symbols(harness.project.id, MULTIPLY_BODY, Some("calc.py"), 2)
        .await
        .unwrap();
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|m| m.symbol.file_path == "calc.py"));
    assert_eq!(filtered[0].symbol.name, "multiply");
}

#[tokio::test]
async fn test_resolve_snippet_prefers_line_range() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();
    let multiply = harness.symbol_named("multiply").await.unwrap();

    let by_range = harness
        .engine
        .resolve_snippet_to_symbol(harness.project.id, "calc.py", MULTIPLY_BODY, Some((2, 2)))
        .await
        .unwrap();
    assert_eq!(by_range, Some(add.id));

    let by_meaning = harness
        .engine
        .resolve_snippet_to_symbol(harness.project.id, "calc.py", MULTIPLY_BODY, None)
        .await
        .unwrap();
    assert_eq!(by_meaning, Some(multiply.id));

    // A range enclosing nothing falls back to the snippet.
    let fallback = harness
        .engine
        .resolve_snippet_to_symbol(harness.project.id, "calc.py", MULTIPLY_BODY, Some((17, 17)))
        .await
        .unwrap();
    assert_eq!(fallback, Some(multiply.id));
}

#[tokio::test]
async fn test_unknown_file_resolves_to_nothing() {
    let harness = indexed().await;

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "missing.py", Some(1), Some(1), None)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_file_path_spelling_is_normalized() {
    let harness = indexed().await;
    let total = harness.symbol_named("total").await.unwrap();

    let found = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "./calc.py", Some(14), Some(14), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), Some(total.id));

    let matches = harness
        .engine
        .semantic_find_symbols(harness.project.id, MULTIPLY_BODY, Some(".//calc.py"), 1)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].symbol.name, "multiply");

    let escaped = harness
        .engine
        .find_enclosing_symbol(harness.project.id, "../calc.py", Some(14), Some(14), None)
        .await
        .unwrap();
    assert!(escaped.is_none());
}

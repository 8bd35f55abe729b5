use refpack::symbol::ReferenceType;

use crate::helpers::test_harness::CALC_PY;
use crate::helpers::TestHarness;

#[tokio::test]
async fn test_references_follow_stored_usages() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();
    let add = harness.symbol_named("add").await.unwrap();

    let entries = harness
        .engine
        .get_symbol_references(add.id, 3, 50)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.depth == 0));
    assert!(entries
        .iter()
        .all(|e| e.reference.reference_type == ReferenceType::Usage));
    assert_eq!(entries[0].symbol.as_ref().map(|s| s.id), Some(add.id));

    let snippets: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.reference.context_snippet.as_deref())
        .collect();
    assert!(snippets.contains(&"result = add(result, a)"));
    assert!(snippets.contains(&"print(add(1, 2), multiply(3, 4))"));
}

#[tokio::test]
async fn test_reference_cap_is_respected() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();
    let add = harness.symbol_named("add").await.unwrap();

    let capped = harness.engine.get_symbol_references(add.id, 3, 1).await.unwrap();
    assert_eq!(capped.len(), 1);

    let none = harness.engine.get_symbol_references(add.id, 3, 0).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_unused_and_unknown_symbols_have_no_references() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();
    let total = harness.symbol_named("total").await.unwrap();

    assert!(harness
        .engine
        .get_symbol_references(total.id, 2, 50)
        .await
        .unwrap()
        .is_empty());
    assert!(harness
        .engine
        .get_symbol_references(9999, 2, 50)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_references_replaced_on_reindex() {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();

    let edited = CALC_PY.replace("print(add(1, 2), multiply(3, 4))", "print(multiply(3, 4))");
    harness.create_test_file("calc.py", &edited).unwrap();
    harness.index_files(&["calc.py"]).await.unwrap();

    let add = harness.symbol_named("add").await.unwrap();
    assert_eq!(add.usage_count, 1);
    let entries = harness.engine.get_symbol_references(add.id, 1, 50).await.unwrap();
    let lines: Vec<usize> = entries.iter().map(|e| e.reference.line).collect();
    assert_eq!(lines, vec![8]);
}

use std::collections::HashMap;

use refpack::config::PackSelection;

use crate::helpers::test_harness::{test_config, CALC_PY};
use crate::helpers::TestHarness;

async fn indexed() -> TestHarness {
    let harness = TestHarness::new().await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();
    harness
}

#[tokio::test]
async fn test_pack_with_room_for_everything() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();

    let pack = harness
        .engine
        .build_reference_pack(add.id, 4000, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(pack.symbol.id, add.id);
    assert_eq!(pack.definition.content, "def add(a, b):\n    return a + b");
    assert_eq!(pack.definition.token_count, 7);
    assert_eq!(pack.references.len(), 2);
    assert!(pack.callers.is_empty());
    assert!(pack.tests.is_empty());
    assert!(pack.historical_fixes.is_empty());
    assert_eq!(pack.token_count, 7 + 21 + 11);
    assert!(pack.reasoning.contains("reference graph traversal order"));
}

#[tokio::test]
async fn test_oversized_reference_is_skipped_not_fatal() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();

    let pack = harness
        .engine
        .build_reference_pack(add.id, 18, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(pack.references.len(), 1);
    assert_eq!(pack.references[0].line, 17);
    assert_eq!(pack.token_count, 18);
    assert!(pack.reasoning.contains("skipped 1 that would exceed it"));
}

#[tokio::test]
async fn test_definition_always_included() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();

    let pack = harness
        .engine
        .build_reference_pack(add.id, 3, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(pack.token_count, 7);
    assert_eq!(pack.reference_count(), 0);
    assert!(pack.reasoning.contains("The definition alone exceeds the budget"));
}

#[tokio::test]
async fn test_token_count_never_exceeds_budget_beyond_definition() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();

    for budget in [0, 7, 10, 18, 27, 28, 38, 39, 100] {
        let pack = harness
            .engine
            .build_reference_pack(add.id, budget, None)
            .await
            .unwrap()
            .unwrap();
        let admitted: usize = pack.all_references().map(|r| r.token_count).sum();
        assert_eq!(pack.token_count, pack.definition.token_count + admitted);
        assert!(pack.token_count <= budget.max(pack.definition.token_count));
    }
}

#[tokio::test]
async fn test_unknown_symbol_has_no_pack() {
    let harness = indexed().await;
    let pack = harness.engine.build_reference_pack(9999, 4000, None).await.unwrap();
    assert!(pack.is_none());
}

#[tokio::test]
async fn test_definition_is_read_live() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();

    let edited = CALC_PY.replace("    return a + b", "    return b + a  # swapped");
    harness.create_test_file("calc.py", &edited).unwrap();

    let pack = harness
        .engine
        .build_reference_pack(add.id, 4000, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pack.definition.content, "def add(a, b):\n    return b + a  # swapped");
}

#[tokio::test]
async fn test_deleted_file_gives_empty_definition() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();
    harness.remove_test_file("calc.py").unwrap();

    let pack = harness
        .engine
        .build_reference_pack(add.id, 4000, None)
        .await
        .unwrap()
        .unwrap();
    assert!(pack.definition.content.is_empty());
    assert_eq!(pack.definition.token_count, 0);
    assert_eq!(pack.reference_count(), 0);
}

#[tokio::test]
async fn test_test_file_references_land_in_tests() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .create_test_file(
            "tests/test_calc.py",
            "def helper():\n    return 1\n\n\ndef test_helper():\n    assert helper() == 1\n",
        )
        .unwrap();
    harness.index_all().await.unwrap();
    let helper = harness.symbol_named("helper").await.unwrap();

    let pack = harness
        .engine
        .build_reference_pack(helper.id, 4000, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pack.tests.len(), 1);
    assert_eq!(pack.tests[0].line, 6);
    assert!(pack.references.is_empty());
}

#[tokio::test]
async fn test_ranked_selection_orders_by_score() {
    let mut config = test_config();
    config.pack.selection = PackSelection::Ranked;
    let harness = TestHarness::with_config(config).await.unwrap();
    harness.create_test_file("calc.py", CALC_PY).unwrap();
    harness.index_all().await.unwrap();
    let add = harness.symbol_named("add").await.unwrap();

    let pack = harness
        .engine
        .build_reference_pack(add.id, 4000, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pack.references.len(), 2);
    assert!(pack.references[0].score >= pack.references[1].score);
    assert!(pack.reasoning.contains("descending ranking score"));
}

#[tokio::test]
async fn test_weight_overrides_change_scores() {
    let harness = indexed().await;
    let add = harness.symbol_named("add").await.unwrap();

    let baseline = harness
        .engine
        .build_reference_pack(add.id, 4000, None)
        .await
        .unwrap()
        .unwrap();

    let params = HashMap::from([
        ("semantic_similarity".to_string(), 0.0),
        ("proximity".to_string(), 0.0),
        ("recency".to_string(), 0.0),
        ("usage".to_string(), 0.0),
    ]);
    let zeroed = harness
        .engine
        .build_reference_pack(add.id, 4000, Some(&params))
        .await
        .unwrap()
        .unwrap();

    assert!(baseline.references.iter().any(|r| r.score > 0.0));
    assert!(zeroed.references.iter().all(|r| r.score == 0.0));
}

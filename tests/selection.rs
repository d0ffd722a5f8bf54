//! Impact analysis and selection-level monotonicity, end to end.

mod common;

use chrono::Utc;
use common::calculator_solution;
use testmap_engine::{
    CancelToken, ChangeKind, ChangeSet, ConfidenceLevel, EngineOptions, FileChange, ImpactEngine,
    MethodId, SelectionConstraints,
};

fn engine_for(fixture: &common::BuiltSolution) -> ImpactEngine {
    ImpactEngine::new(EngineOptions {
        cache_dir: Some(fixture.cache_dir()),
        ..Default::default()
    })
}

fn change_add_and_multiply() -> ChangeSet {
    ChangeSet {
        changes: vec![FileChange {
            path: "CalcApp/Calc.cs".into(),
            kind: ChangeKind::Modified,
            methods: vec!["Add".to_string(), "Multiply".to_string()],
            types: vec![],
            timestamp: Utc::now(),
        }],
    }
}

#[tokio::test]
async fn diff_finds_direct_and_transitive_tests() {
    let fixture = calculator_solution();
    let engine = engine_for(&fixture);

    let impact = engine
        .analyze_diff(fixture.sln(), change_add_and_multiply(), CancelToken::new())
        .await
        .expect("impact");

    assert_eq!(impact.changed_methods.len(), 2);
    let names: Vec<&str> = impact
        .tests
        .iter()
        .map(|t| t.test.simple_name())
        .collect();
    assert!(names.contains(&"Add_TwoPositives_ReturnsSum"));
    assert!(names.contains(&"Scale_ByTwo_Doubles"));

    // Ranked by confidence, descending
    for pair in impact.tests.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
}

#[tokio::test]
async fn selection_levels_are_monotone() {
    let fixture = calculator_solution();
    let engine = engine_for(&fixture);

    let mut sets: Vec<Vec<MethodId>> = Vec::new();
    for level in [
        ConfidenceLevel::Fast,
        ConfidenceLevel::Medium,
        ConfidenceLevel::High,
        ConfidenceLevel::Full,
    ] {
        let selection = engine
            .select_tests(
                fixture.sln(),
                change_add_and_multiply(),
                Some(level),
                SelectionConstraints::default(),
                CancelToken::new(),
            )
            .await
            .expect("selection");
        sets.push(selection.tests.iter().map(|t| t.test.clone()).collect());
    }

    for window in sets.windows(2) {
        let (smaller, larger) = (&window[0], &window[1]);
        assert!(
            smaller.iter().all(|t| larger.contains(t)),
            "each level must contain every test of the level below"
        );
    }
}

#[tokio::test]
async fn deleted_file_impacts_every_method_it_declared() {
    let fixture = calculator_solution();
    let engine = engine_for(&fixture);

    let change_set = ChangeSet {
        changes: vec![FileChange {
            path: "CalcApp/Calc.cs".into(),
            kind: ChangeKind::Deleted,
            methods: vec![],
            types: vec![],
            timestamp: Utc::now(),
        }],
    };
    let impact = engine
        .analyze_diff(fixture.sln(), change_set, CancelToken::new())
        .await
        .expect("impact");

    // Add, Scale, Multiply (and Helper.Unused) all live in Calc.cs
    assert!(impact.changed_methods.len() >= 3);
    assert!(impact
        .tests
        .iter()
        .any(|t| t.test.simple_name() == "Scale_ByTwo_Doubles"));
}

#[tokio::test]
async fn max_count_caps_selection_deterministically() {
    let fixture = calculator_solution();
    let engine = engine_for(&fixture);

    let selection = engine
        .select_tests(
            fixture.sln(),
            change_add_and_multiply(),
            Some(ConfidenceLevel::Full),
            SelectionConstraints {
                max_count: Some(1),
                ..Default::default()
            },
            CancelToken::new(),
        )
        .await
        .expect("selection");

    assert_eq!(selection.tests.len(), 1);
    assert_eq!(
        selection.tests[0].test.simple_name(),
        "Add_TwoPositives_ReturnsSum",
        "the single slot goes to the highest-confidence test"
    );
}

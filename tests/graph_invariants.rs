//! Universal call-graph invariants: transpose, determinism, and
//! incremental/full agreement on the reachable slice.

mod common;

use ahash::AHashSet;
use common::calculator_solution;
use testmap_engine::{
    build_full, CancelToken, GraphOptions, IncrementalBuilder, IncrementalOptions, MethodId,
    TraverseDirection, Workspace,
};

#[test]
fn forward_and_reverse_graphs_are_transposes() {
    let fixture = calculator_solution();
    let workspace = Workspace::initialize(fixture.sln()).expect("workspace");
    let outcome = build_full(&workspace, &GraphOptions::default(), &CancelToken::new())
        .expect("full build");

    outcome.graph.verify_transpose().expect("transpose holds");

    for id in outcome.graph.sorted_ids() {
        for callee in outcome.graph.callees(id) {
            assert!(
                outcome.graph.callers(callee).contains(id),
                "reverse edge missing for {} -> {}",
                id,
                callee
            );
        }
    }
}

#[test]
fn identical_inputs_build_byte_identical_graphs() {
    let fixture = calculator_solution();

    let serialize = || {
        let workspace = Workspace::initialize(fixture.sln()).expect("workspace");
        let outcome =
            build_full(&workspace, &GraphOptions::default(), &CancelToken::new())
                .expect("full build");
        serde_json::to_string(&outcome.graph.to_serializable()).expect("serialize")
    };

    let first = serialize();
    let second = serialize();
    assert_eq!(first, second, "same inputs must serialize identically");
}

#[test]
fn incremental_equals_full_on_the_reachable_slice() {
    let fixture = calculator_solution();
    let workspace = Workspace::initialize(fixture.sln()).expect("workspace");
    let full = build_full(&workspace, &GraphOptions::default(), &CancelToken::new())
        .expect("full build")
        .graph;

    let seed = MethodId::parse("CalcApp.Calc.Scale(int,int)").unwrap();
    for depth in 1..=3 {
        let mut builder = IncrementalBuilder::new(&workspace, CancelToken::new());
        let incremental = builder
            .build(
                std::slice::from_ref(&seed),
                &IncrementalOptions {
                    max_depth: depth,
                    ..Default::default()
                },
            )
            .expect("incremental build");

        let nodes: AHashSet<MethodId> = incremental
            .sorted_ids()
            .into_iter()
            .cloned()
            .collect();
        let induced = full.induced_subgraph(&nodes);

        assert_eq!(
            serde_json::to_string(&incremental.to_serializable()).unwrap(),
            serde_json::to_string(&induced.to_serializable()).unwrap(),
            "incremental (depth {}) must equal the induced slice of full",
            depth
        );
    }
}

#[test]
fn reverse_incremental_finds_the_same_callers_as_full() {
    let fixture = calculator_solution();
    let workspace = Workspace::initialize(fixture.sln()).expect("workspace");
    let full = build_full(&workspace, &GraphOptions::default(), &CancelToken::new())
        .expect("full build")
        .graph;

    let target = MethodId::parse("CalcApp.Calc.Multiply(int,int)").unwrap();
    let mut builder = IncrementalBuilder::new(&workspace, CancelToken::new());
    let subgraph = builder
        .build(
            std::slice::from_ref(&target),
            &IncrementalOptions {
                max_depth: 10,
                direction: TraverseDirection::Reverse,
                ..Default::default()
            },
        )
        .expect("reverse build");

    assert_eq!(
        subgraph.callers(&target),
        full.callers(&target),
        "reverse expansion must agree with the full graph"
    );
}

#[test]
fn coverage_paths_are_valid_forward_paths() {
    use testmap_engine::coverage::{self, CoverageOptions, TestCatalog};

    let fixture = calculator_solution();
    let workspace = Workspace::initialize(fixture.sln()).expect("workspace");
    let graph = build_full(&workspace, &GraphOptions::default(), &CancelToken::new())
        .expect("full build")
        .graph;
    let catalog = TestCatalog::identify(&workspace, &CancelToken::new()).expect("catalog");

    let map = coverage::build_coverage_map(&graph, &catalog, &CoverageOptions::default());
    assert!(!map.entries.is_empty());

    for infos in map.entries.values() {
        for info in infos {
            let path = &info.call_path;
            assert!(catalog.is_test(&path[0]), "path must start at a test");
            assert_eq!(path.last().unwrap(), &info.target, "path must end at the target");
            for hop in path.windows(2) {
                assert!(
                    graph.callees(&hop[0]).contains(&hop[1]),
                    "missing forward edge {} -> {}",
                    hop[0],
                    hop[1]
                );
            }
            assert!(info.confidence >= 0.0 && info.confidence <= 1.0);
        }
    }
}

#[test]
fn method_id_round_trips_through_qualified_name() {
    let fixture = calculator_solution();
    let workspace = Workspace::initialize(fixture.sln()).expect("workspace");
    let graph = build_full(&workspace, &GraphOptions::default(), &CancelToken::new())
        .expect("full build")
        .graph;

    for id in graph.sorted_ids() {
        let rendered = id.qualified_name();
        let parsed = MethodId::parse(&rendered)
            .unwrap_or_else(|| panic!("unparseable id: {}", rendered));
        assert_eq!(&parsed, id);
        assert_eq!(parsed.qualified_name(), rendered);
    }
}

//! Integration tests for the compiled tree lifecycle
//!
//! These tests validate start/stop/free ordering and stage ownership:
//! - every initialized stage is deinitialized exactly once
//! - stop is best effort
//! - free releases every stage instance exactly once

mod common;

use common::builders::{probe, RegistryBuilder};
use common::probes::{Probe, ProbeStats};
use logroute_rs::config::GlobalOptions;
use logroute_rs::pipeline::{
    CompiledTree, ExprFlags, ExprNode, ObjectRegistry, StageHandle, StartError, TreeState,
};

fn src(name: &str) -> ExprNode {
    ExprNode::source_reference(name, None)
}

fn dst(name: &str) -> ExprNode {
    ExprNode::destination_reference(name, None)
}

/// Two rules sharing a source, a filter and a destination.
fn shared_tree() -> (CompiledTree, std::sync::Arc<ProbeStats>) {
    let builder = RegistryBuilder::new().source("s").filter("f").destination("d");
    let stats = builder.stats();
    let tree = builder
        .rule(
            vec![src("s"), ExprNode::filter_reference("f", None), dst("d")],
            ExprFlags::empty(),
        )
        .rule(
            vec![src("s"), ExprNode::filter_reference("f", None), dst("d")],
            ExprFlags::empty(),
        )
        .tree();
    (tree, stats)
}

#[test]
fn test_round_trip_releases_every_stage_once() {
    let (mut tree, stats) = shared_tree();

    tree.start().unwrap();
    // s, f, d and one clone of f.
    assert_eq!(stats.created(), 4);
    assert_eq!(stats.inits(), 4);

    tree.stop().unwrap();
    assert_eq!(stats.deinits(), 4);
    assert_eq!(tree.state(), TreeState::Stopped);

    tree.free();
    assert_eq!(stats.drops(), stats.created());
    assert_eq!(stats.deinits(), 4);
}

#[test]
fn test_free_without_start_does_not_deinit() {
    let (mut tree, stats) = shared_tree();
    tree.compile().unwrap();
    tree.free();

    assert_eq!(stats.inits(), 0);
    assert_eq!(stats.deinits(), 0);
    assert_eq!(stats.drops(), stats.created());
}

#[test]
fn test_free_of_started_tree_deinits_first() {
    let (mut tree, stats) = shared_tree();
    tree.start().unwrap();
    tree.free();

    assert_eq!(stats.deinits(), stats.inits());
    assert_eq!(stats.drops(), stats.created());
}

#[test]
fn test_dropping_started_tree_deinits_stages() {
    let (mut tree, stats) = shared_tree();
    tree.start().unwrap();
    drop(tree);

    assert_eq!(stats.inits(), 4);
    assert_eq!(stats.deinits(), stats.inits());
    assert_eq!(stats.drops(), stats.created());
}

#[test]
fn test_dropping_after_failed_start_deinits_started_stages() {
    let stats = ProbeStats::new();
    let refusing = ExprNode::pipe(
        StageHandle::new(Probe::new("refusing", &stats).failing_init()),
        None,
    );
    let mut registry = ObjectRegistry::new();
    registry
        .register(ExprNode::log(
            vec![probe("a", &stats), probe("b", &stats), refusing],
            ExprFlags::empty(),
            None,
        ))
        .unwrap();
    let mut tree = CompiledTree::new(registry);

    assert!(tree.start().is_err());
    drop(tree);
    assert_eq!(stats.inits(), 2);
    assert_eq!(stats.deinits(), 2);
}

#[test]
fn test_start_twice_initializes_once() {
    let (mut tree, stats) = shared_tree();
    tree.start().unwrap();
    tree.start().unwrap();
    assert_eq!(stats.inits(), 4);
    tree.free();
}

#[test]
fn test_stop_continues_after_failure() {
    let stats = ProbeStats::new();
    let failing = ExprNode::pipe(
        StageHandle::new(Probe::new("flaky", &stats).failing_deinit()),
        None,
    );
    let mut registry = ObjectRegistry::new();
    registry
        .register(ExprNode::log(
            vec![probe("a", &stats), failing, probe("b", &stats)],
            ExprFlags::empty(),
            None,
        ))
        .unwrap();
    let mut tree = CompiledTree::new(registry);

    tree.start().unwrap();
    let err = tree.stop().unwrap_err();

    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].stage, "flaky");
    assert_eq!(stats.deinits(), 3);

    // Already stopped: nothing left to deinitialize.
    tree.free();
    assert_eq!(stats.deinits(), 3);
}

#[test]
fn test_init_failure_leaves_earlier_stages_for_free() {
    let stats = ProbeStats::new();
    let refusing = ExprNode::pipe(
        StageHandle::new(Probe::new("refusing", &stats).failing_init()),
        None,
    );
    let mut registry = ObjectRegistry::new();
    registry
        .register(ExprNode::log(
            vec![probe("a", &stats), refusing, probe("b", &stats)],
            ExprFlags::empty(),
            None,
        ))
        .unwrap();
    let mut tree = CompiledTree::new(registry);

    let err = tree.start().unwrap_err();
    assert!(matches!(err, StartError::Init { ref stage, .. } if stage == "refusing"));
    assert_eq!(stats.inits(), 1);

    tree.free();
    assert_eq!(stats.deinits(), 1);
    assert_eq!(stats.drops(), stats.created());
}

#[test]
fn test_options_reach_every_stage() {
    let stats = ProbeStats::new();
    let mut registry = ObjectRegistry::new();
    registry
        .register(ExprNode::log(
            vec![probe("a", &stats)],
            ExprFlags::empty(),
            None,
        ))
        .unwrap();
    let options = GlobalOptions {
        flush_lines: 7,
        ..GlobalOptions::default()
    };
    let mut tree = CompiledTree::with_parts(registry, Default::default(), options);

    tree.start().unwrap();
    assert_eq!(stats.last_flush_lines(), 7);
    tree.free();
}

#[test]
fn test_failed_compile_is_freed_cleanly() {
    let builder = RegistryBuilder::new().source("s");
    let stats = builder.stats();
    let mut tree = builder
        .rule(vec![src("s"), dst("missing")], ExprFlags::empty())
        .tree();

    assert!(tree.start().is_err());
    assert_eq!(tree.state(), TreeState::Failed);
    // The source was placed before the failure.
    assert!(!tree.graph().is_empty());

    tree.free();
    assert_eq!(stats.inits(), 0);
    assert_eq!(stats.drops(), stats.created());
}

//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod probes;

use logroute_rs::pipeline::{SlotRole, StageGraph};

/// Labels of every stage, in creation order
pub fn labels(graph: &StageGraph) -> Vec<String> {
    graph.iter().map(|(_, slot)| slot.handle.label()).collect()
}

/// Number of slots with the given role
pub fn count_role(graph: &StageGraph, role: SlotRole) -> usize {
    graph.iter().filter(|(_, slot)| slot.role == role).count()
}

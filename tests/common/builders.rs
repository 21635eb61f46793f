//! Builders for statement trees made of probe stages

use super::probes::{Probe, ProbeStats};
use logroute_rs::pipeline::{
    Capabilities, CompiledTree, ExprFlags, ExprNode, ObjectRegistry, StageHandle,
};
use std::sync::Arc;

/// A `Single` node wrapping a plain, cloneable probe
pub fn probe(label: &str, stats: &Arc<ProbeStats>) -> ExprNode {
    ExprNode::pipe(StageHandle::new(Probe::new(label, stats)), None)
}

/// A `Single` node wrapping a probe with extra capabilities
pub fn probe_with(label: &str, capabilities: Capabilities, stats: &Arc<ProbeStats>) -> ExprNode {
    ExprNode::pipe(
        StageHandle::new(Probe::new(label, stats).with_capabilities(capabilities)),
        None,
    )
}

/// Builder for an object registry of probe-backed named objects
pub struct RegistryBuilder {
    registry: ObjectRegistry,
    stats: Arc<ProbeStats>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ObjectRegistry::new(),
            stats: ProbeStats::new(),
        }
    }

    pub fn stats(&self) -> Arc<ProbeStats> {
        Arc::clone(&self.stats)
    }

    /// Register any statement
    pub fn object(mut self, node: ExprNode) -> Self {
        self.registry
            .register(node)
            .expect("test objects have unique names");
        self
    }

    /// A named source made of one source probe labelled after it
    pub fn source(self, name: &str) -> Self {
        let stage = ExprNode::pipe(StageHandle::new(Probe::source(name, &self.stats)), None);
        self.object(ExprNode::source(name, vec![stage], None))
    }

    /// A named destination made of one probe labelled after it
    pub fn destination(self, name: &str) -> Self {
        let stage = probe(name, &self.stats);
        self.object(ExprNode::destination(name, vec![stage], None))
    }

    pub fn filter(self, name: &str) -> Self {
        let stage = probe(name, &self.stats);
        self.object(ExprNode::filter(name, vec![stage], None))
    }

    pub fn rule(self, children: Vec<ExprNode>, flags: ExprFlags) -> Self {
        self.object(ExprNode::log(children, flags, None))
    }

    pub fn build(self) -> ObjectRegistry {
        self.registry
    }

    pub fn tree(self) -> CompiledTree {
        CompiledTree::new(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builder() {
        let registry = RegistryBuilder::new()
            .source("s")
            .destination("d")
            .rule(
                vec![
                    ExprNode::source_reference("s", None),
                    ExprNode::destination_reference("d", None),
                ],
                ExprFlags::empty(),
            )
            .build();

        assert_eq!(registry.objects().len(), 2);
        assert_eq!(registry.rules().len(), 1);
    }
}

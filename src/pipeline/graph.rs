//! The compiled stage graph.
//!
//! `StageGraph` is an arena: `slots` is the only list holding strong
//! references to stage instances, in creation order. Links between stages
//! (`next` successors and multiplexer `hops`) are `StageId` indices into the
//! same arena, so the graph can never hold a dangling or owning edge.

use crate::pipeline::expr::Content;
use crate::pipeline::id::StageId;
use crate::pipeline::snapshot::GraphSnapshot;
use crate::pipeline::stage::{Capabilities, StageHandle};
use crate::pipeline::stages::{Multiplexer, PassThrough};
use serde::Serialize;

/// Why a slot exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRole {
    /// The declared instance of a `Single` node, used in place.
    Declared,
    /// A clone of a declared instance for a second use point.
    Cloned,
    /// Fan-out junction created by the compiler.
    Multiplexer,
    /// Fan-in point where several branch tails meet.
    Join,
    /// One consumer branch hanging off a shared source multiplexer.
    Attach,
}

/// Statement a stage was compiled from, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOrigin {
    pub content: Content,
    pub name: Option<String>,
    pub location: String,
}

/// A slot holding one stage instance and its outgoing links.
#[derive(Debug)]
pub struct StageSlot {
    pub handle: StageHandle,
    pub role: SlotRole,
    pub capabilities: Capabilities,
    pub next: Option<StageId>,
    /// Downstream hops. Only multiplexers have any.
    pub hops: Vec<StageId>,
    pub origin: Option<StageOrigin>,
    /// Whether `init` succeeded and `deinit` has not run yet.
    pub initialized: bool,
}

/// Arena of every stage instance created while compiling a tree.
#[derive(Debug, Default)]
pub struct StageGraph {
    slots: Vec<StageSlot>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a stage. Its declared capabilities seed the slot.
    pub fn add(
        &mut self,
        handle: StageHandle,
        role: SlotRole,
        origin: Option<StageOrigin>,
    ) -> StageId {
        let id = StageId(self.slots.len() as u32);
        let capabilities = handle.capabilities();
        tracing::debug!(%id, ?role, label = %handle.label(), "Stage added");
        self.slots.push(StageSlot {
            handle,
            role,
            capabilities,
            next: None,
            hops: Vec::new(),
            origin,
            initialized: false,
        });
        id
    }

    pub fn add_multiplexer(&mut self) -> StageId {
        self.add(
            StageHandle::new(Multiplexer::new()),
            SlotRole::Multiplexer,
            None,
        )
    }

    /// A forwarding-only stage: a join point or an attach point.
    pub fn add_pass_through(&mut self, role: SlotRole) -> StageId {
        debug_assert!(matches!(role, SlotRole::Join | SlotRole::Attach));
        self.add(StageHandle::new(PassThrough::new()), role, None)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: StageId) -> Option<&StageSlot> {
        self.slots.get(id.index())
    }

    pub fn slot(&self, id: StageId) -> &StageSlot {
        &self.slots[id.index()]
    }

    pub(crate) fn slot_mut(&mut self, id: StageId) -> &mut StageSlot {
        &mut self.slots[id.index()]
    }

    /// Slots in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (StageId, &StageSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (StageId(idx as u32), slot))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (StageId, &mut StageSlot)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(idx, slot)| (StageId(idx as u32), slot))
    }

    pub fn next(&self, id: StageId) -> Option<StageId> {
        self.slot(id).next
    }

    pub fn hops(&self, id: StageId) -> &[StageId] {
        &self.slot(id).hops
    }

    pub fn role(&self, id: StageId) -> SlotRole {
        self.slot(id).role
    }

    pub fn capabilities(&self, id: StageId) -> Capabilities {
        self.slot(id).capabilities
    }

    pub fn insert_capabilities(&mut self, id: StageId, caps: Capabilities) {
        self.slot_mut(id).capabilities.insert(caps);
    }

    /// Set `to` as the successor of `from`.
    ///
    /// Fails with the existing successor if `from` is already linked.
    pub fn try_link(&mut self, from: StageId, to: StageId) -> Result<(), StageId> {
        let slot = self.slot_mut(from);
        match slot.next {
            Some(existing) => Err(existing),
            None => {
                slot.next = Some(to);
                Ok(())
            }
        }
    }

    /// Add a downstream hop to a multiplexer.
    pub fn add_hop(&mut self, multiplexer: StageId, hop: StageId) {
        debug_assert_eq!(self.role(multiplexer), SlotRole::Multiplexer);
        self.slot_mut(multiplexer).hops.push(hop);
    }

    /// Follow `next` links from `id` to the last stage of the chain.
    pub fn terminal(&self, id: StageId) -> StageId {
        let mut current = id;
        while let Some(next) = self.next(current) {
            current = next;
        }
        current
    }

    /// Edges as `(from, to)` pairs: successors first, then hops.
    pub fn edges(&self) -> impl Iterator<Item = (StageId, StageId)> + '_ {
        let next = self
            .iter()
            .filter_map(|(id, slot)| slot.next.map(|to| (id, to)));
        let hops = self
            .iter()
            .flat_map(|(id, slot)| slot.hops.iter().map(move |&to| (id, to)));
        next.chain(hops)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(self)
    }

    /// Release every stage. Handles still held elsewhere stay alive.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_seeds_capabilities() {
        let mut graph = StageGraph::new();
        let mpx = graph.add_multiplexer();
        let join = graph.add_pass_through(SlotRole::Join);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.role(mpx), SlotRole::Multiplexer);
        assert_eq!(graph.role(join), SlotRole::Join);
        assert!(graph.capabilities(join).is_empty());
    }

    #[test]
    fn test_try_link_refuses_second_successor() {
        let mut graph = StageGraph::new();
        let a = graph.add_pass_through(SlotRole::Join);
        let b = graph.add_pass_through(SlotRole::Join);
        let c = graph.add_pass_through(SlotRole::Join);

        assert_eq!(graph.try_link(a, b), Ok(()));
        assert_eq!(graph.try_link(a, c), Err(b));
        assert_eq!(graph.next(a), Some(b));
    }

    #[test]
    fn test_terminal_walks_chain() {
        let mut graph = StageGraph::new();
        let a = graph.add_pass_through(SlotRole::Join);
        let b = graph.add_pass_through(SlotRole::Join);
        let c = graph.add_pass_through(SlotRole::Join);
        graph.try_link(a, b).unwrap();
        graph.try_link(b, c).unwrap();

        assert_eq!(graph.terminal(a), c);
        assert_eq!(graph.terminal(c), c);
    }

    #[test]
    fn test_edges_include_hops() {
        let mut graph = StageGraph::new();
        let mpx = graph.add_multiplexer();
        let x = graph.add_pass_through(SlotRole::Attach);
        let y = graph.add_pass_through(SlotRole::Attach);
        let tail = graph.add_pass_through(SlotRole::Join);
        graph.add_hop(mpx, x);
        graph.add_hop(mpx, y);
        graph.try_link(mpx, tail).unwrap();

        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges, vec![(mpx, tail), (mpx, x), (mpx, y)]);
    }
}

//! Expression-tree to stage-graph compiler.
//!
//! Each node compiles to a [`Fragment`]: the head stage where messages enter
//! and the tail stage where they leave. A fragment without a head is rooted
//! in a source; a fragment without a tail ends in a destination fan-out.
//!
//! ```text
//! log { source(s); filter(f); destination(d); }
//!
//! [s] ──► [mpx] ══► [attach] ──► [f] ──► [mpx'] ══► [d]
//!          shared     per use      clone   per use    shared
//! ```
//!
//! `──►` is a `next` link, `══►` a multiplexer hop.

use crate::pipeline::error::{CompileError, CompileResult, NodeDescriptor};
use crate::pipeline::expr::{Content, ExprFlags, ExprNode, Layout, SourceLocation, UNKNOWN_LOCATION};
use crate::pipeline::graph::{SlotRole, StageGraph, StageOrigin};
use crate::pipeline::id::StageId;
use crate::pipeline::registry::ObjectTable;
use crate::pipeline::stage::Capabilities;

/// Entry and exit stage of a compiled subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fragment {
    pub head: Option<StageId>,
    pub tail: Option<StageId>,
}

impl Fragment {
    pub fn new(head: Option<StageId>, tail: Option<StageId>) -> Self {
        Self { head, tail }
    }

    /// Rooted in a source: nothing can be linked in front of it.
    pub fn is_source_rooted(&self) -> bool {
        self.head.is_none() && self.tail.is_some()
    }
}

/// Compiles rules against a table of named objects into a [`StageGraph`].
///
/// The compiler is single-threaded and borrows both the table and the graph
/// for one compilation run.
pub struct GraphCompiler<'a> {
    objects: &'a ObjectTable,
    graph: &'a mut StageGraph,
    /// Locations of the nodes being compiled, outermost first.
    scope: Vec<Option<SourceLocation>>,
}

impl<'a> GraphCompiler<'a> {
    pub fn new(objects: &'a ObjectTable, graph: &'a mut StageGraph) -> Self {
        Self {
            objects,
            graph,
            scope: Vec::new(),
        }
    }

    /// Compile one top-level rule.
    ///
    /// A `catch-all` rule first gets a reference to every registered source
    /// prepended, in registration order; the flag is cleared afterwards so
    /// the expansion never runs twice.
    pub fn compile_rule(&mut self, rule: &mut ExprNode) -> CompileResult<Fragment> {
        if rule.flags().contains(ExprFlags::CATCH_ALL) {
            let sources: Vec<ExprNode> = self
                .objects
                .source_names()
                .iter()
                .map(|name| ExprNode::source_reference(name, None))
                .collect();
            tracing::debug!(
                sources = sources.len(),
                location = %rule.format_location(),
                "Expanding catch-all rule"
            );
            rule.prepend_children(sources);
            rule.remove_flags(ExprFlags::CATCH_ALL);
        }

        self.compile_node(rule, false)
    }

    /// Compile any node. `flow_controlled_parent` is set when an enclosing
    /// statement carries the flow-control flag.
    pub fn compile_node(
        &mut self,
        node: &ExprNode,
        flow_controlled_parent: bool,
    ) -> CompileResult<Fragment> {
        tracing::trace!(
            "{:indent$}Compiling {} {} [{}]",
            "",
            node.name().unwrap_or("#unnamed"),
            node.layout(),
            node.content(),
            indent = self.scope.len() * 2,
        );

        self.scope.push(node.location().cloned());
        let result = match node.layout() {
            Layout::Single => self.compile_single(node),
            Layout::Reference => self.compile_reference(node, flow_controlled_parent),
            Layout::Sequence => self.compile_sequence(node, flow_controlled_parent),
            Layout::Junction => self.compile_junction(node, flow_controlled_parent),
        };
        self.scope.pop();
        result
    }

    fn compile_single(&mut self, node: &ExprNode) -> CompileResult<Fragment> {
        let Some(declared) = node.embedded_stage() else {
            return Err(CompileError::MissingStage {
                node: self.describe(node),
            });
        };

        // The declared instance is used at its first use point only.
        let (handle, role) = if !declared.mark_inlined() {
            (declared.clone(), SlotRole::Declared)
        } else {
            let clone = declared
                .try_clone()
                .ok_or_else(|| CompileError::CloneRefused {
                    node: self.describe(node),
                })?;
            clone.mark_inlined();
            (clone, SlotRole::Cloned)
        };

        let origin = self.origin(node);
        let id = self.graph.add(handle, role, Some(origin));
        let head = if self.graph.capabilities(id).contains(Capabilities::IS_SOURCE) {
            None
        } else {
            Some(id)
        };
        Ok(Fragment::new(head, Some(id)))
    }

    fn compile_reference(
        &mut self,
        node: &ExprNode,
        flow_controlled_parent: bool,
    ) -> CompileResult<Fragment> {
        let objects = self.objects;
        let name = node.name().unwrap_or_default();
        let target = match node.bound_target() {
            Some(target) => target,
            None => objects.resolve(node.content(), name).ok_or_else(|| {
                CompileError::UnresolvedReference {
                    kind: node.content(),
                    name: name.to_string(),
                    location: self.locate(node),
                }
            })?,
        };

        match target.content() {
            Content::Source => {
                let tail = match target.aux() {
                    Some(tail) => tail,
                    None => {
                        let fragment = self.compile_node(target, flow_controlled_parent)?;
                        let tail = fragment.tail.ok_or_else(|| self.empty_object(node))?;
                        target.set_aux(tail);
                        tail
                    }
                };

                let multiplexer = match self.graph.next(tail) {
                    None => {
                        let multiplexer = self.graph.add_multiplexer();
                        self.link(tail, multiplexer, node)?;
                        multiplexer
                    }
                    Some(next) if self.graph.role(next) == SlotRole::Multiplexer => next,
                    Some(next) => {
                        return Err(CompileError::Inconsistent {
                            node: self.describe(node),
                            detail: format!(
                                "source tail {tail} feeds {next}, which is not a multiplexer"
                            ),
                        });
                    }
                };

                let attach = self.graph.add_pass_through(SlotRole::Attach);
                self.graph.add_hop(multiplexer, attach);
                Ok(Fragment::new(None, Some(attach)))
            }
            Content::Destination => {
                let head = match target.aux() {
                    Some(head) => head,
                    None => {
                        let fragment = self.compile_node(target, flow_controlled_parent)?;
                        let head = fragment.head.ok_or_else(|| self.empty_object(node))?;
                        target.set_aux(head);
                        head
                    }
                };

                let multiplexer = self.graph.add_multiplexer();
                self.graph.add_hop(multiplexer, head);
                Ok(Fragment::new(Some(multiplexer), None))
            }
            _ => self.compile_node(target, flow_controlled_parent),
        }
    }

    fn compile_sequence(
        &mut self,
        node: &ExprNode,
        flow_controlled_parent: bool,
    ) -> CompileResult<Fragment> {
        if node.flags().contains(ExprFlags::CATCH_ALL) {
            return Err(CompileError::CatchAllOnNonTopLevel {
                node: self.describe(node),
            });
        }

        let mut first: Option<StageId> = None;
        let mut last: Option<StageId> = None;
        let mut source_join: Option<StageId> = None;
        let mut seen_non_source = false;
        let mut changes_message = false;
        let mut flow_controlled_child = false;

        for child in node.children() {
            let child_flow_control =
                flow_controlled_parent || child.flags().contains(ExprFlags::FLOW_CONTROL);
            let fragment = self.compile_node(child, child_flow_control)?;

            match fragment {
                Fragment {
                    head: Some(head),
                    tail,
                } => {
                    let caps = self.graph.capabilities(head);
                    changes_message |= caps.contains(Capabilities::CHANGES_MESSAGE);
                    flow_controlled_child |= caps.contains(Capabilities::HARD_FLOW_CONTROL);

                    match last {
                        Some(prev) => self.link(prev, head, child)?,
                        None => first = Some(head),
                    }
                    last = Some(tail.unwrap_or_else(|| self.graph.terminal(head)));
                    seen_non_source = true;
                }
                Fragment {
                    head: None,
                    tail: Some(tail),
                } => {
                    if seen_non_source {
                        return Err(CompileError::SourceMustBeFirst {
                            node: self.describe(child),
                        });
                    }
                    let join = match source_join {
                        Some(join) => join,
                        None => {
                            let join = self.graph.add_pass_through(SlotRole::Join);
                            source_join = Some(join);
                            last = Some(join);
                            join
                        }
                    };
                    self.link(tail, join, child)?;
                }
                Fragment {
                    head: None,
                    tail: None,
                } => {}
            }
        }

        if let Some(head) = first {
            let mut caps = Capabilities::empty();
            if node.flags().contains(ExprFlags::FALLBACK) {
                caps |= Capabilities::BRANCH_FALLBACK;
            }
            if node.flags().contains(ExprFlags::FINAL) {
                caps |= Capabilities::BRANCH_FINAL;
            }
            if changes_message {
                caps |= Capabilities::CHANGES_MESSAGE;
            }
            if node.flags().contains(ExprFlags::FLOW_CONTROL)
                || flow_controlled_child
                || flow_controlled_parent
            {
                caps |= Capabilities::HARD_FLOW_CONTROL;
            }
            self.graph.insert_capabilities(head, caps);
        }

        Ok(Fragment::new(first, last))
    }

    fn compile_junction(
        &mut self,
        node: &ExprNode,
        flow_controlled_parent: bool,
    ) -> CompileResult<Fragment> {
        let mut fork: Option<StageId> = None;
        let mut join: Option<StageId> = None;
        let mut saw_source_branch = false;
        let mut flow_controlled_child = false;

        for child in node.children() {
            let child_flow_control =
                flow_controlled_parent || child.flags().contains(ExprFlags::FLOW_CONTROL);
            let fragment = self.compile_node(child, child_flow_control)?;

            match fragment.head {
                Some(head) => {
                    if saw_source_branch {
                        return Err(CompileError::MixedJunctionBranches {
                            node: self.describe(child),
                        });
                    }
                    let multiplexer = match fork {
                        Some(multiplexer) => multiplexer,
                        None => {
                            let multiplexer = self.graph.add_multiplexer();
                            fork = Some(multiplexer);
                            multiplexer
                        }
                    };
                    self.graph.add_hop(multiplexer, head);
                    flow_controlled_child |= self
                        .graph
                        .capabilities(head)
                        .contains(Capabilities::HARD_FLOW_CONTROL);
                }
                None => {
                    if fork.is_some() {
                        return Err(CompileError::MixedJunctionBranches {
                            node: self.describe(child),
                        });
                    }
                    saw_source_branch = true;
                }
            }

            if let Some(tail) = fragment.tail {
                let join_point = match join {
                    Some(join_point) => join_point,
                    None => {
                        let join_point = self.graph.add_pass_through(SlotRole::Join);
                        join = Some(join_point);
                        join_point
                    }
                };
                self.link(tail, join_point, child)?;
            }
        }

        if let Some(multiplexer) = fork {
            if node.flags().contains(ExprFlags::FLOW_CONTROL)
                || flow_controlled_child
                || flow_controlled_parent
            {
                self.graph
                    .insert_capabilities(multiplexer, Capabilities::HARD_FLOW_CONTROL);
            }
        }

        Ok(Fragment::new(fork, join))
    }

    fn link(&mut self, from: StageId, to: StageId, node: &ExprNode) -> CompileResult<()> {
        match self.graph.try_link(from, to) {
            Ok(()) => Ok(()),
            Err(existing) => Err(CompileError::Inconsistent {
                node: self.describe(node),
                detail: format!("stage {from} is already linked to {existing}, cannot link {to}"),
            }),
        }
    }

    /// The node's own location, else that of the closest located ancestor.
    fn locate(&self, node: &ExprNode) -> String {
        node.location()
            .or_else(|| self.scope.iter().rev().find_map(Option::as_ref))
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }

    fn describe(&self, node: &ExprNode) -> NodeDescriptor {
        NodeDescriptor::new(node, self.locate(node))
    }

    fn origin(&self, node: &ExprNode) -> StageOrigin {
        StageOrigin {
            content: node.content(),
            name: node.name().map(str::to_owned),
            location: self.locate(node),
        }
    }

    fn empty_object(&self, node: &ExprNode) -> CompileError {
        CompileError::EmptyObject {
            kind: node.content(),
            name: node.display_name().to_string(),
            location: self.locate(node),
        }
    }
}

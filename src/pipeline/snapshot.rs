//! Serializable view of a compiled graph, for dumps and tests.

use crate::pipeline::graph::{SlotRole, StageGraph, StageOrigin};
use crate::pipeline::id::StageId;
use serde::Serialize;
use std::fmt;

/// Snapshot of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    pub id: StageId,
    pub role: SlotRole,
    pub label: String,
    pub capabilities: Vec<&'static str>,
    pub origin: Option<StageOrigin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Successor link.
    Next,
    /// Multiplexer fan-out.
    Hop,
}

/// Snapshot of a single edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeSnapshot {
    pub from: StageId,
    pub to: StageId,
    pub kind: EdgeKind,
}

/// Complete topology snapshot of a compiled graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub stages: Vec<StageSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl GraphSnapshot {
    pub fn capture(graph: &StageGraph) -> Self {
        let stages = graph
            .iter()
            .map(|(id, slot)| StageSnapshot {
                id,
                role: slot.role,
                label: slot.handle.label(),
                capabilities: slot.capabilities.names(),
                origin: slot.origin.clone(),
            })
            .collect();

        let mut edges = Vec::new();
        for (id, slot) in graph.iter() {
            if let Some(next) = slot.next {
                edges.push(EdgeSnapshot {
                    from: id,
                    to: next,
                    kind: EdgeKind::Next,
                });
            }
            edges.extend(slot.hops.iter().map(|&hop| EdgeSnapshot {
                from: id,
                to: hop,
                kind: EdgeKind::Hop,
            }));
        }

        Self { stages, edges }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Edges leaving `id`, in creation order.
    pub fn outgoing(&self, id: StageId) -> impl Iterator<Item = &EdgeSnapshot> {
        self.edges.iter().filter(move |edge| edge.from == id)
    }
}

/// One line per stage:
///
/// ```text
/// #0 declared    internal [IS_SOURCE] (source 's_local' at routes.toml:3:8)
///    -> #1
/// #1 multiplexer multiplexer
///    => #2
/// ```
impl fmt::Display for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in &self.stages {
            let role = format!("{:?}", stage.role).to_lowercase();
            write!(f, "{} {:<11} {}", stage.id, role, stage.label)?;
            if !stage.capabilities.is_empty() {
                write!(f, " [{}]", stage.capabilities.join(", "))?;
            }
            if let Some(origin) = &stage.origin {
                match &origin.name {
                    Some(name) => write!(f, " ({} '{}' at {})", origin.content, name, origin.location)?,
                    None => write!(f, " ({} at {})", origin.content, origin.location)?,
                }
            }
            writeln!(f)?;
            for edge in self.outgoing(stage.id) {
                let arrow = match edge.kind {
                    EdgeKind::Next => "->",
                    EdgeKind::Hop => "=>",
                };
                writeln!(f, "   {} {}", arrow, edge.to)?;
            }
        }
        Ok(())
    }
}

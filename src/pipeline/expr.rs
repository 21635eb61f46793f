//! Statement tree nodes.
//!
//! An `ExprNode` is one declarative construct of a route configuration: a
//! single stage, a reference to a named object, a sequence or a junction.
//! Nodes own their children and their embedded stage handle; the tree is
//! dropped root-down. Sideways links (the memoized compile result in `aux`)
//! are plain `StageId` values and never keep a stage alive.

use crate::pipeline::id::StageId;
use crate::pipeline::stage::StageHandle;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

/// Printed when neither a node nor any of its ancestors carries a location.
pub const UNKNOWN_LOCATION: &str = "#unknown";

/// Filename placeholder for statements parsed from an in-memory buffer.
pub const BUFFER_FILENAME: &str = "#buffer";

/// How the children of a node are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// A leaf holding one embedded stage.
    Single,
    /// A by-name reference to a registered object.
    Reference,
    /// Children are chained one after the other.
    Sequence,
    /// Children are parallel branches, forked and joined.
    Junction,
}

impl Layout {
    pub fn name(self) -> &'static str {
        match self {
            Layout::Single => "single",
            Layout::Reference => "reference",
            Layout::Sequence => "sequence",
            Layout::Junction => "junction",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The semantic kind of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Pipe,
    Source,
    Filter,
    Parser,
    Rewrite,
    Destination,
}

impl Content {
    pub const ALL: [Content; 6] = [
        Content::Pipe,
        Content::Source,
        Content::Filter,
        Content::Parser,
        Content::Rewrite,
        Content::Destination,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Content::Pipe => "pipe",
            Content::Source => "source",
            Content::Filter => "filter",
            Content::Parser => "parser",
            Content::Rewrite => "rewrite",
            Content::Destination => "destination",
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Statement flags set by the configuration author.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExprFlags: u32 {
        /// Attach every declared source as input. Top-level rules only.
        const CATCH_ALL = 1 << 0;
        /// Branch only receives messages no other branch accepted.
        const FALLBACK = 1 << 1;
        /// Messages matched by this branch are not offered to later branches.
        const FINAL = 1 << 2;
        /// Branch applies backpressure instead of fire-and-forget forwarding.
        const FLOW_CONTROL = 1 << 3;
    }
}

impl ExprFlags {
    /// Map a textual statement flag to its bit.
    ///
    /// Unknown names are reported with a warning and contribute no bit.
    pub fn lookup(flag: &str) -> ExprFlags {
        match flag {
            "catch-all" | "catchall" | "catch_all" => ExprFlags::CATCH_ALL,
            "fallback" => ExprFlags::FALLBACK,
            "final" => ExprFlags::FINAL,
            "flow_control" | "flow-control" => ExprFlags::FLOW_CONTROL,
            _ => {
                tracing::warn!(flag, "Unknown log statement flag");
                ExprFlags::empty()
            }
        }
    }

    /// Combine a list of textual flags.
    pub fn from_names<I, S>(names: I) -> ExprFlags
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(ExprFlags::empty(), |acc, name| acc | ExprFlags::lookup(name.as_ref()))
    }
}

/// Where a statement was written, captured at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SourceLocation {
    /// `None` for statements parsed from an unnamed buffer.
    pub filename: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filename: Some(filename.into()),
            line,
            column,
        }
    }

    /// Location inside an in-memory buffer with no file name.
    pub fn buffer(line: u32, column: u32) -> Self {
        Self {
            filename: None,
            line,
            column,
        }
    }

    /// A location is only meaningful when the parser recorded a position.
    pub fn is_known(&self) -> bool {
        self.line != 0 || self.column != 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.filename.as_deref().unwrap_or(BUFFER_FILENAME),
            self.line,
            self.column
        )
    }
}

/// The object embedded in a node.
#[derive(Debug)]
pub enum NodeObject {
    /// The declared stage of a `Single` node.
    Stage(StageHandle),
    /// A pre-resolved target of a `Reference` node.
    Target(Box<ExprNode>),
}

/// One node of the statement tree.
#[derive(Debug)]
pub struct ExprNode {
    layout: Layout,
    content: Content,
    name: Option<String>,
    children: Vec<ExprNode>,
    flags: ExprFlags,
    object: Option<NodeObject>,
    aux: Cell<Option<StageId>>,
    location: Option<SourceLocation>,
}

impl ExprNode {
    /// Build a node. `children` are taken in order; order is execution
    /// order in a sequence and branch order in a junction.
    pub fn new(
        layout: Layout,
        content: Content,
        name: Option<&str>,
        children: Vec<ExprNode>,
        flags: ExprFlags,
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            layout,
            content,
            name: name.map(str::to_owned),
            children,
            flags,
            object: None,
            aux: Cell::new(None),
            location,
        }
    }

    /// A `Single` node wrapping a stage.
    pub fn pipe(stage: StageHandle, location: Option<SourceLocation>) -> Self {
        let mut node = Self::new(
            Layout::Single,
            Content::Pipe,
            None,
            Vec::new(),
            ExprFlags::empty(),
            location,
        );
        node.set_embedded_object(NodeObject::Stage(stage));
        node
    }

    /// A named object definition (`source`, `filter`, `destination`, ...).
    pub fn definition(
        content: Content,
        name: &str,
        children: Vec<ExprNode>,
        location: Option<SourceLocation>,
    ) -> Self {
        Self::new(
            Layout::Sequence,
            content,
            Some(name),
            children,
            ExprFlags::empty(),
            location,
        )
    }

    /// A by-name reference to a registered object.
    pub fn reference(content: Content, name: &str, location: Option<SourceLocation>) -> Self {
        Self::new(
            Layout::Reference,
            content,
            Some(name),
            Vec::new(),
            ExprFlags::empty(),
            location,
        )
    }

    pub fn source(name: &str, children: Vec<ExprNode>, location: Option<SourceLocation>) -> Self {
        Self::definition(Content::Source, name, children, location)
    }

    pub fn source_reference(name: &str, location: Option<SourceLocation>) -> Self {
        Self::reference(Content::Source, name, location)
    }

    pub fn destination(
        name: &str,
        children: Vec<ExprNode>,
        location: Option<SourceLocation>,
    ) -> Self {
        Self::definition(Content::Destination, name, children, location)
    }

    pub fn destination_reference(name: &str, location: Option<SourceLocation>) -> Self {
        Self::reference(Content::Destination, name, location)
    }

    pub fn filter(name: &str, children: Vec<ExprNode>, location: Option<SourceLocation>) -> Self {
        Self::definition(Content::Filter, name, children, location)
    }

    pub fn filter_reference(name: &str, location: Option<SourceLocation>) -> Self {
        Self::reference(Content::Filter, name, location)
    }

    pub fn parser(name: &str, children: Vec<ExprNode>, location: Option<SourceLocation>) -> Self {
        Self::definition(Content::Parser, name, children, location)
    }

    pub fn parser_reference(name: &str, location: Option<SourceLocation>) -> Self {
        Self::reference(Content::Parser, name, location)
    }

    pub fn rewrite(name: &str, children: Vec<ExprNode>, location: Option<SourceLocation>) -> Self {
        Self::definition(Content::Rewrite, name, children, location)
    }

    pub fn rewrite_reference(name: &str, location: Option<SourceLocation>) -> Self {
        Self::reference(Content::Rewrite, name, location)
    }

    /// A top-level `log` statement.
    pub fn log(children: Vec<ExprNode>, flags: ExprFlags, location: Option<SourceLocation>) -> Self {
        Self::new(Layout::Sequence, Content::Pipe, None, children, flags, location)
    }

    /// An anonymous nested sequence (a junction branch).
    pub fn sequence(children: Vec<ExprNode>, location: Option<SourceLocation>) -> Self {
        Self::new(
            Layout::Sequence,
            Content::Pipe,
            None,
            children,
            ExprFlags::empty(),
            location,
        )
    }

    pub fn junction(children: Vec<ExprNode>, location: Option<SourceLocation>) -> Self {
        Self::new(
            Layout::Junction,
            Content::Pipe,
            None,
            children,
            ExprFlags::empty(),
            location,
        )
    }

    // ── Accessors ──

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn content(&self) -> Content {
        self.content
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for diagnostics: the node name or `unnamed`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn children(&self) -> &[ExprNode] {
        &self.children
    }

    pub fn flags(&self) -> ExprFlags {
        self.flags
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref().filter(|loc| loc.is_known())
    }

    /// The node's own location, or `#unknown`.
    pub fn format_location(&self) -> String {
        self.location()
            .map(ToString::to_string)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }

    pub fn object(&self) -> Option<&NodeObject> {
        self.object.as_ref()
    }

    /// The declared stage of a `Single` node.
    pub fn embedded_stage(&self) -> Option<&StageHandle> {
        match &self.object {
            Some(NodeObject::Stage(stage)) => Some(stage),
            _ => None,
        }
    }

    /// The pre-resolved target of a `Reference` node.
    pub fn bound_target(&self) -> Option<&ExprNode> {
        match &self.object {
            Some(NodeObject::Target(target)) => Some(target),
            _ => None,
        }
    }

    /// Memoized compile result for a referenced named object.
    pub fn aux(&self) -> Option<StageId> {
        self.aux.get()
    }

    // ── Construction API ──

    pub fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(str::to_owned);
    }

    /// Install the child list of a node that has none yet.
    ///
    /// # Panics
    ///
    /// Replacing an existing child list is a programming error.
    pub fn set_children(&mut self, children: Vec<ExprNode>) {
        assert!(
            self.children.is_empty(),
            "children of {} node {} are already set",
            self.layout,
            self.display_name()
        );
        self.children = children;
    }

    /// Append one node after the last child.
    pub fn push_child(&mut self, child: ExprNode) {
        self.children.push(child);
    }

    /// Append a list of nodes after the last child.
    pub fn append_children(&mut self, children: impl IntoIterator<Item = ExprNode>) {
        self.children.extend(children);
    }

    /// Insert a list of nodes in front of the first child, keeping their order.
    pub fn prepend_children(&mut self, children: Vec<ExprNode>) {
        let rest = std::mem::replace(&mut self.children, children);
        self.children.extend(rest);
    }

    pub fn set_flags(&mut self, flags: ExprFlags) {
        self.flags = flags;
    }

    pub fn insert_flags(&mut self, flags: ExprFlags) {
        self.flags.insert(flags);
    }

    pub fn remove_flags(&mut self, flags: ExprFlags) {
        self.flags.remove(flags);
    }

    pub fn set_embedded_object(&mut self, object: NodeObject) {
        self.object = Some(object);
    }

    pub fn set_aux(&self, aux: StageId) {
        self.aux.set(Some(aux));
    }

    pub fn set_location(&mut self, location: Option<SourceLocation>) {
        self.location = location;
    }

    /// Number of nodes in this subtree, bound targets included.
    pub fn subtree_len(&self) -> usize {
        let target = self.bound_target().map_or(0, ExprNode::subtree_len);
        1 + target + self.children.iter().map(ExprNode::subtree_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_flag_aliases() {
        for name in ["catch-all", "catchall", "catch_all"] {
            assert_eq!(ExprFlags::lookup(name), ExprFlags::CATCH_ALL);
        }
        assert_eq!(ExprFlags::lookup("fallback"), ExprFlags::FALLBACK);
        assert_eq!(ExprFlags::lookup("final"), ExprFlags::FINAL);
        assert_eq!(ExprFlags::lookup("flow_control"), ExprFlags::FLOW_CONTROL);
        assert_eq!(ExprFlags::lookup("flow-control"), ExprFlags::FLOW_CONTROL);
    }

    #[test]
    fn test_unknown_flag_contributes_nothing() {
        assert_eq!(ExprFlags::lookup("Final"), ExprFlags::empty());
        let flags = ExprFlags::from_names(["final", "bogus", "fallback"]);
        assert_eq!(flags, ExprFlags::FINAL | ExprFlags::FALLBACK);
    }

    #[test]
    fn test_location_formatting() {
        let loc = SourceLocation::new("routes.toml", 12, 5);
        assert_eq!(loc.to_string(), "routes.toml:12:5");
        assert_eq!(SourceLocation::buffer(3, 1).to_string(), "#buffer:3:1");

        let node = ExprNode::sequence(Vec::new(), None);
        assert_eq!(node.format_location(), UNKNOWN_LOCATION);

        let node = ExprNode::sequence(Vec::new(), Some(SourceLocation::default()));
        assert_eq!(node.format_location(), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_constructors_set_layout_and_content() {
        let node = ExprNode::source_reference("s_net", None);
        assert_eq!(node.layout(), Layout::Reference);
        assert_eq!(node.content(), Content::Source);
        assert_eq!(node.name(), Some("s_net"));

        let node = ExprNode::destination("d_file", Vec::new(), None);
        assert_eq!(node.layout(), Layout::Sequence);
        assert_eq!(node.content(), Content::Destination);

        let node = ExprNode::junction(Vec::new(), None);
        assert_eq!(node.layout(), Layout::Junction);
        assert_eq!(node.display_name(), "unnamed");
    }

    #[test]
    fn test_prepend_children_keeps_order() {
        let mut rule = ExprNode::log(
            vec![ExprNode::destination_reference("d", None)],
            ExprFlags::empty(),
            None,
        );
        rule.prepend_children(vec![
            ExprNode::source_reference("a", None),
            ExprNode::source_reference("b", None),
        ]);
        let names: Vec<_> = rule.children().iter().filter_map(|c| c.name()).collect();
        assert_eq!(names, ["a", "b", "d"]);
    }

    #[test]
    fn test_set_children_once() {
        let mut node = ExprNode::sequence(Vec::new(), None);
        node.set_children(vec![ExprNode::filter_reference("f", None)]);
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    #[should_panic(expected = "already set")]
    fn test_set_children_twice_panics() {
        let mut node = ExprNode::sequence(vec![ExprNode::filter_reference("f", None)], None);
        node.set_children(vec![ExprNode::filter_reference("g", None)]);
    }

    #[test]
    fn test_subtree_len_counts_bound_target() {
        let target = ExprNode::destination(
            "d",
            vec![ExprNode::sequence(Vec::new(), None)],
            None,
        );
        let mut reference = ExprNode::destination_reference("d", None);
        reference.set_embedded_object(NodeObject::Target(Box::new(target)));

        let rule = ExprNode::log(vec![reference], ExprFlags::empty(), None);
        assert_eq!(rule.subtree_len(), 4);
    }

    #[test]
    fn test_aux_slot() {
        let node = ExprNode::source("s", Vec::new(), None);
        assert_eq!(node.aux(), None);
        node.set_aux(StageId(4));
        assert_eq!(node.aux(), Some(StageId(4)));
    }

    proptest! {
        #[test]
        fn test_lookup_is_exact(name in "[a-z_-]{0,12}") {
            let known = [
                "catch-all", "catchall", "catch_all", "fallback", "final",
                "flow_control", "flow-control",
            ];
            let flags = ExprFlags::lookup(&name);
            // Property: only the documented spellings produce a bit
            prop_assert_eq!(flags.is_empty(), !known.contains(&name.as_str()));
            prop_assert!(flags.bits().count_ones() <= 1);
        }
    }
}

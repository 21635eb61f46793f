//! Named-object registry.
//!
//! Named statements are stored by `(content, name)` so `Reference` nodes can
//! find them; unnamed top-level statements are kept, in order, as the rules
//! to compile. The table is insertion-ordered, which makes catch-all
//! expansion deterministic: sources are attached in registration order.

use crate::pipeline::error::DuplicateNamedObject;
use crate::pipeline::expr::{Content, ExprNode};
use indexmap::IndexMap;

/// Composite lookup key of a named object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub content: Content,
    pub name: String,
}

impl ObjectKey {
    pub fn new(content: Content, name: impl Into<String>) -> Self {
        Self {
            content,
            name: name.into(),
        }
    }
}

/// Named objects, keyed by `(content, name)`.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: IndexMap<ObjectKey, ExprNode>,
}

impl ObjectTable {
    /// Exact lookup. No fuzzy matching, no fallback to another content kind.
    pub fn resolve(&self, content: Content, name: &str) -> Option<&ExprNode> {
        self.objects.get(&ObjectKey::new(content, name))
    }

    /// Visit every registered source, in registration order.
    pub fn for_each_source<F>(&self, mut f: F)
    where
        F: FnMut(&ExprNode),
    {
        self.objects
            .values()
            .filter(|node| node.content() == Content::Source)
            .for_each(|node| f(node));
    }

    /// Names of every registered source, in registration order.
    pub fn source_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.for_each_source(|node| names.extend(node.name().map(str::to_owned)));
        names
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &ExprNode)> {
        self.objects.iter()
    }
}

/// Registered statements of one configuration.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: ObjectTable,
    rules: Vec<ExprNode>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a top-level statement.
    ///
    /// Named nodes go into the object table. A name already taken for the
    /// same content is replaced by the new node and reported as
    /// `DuplicateNamedObject`; the caller decides whether to warn. Unnamed
    /// nodes are appended to the rule list and always succeed.
    pub fn register(&mut self, node: ExprNode) -> Result<(), DuplicateNamedObject> {
        let Some(name) = node.name() else {
            self.rules.push(node);
            return Ok(());
        };

        let key = ObjectKey::new(node.content(), name);
        match self.objects.objects.insert(key.clone(), node) {
            None => Ok(()),
            Some(_replaced) => Err(DuplicateNamedObject {
                content: key.content,
                name: key.name,
            }),
        }
    }

    pub fn resolve(&self, content: Content, name: &str) -> Option<&ExprNode> {
        self.objects.resolve(content, name)
    }

    pub fn for_each_source<F>(&self, f: F)
    where
        F: FnMut(&ExprNode),
    {
        self.objects.for_each_source(f)
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn rules(&self) -> &[ExprNode] {
        &self.rules
    }

    /// Total number of statement nodes, objects and rules together.
    pub fn statement_count(&self) -> usize {
        self.objects
            .objects
            .values()
            .chain(&self.rules)
            .map(ExprNode::subtree_len)
            .sum()
    }

    /// Borrow the object table and the rule list at the same time, as the
    /// compiler reads the former while rewriting the latter.
    pub(crate) fn split_mut(&mut self) -> (&ObjectTable, &mut [ExprNode]) {
        (&self.objects, &mut self.rules)
    }
}

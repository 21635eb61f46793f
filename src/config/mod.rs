//! Configuration module for logroute-rs
//!
//! Route files are TOML documents that declare named objects and the `log`
//! rules connecting them:
//!
//! ```toml
//! [options]
//! flush_lines = 10
//!
//! [[template]]
//! name = "t_tagged"
//! template = "[${HOST}] ${MESSAGE}"
//!
//! [[source]]
//! name = "s_local"
//! drivers = [{ driver = "internal" }]
//!
//! [[filter]]
//! name = "f_errors"
//! drivers = [{ driver = "match", value = "error" }]
//!
//! [[destination]]
//! name = "d_errors"
//! drivers = [{ driver = "collect", buffer = "errors" }]
//!
//! [[log]]
//! elements = [{ source = "s_local" }, { filter = "f_errors" }, { destination = "d_errors" }]
//!
//! [[log]]
//! flags = ["catch-all"]
//! elements = [
//!   { junction = [
//!       { elements = [{ filter = "f_errors" }], flags = ["final"] },
//!       { elements = [{ destination = "d_rest" }] },
//!   ] },
//! ]
//! ```
//!
//! Object names and references are read with their byte spans so every
//! statement carries a `file:line:column` location. Rules take the location
//! of their first element.
//!
//! # Default Location
//!
//! - **Linux**: `~/.config/logroute/routes.toml`
//! - **macOS**: `~/Library/Application Support/logroute/routes.toml`
//! - **Windows**: `%APPDATA%\logroute\routes.toml`

pub mod settings;

pub use settings::*;

use crate::error::{Result, ResultExt, RouteError};
use crate::pipeline::expr::{Content, ExprFlags, ExprNode, Layout, NodeObject, SourceLocation};
use crate::pipeline::registry::ObjectRegistry;
use crate::pipeline::stage::StageHandle;
use crate::pipeline::stages::{DriverSpec, StageFactory};
use crate::pipeline::template::{Template, TemplateRegistry};
use crate::pipeline::tree::CompiledTree;
use serde::Deserialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use toml::Spanned;

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "logroute";

/// Default route file name
pub const ROUTE_FILE: &str = "routes.toml";

/// Path of the default route file, if the platform has a config directory
pub fn default_route_file() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(ROUTE_FILE))
}

// ==================== Document Schema ====================

/// A parsed route file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteFile {
    #[serde(default)]
    pub options: GlobalOptions,

    #[serde(default, rename = "template")]
    pub templates: Vec<TemplateDef>,

    #[serde(default, rename = "source")]
    pub sources: Vec<ObjectDef>,

    #[serde(default, rename = "destination")]
    pub destinations: Vec<ObjectDef>,

    #[serde(default, rename = "filter")]
    pub filters: Vec<ObjectDef>,

    #[serde(default, rename = "parser")]
    pub parsers: Vec<ObjectDef>,

    #[serde(default, rename = "rewrite")]
    pub rewrites: Vec<ObjectDef>,

    #[serde(default, rename = "log")]
    pub rules: Vec<RuleDef>,
}

/// `[[template]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDef {
    pub name: String,
    pub template: String,
}

/// `[[source]]`, `[[destination]]`, `[[filter]]`, `[[parser]]`, `[[rewrite]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDef {
    pub name: Spanned<String>,
    #[serde(default)]
    pub drivers: Vec<DriverSpec>,
}

/// `[[log]]`, and one branch of a junction
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDef {
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One element of a rule
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Source(Spanned<String>),
    Destination(Spanned<String>),
    Filter(Spanned<String>),
    Parser(Spanned<String>),
    Rewrite(Spanned<String>),
    /// An anonymous object used in place
    Inline(InlineDef),
    Junction(Vec<RuleDef>),
}

/// `{ inline = { kind = "destination", drivers = [...] } }`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineDef {
    pub kind: Spanned<Content>,
    #[serde(default)]
    pub drivers: Vec<DriverSpec>,
}

// ==================== Locations ====================

/// Maps byte offsets of one document to line/column locations.
#[derive(Debug, Clone)]
pub struct LineIndex {
    filename: Option<String>,
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineIndex {
    /// `filename` is `None` for documents read from memory.
    pub fn new(filename: Option<String>, text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            filename,
            line_starts,
            text_len: text.len(),
        }
    }

    /// 1-based line and column of a span start.
    pub fn locate(&self, span: &Range<usize>) -> SourceLocation {
        let offset = span.start.min(self.text_len);
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        match &self.filename {
            Some(name) => SourceLocation::new(name.clone(), line as u32, column as u32),
            None => SourceLocation::buffer(line as u32, column as u32),
        }
    }
}

// ==================== Loading ====================

impl RouteFile {
    /// Parse a route file document
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a route file, returning the document and its line index
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, LineIndex)> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read route file {:?}", path))?;
        let file = Self::parse(&text)
            .with_context(|| format!("Failed to parse route file {:?}", path))?;
        let index = LineIndex::new(Some(path.display().to_string()), &text);
        Ok((file, index))
    }

    /// Build the statement tree: register templates and objects, then rules.
    ///
    /// Duplicate templates and objects are reported with a warning and do not
    /// fail the build. The returned tree is not compiled yet.
    pub fn build(&self, index: &LineIndex, factory: &dyn StageFactory) -> Result<CompiledTree> {
        let mut templates = TemplateRegistry::new();
        for def in &self.templates {
            templates.register(Template::new(&def.name, &def.template));
        }

        let builder = TreeBuilder {
            index,
            factory,
            templates: &templates,
        };

        let mut registry = ObjectRegistry::new();
        let groups = [
            (Content::Source, &self.sources),
            (Content::Destination, &self.destinations),
            (Content::Filter, &self.filters),
            (Content::Parser, &self.parsers),
            (Content::Rewrite, &self.rewrites),
        ];
        for (content, defs) in groups {
            for def in defs {
                let node = builder.object(content, def)?;
                if let Err(duplicate) = registry.register(node) {
                    tracing::warn!(location = %index.locate(&def.name.span()), "{duplicate}");
                }
            }
        }

        for rule in &self.rules {
            let node = builder.rule(rule)?;
            // Unnamed statements always register.
            let _ = registry.register(node);
        }

        tracing::info!(
            objects = registry.objects().len(),
            rules = registry.rules().len(),
            statements = registry.statement_count(),
            templates = templates.len(),
            "Route file loaded"
        );
        Ok(CompiledTree::with_parts(registry, templates, self.options.clone()))
    }
}

/// Load and build the route file at `path`
pub fn load_tree(path: impl AsRef<Path>, factory: &dyn StageFactory) -> Result<CompiledTree> {
    let (file, index) = RouteFile::load(path)?;
    file.build(&index, factory)
}

/// Build a route document held in memory; locations use `#buffer`
pub fn parse_tree(text: &str, factory: &dyn StageFactory) -> Result<CompiledTree> {
    let file = RouteFile::parse(text)?;
    file.build(&LineIndex::new(None, text), factory)
}

struct TreeBuilder<'a> {
    index: &'a LineIndex,
    factory: &'a dyn StageFactory,
    templates: &'a TemplateRegistry,
}

impl TreeBuilder<'_> {
    fn pipes(
        &self,
        content: Content,
        drivers: &[DriverSpec],
        location: &SourceLocation,
    ) -> Result<Vec<ExprNode>> {
        drivers
            .iter()
            .map(|spec| {
                let stage = self.factory.create(content, spec, self.templates)?;
                Ok(ExprNode::pipe(
                    StageHandle::from_boxed(stage),
                    Some(location.clone()),
                ))
            })
            .collect()
    }

    fn object(&self, content: Content, def: &ObjectDef) -> Result<ExprNode> {
        let location = self.index.locate(&def.name.span());
        let pipes = self
            .pipes(content, &def.drivers, &location)
            .with_context(|| format!("In {} '{}' at {}", content, def.name.get_ref(), location))?;
        Ok(ExprNode::definition(
            content,
            def.name.get_ref(),
            pipes,
            Some(location),
        ))
    }

    fn rule(&self, rule: &RuleDef) -> Result<ExprNode> {
        let children = rule
            .elements
            .iter()
            .map(|element| self.element(element))
            .collect::<Result<Vec<_>>>()?;
        Ok(ExprNode::log(
            children,
            ExprFlags::from_names(&rule.flags),
            self.first_location(&rule.elements),
        ))
    }

    fn element(&self, element: &Element) -> Result<ExprNode> {
        let reference = |content: Content, name: &Spanned<String>| {
            ExprNode::reference(content, name.get_ref(), Some(self.index.locate(&name.span())))
        };

        Ok(match element {
            Element::Source(name) => reference(Content::Source, name),
            Element::Destination(name) => reference(Content::Destination, name),
            Element::Filter(name) => reference(Content::Filter, name),
            Element::Parser(name) => reference(Content::Parser, name),
            Element::Rewrite(name) => reference(Content::Rewrite, name),
            Element::Inline(def) => {
                let content = *def.kind.get_ref();
                let location = self.index.locate(&def.kind.span());
                if content == Content::Pipe {
                    return Err(RouteError::Config(format!(
                        "Inline object at {location} needs a kind other than pipe"
                    )));
                }
                let pipes = self.pipes(content, &def.drivers, &location)?;
                let target = ExprNode::new(
                    Layout::Sequence,
                    content,
                    None,
                    pipes,
                    ExprFlags::empty(),
                    Some(location.clone()),
                );
                let mut node = ExprNode::new(
                    Layout::Reference,
                    content,
                    None,
                    Vec::new(),
                    ExprFlags::empty(),
                    Some(location),
                );
                node.set_embedded_object(NodeObject::Target(Box::new(target)));
                node
            }
            Element::Junction(branches) => {
                let children = branches
                    .iter()
                    .map(|branch| -> Result<ExprNode> {
                        let mut node = ExprNode::sequence(
                            branch
                                .elements
                                .iter()
                                .map(|element| self.element(element))
                                .collect::<Result<Vec<_>>>()?,
                            self.first_location(&branch.elements),
                        );
                        node.set_flags(ExprFlags::from_names(&branch.flags));
                        Ok(node)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let location = branches
                    .iter()
                    .find_map(|branch| self.first_location(&branch.elements));
                ExprNode::junction(children, location)
            }
        })
    }

    fn first_location(&self, elements: &[Element]) -> Option<SourceLocation> {
        elements.iter().find_map(|element| match element {
            Element::Source(name)
            | Element::Destination(name)
            | Element::Filter(name)
            | Element::Parser(name)
            | Element::Rewrite(name) => Some(self.index.locate(&name.span())),
            Element::Inline(def) => Some(self.index.locate(&def.kind.span())),
            Element::Junction(branches) => branches
                .iter()
                .find_map(|branch| self.first_location(&branch.elements)),
        })
    }
}

//! Pipeline-specific error types.

use crate::pipeline::expr::{Content, ExprNode};
use crate::pipeline::id::StageId;
use std::fmt;
use thiserror::Error;

/// Identifies the statement an error is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub content: Content,
    /// Node name, or `unnamed`.
    pub name: String,
    /// `file:line:column`, `#buffer:line:column` or `#unknown`.
    pub location: String,
}

impl NodeDescriptor {
    pub fn new(node: &ExprNode, location: String) -> Self {
        Self {
            content: node.content(),
            name: node.display_name().to_string(),
            location,
        }
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' at {}", self.content, self.name, self.location)
    }
}

/// Errors that abort the compilation of a top-level rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Error resolving reference to {kind} '{name}' at {location}")]
    UnresolvedReference {
        kind: Content,
        name: String,
        location: String,
    },

    #[error("Single statement has no stage to instantiate: {node}")]
    MissingStage { node: NodeDescriptor },

    #[error("Error cloning pipe into its reference point, the element is not meant to be used in this situation: {node}")]
    CloneRefused { node: NodeDescriptor },

    #[error("Source follows a non-source element, list source references/definitions first: {node}")]
    SourceMustBeFirst { node: NodeDescriptor },

    #[error("Source and non-source branches are mixed in junction: {node}")]
    MixedJunctionBranches { node: NodeDescriptor },

    #[error("The catch-all flag can only be specified for top-level log statements: {node}")]
    CatchAllOnNonTopLevel { node: NodeDescriptor },

    #[error("Referenced {kind} '{name}' compiles to no usable endpoint, referenced at {location}")]
    EmptyObject {
        kind: Content,
        name: String,
        location: String,
    },

    #[error("Inconsistent pipeline graph at {node}: {detail}")]
    Inconsistent { node: NodeDescriptor, detail: String },
}

impl CompileError {
    /// Formatted location of the offending statement.
    pub fn location(&self) -> &str {
        match self {
            CompileError::UnresolvedReference { location, .. }
            | CompileError::EmptyObject { location, .. } => location,
            CompileError::MissingStage { node }
            | CompileError::CloneRefused { node }
            | CompileError::SourceMustBeFirst { node }
            | CompileError::MixedJunctionBranches { node }
            | CompileError::CatchAllOnNonTopLevel { node }
            | CompileError::Inconsistent { node, .. } => &node.location,
        }
    }
}

/// Warning-level: the new object replaced the old one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Duplicate {content} object '{name}', the last definition wins")]
pub struct DuplicateNamedObject {
    pub content: Content,
    pub name: String,
}

/// Failure reported by a stage's own `init`/`deinit`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct StageError(pub String);

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from `CompiledTree::start`.
#[derive(Error, Debug)]
pub enum StartError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Error initializing message pipeline at stage {index} ({stage}): {source}")]
    Init {
        index: StageId,
        stage: String,
        #[source]
        source: StageError,
    },
}

/// One stage that failed to deinitialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub index: StageId,
    pub stage: String,
    pub error: StageError,
}

/// Every `deinit` failure collected by a best-effort `CompiledTree::stop`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} stage(s) failed to deinitialize: {}", failures.len(), summarize(failures))]
pub struct StopError {
    pub failures: Vec<StageFailure>,
}

fn summarize(failures: &[StageFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({}): {}", f.index, f.stage, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type CompileResult<T> = std::result::Result<T, CompileError>;

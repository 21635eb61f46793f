//! CompiledTree: one loaded configuration and its compiled graph.
//!
//! Lifecycle: `compile` → `start` → `stop` → `free`. The stage graph is
//! declared before the registry so that, whichever way the tree goes away,
//! stage instances are released before the statement tree that declared
//! them.

use crate::config::GlobalOptions;
use crate::pipeline::compiler::GraphCompiler;
use crate::pipeline::error::{
    CompileError, DuplicateNamedObject, StageFailure, StartError, StopError,
};
use crate::pipeline::expr::ExprNode;
use crate::pipeline::graph::StageGraph;
use crate::pipeline::registry::ObjectRegistry;
use crate::pipeline::snapshot::GraphSnapshot;
use crate::pipeline::template::TemplateRegistry;
use std::sync::Arc;

/// Where a tree is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    Uncompiled,
    Compiled,
    /// Compilation failed; the tree cannot be started.
    Failed,
    Started,
    Stopped,
}

#[derive(Debug)]
pub struct CompiledTree {
    // Field order is drop order: stages first, then the nodes.
    graph: StageGraph,
    registry: ObjectRegistry,
    templates: TemplateRegistry,
    options: Arc<GlobalOptions>,
    state: TreeState,
    last_error: Option<CompileError>,
}

impl CompiledTree {
    pub fn new(registry: ObjectRegistry) -> Self {
        Self::with_parts(registry, TemplateRegistry::new(), GlobalOptions::default())
    }

    pub fn with_parts(
        registry: ObjectRegistry,
        templates: TemplateRegistry,
        options: GlobalOptions,
    ) -> Self {
        Self {
            graph: StageGraph::new(),
            registry,
            templates,
            options: Arc::new(options),
            state: TreeState::Uncompiled,
            last_error: None,
        }
    }

    /// Add a statement before compilation. Duplicates are logged and the
    /// newer object replaces the older one.
    pub fn register(&mut self, node: ExprNode) -> Result<(), DuplicateNamedObject> {
        if self.state != TreeState::Uncompiled {
            tracing::warn!(state = ?self.state, "Statement registered after compilation");
        }
        self.registry
            .register(node)
            .inspect_err(|duplicate| tracing::warn!("{duplicate}"))
    }

    pub fn state(&self) -> TreeState {
        self.state
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn options(&self) -> &Arc<GlobalOptions> {
        &self.options
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot()
    }

    /// Compile every rule, in registration order. The first failing rule
    /// aborts compilation; stages created before the failure stay in the
    /// graph until the tree is freed.
    ///
    /// Compiling an already compiled tree does nothing. A failed tree keeps
    /// reporting its original error.
    pub fn compile(&mut self) -> Result<(), CompileError> {
        match self.state {
            TreeState::Compiled | TreeState::Started | TreeState::Stopped => return Ok(()),
            TreeState::Failed => {
                if let Some(err) = &self.last_error {
                    return Err(err.clone());
                }
            }
            TreeState::Uncompiled => {}
        }

        let (objects, rules) = self.registry.split_mut();
        let mut compiler = GraphCompiler::new(objects, &mut self.graph);
        for (index, rule) in rules.iter_mut().enumerate() {
            if let Err(err) = compiler.compile_rule(rule) {
                tracing::error!(rule = index, location = err.location(), "{err}");
                self.state = TreeState::Failed;
                self.last_error = Some(err.clone());
                return Err(err);
            }
        }

        self.state = TreeState::Compiled;
        tracing::info!(
            stages = self.graph.len(),
            rules = self.registry.rules().len(),
            "Configuration compiled"
        );
        Ok(())
    }

    /// Compile if needed, then initialize every stage in creation order.
    ///
    /// The first `init` failure aborts the start; stages initialized before
    /// it stay initialized and are deinitialized by `stop` or `free`.
    pub fn start(&mut self) -> Result<(), StartError> {
        self.compile()?;
        if self.state == TreeState::Started {
            return Ok(());
        }

        let options = Arc::clone(&self.options);
        for (id, slot) in self.graph.iter_mut() {
            if slot.initialized {
                continue;
            }
            if let Err(source) = slot.handle.init(&options) {
                let stage = slot.handle.label();
                tracing::error!(%id, stage = %stage, error = %source, "Error initializing message pipeline");
                return Err(StartError::Init {
                    index: id,
                    stage,
                    source,
                });
            }
            slot.initialized = true;
        }

        self.state = TreeState::Started;
        tracing::info!(stages = self.graph.len(), "Message pipeline started");
        Ok(())
    }

    /// Deinitialize every initialized stage, in creation order.
    ///
    /// Best effort: a failing stage does not stop the others. All failures
    /// are returned together.
    pub fn stop(&mut self) -> Result<(), StopError> {
        let mut failures = Vec::new();
        for (id, slot) in self.graph.iter_mut() {
            if !slot.initialized {
                continue;
            }
            slot.initialized = false;
            if let Err(error) = slot.handle.deinit() {
                let stage = slot.handle.label();
                tracing::warn!(%id, stage = %stage, %error, "Error deinitializing stage");
                failures.push(StageFailure {
                    index: id,
                    stage,
                    error,
                });
            }
        }

        if self.state == TreeState::Started {
            self.state = TreeState::Stopped;
        }
        tracing::debug!(failures = failures.len(), "Message pipeline stopped");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(StopError { failures })
        }
    }

    /// Release the tree: stop it if still started, drop the stage graph,
    /// then the statement tree and the registry.
    pub fn free(self) {
        let stages = self.graph.len();
        drop(self);
        tracing::debug!(stages, "Configuration freed");
    }

    fn has_initialized_stages(&self) -> bool {
        self.graph.iter().any(|(_, slot)| slot.initialized)
    }
}

/// Dropping a tree without `stop` still deinitializes every started stage.
impl Drop for CompiledTree {
    fn drop(&mut self) {
        if self.has_initialized_stages() {
            tracing::warn!("Releasing a started configuration, stopping it first");
            if let Err(err) = self.stop() {
                tracing::warn!("{err}");
            }
        }
    }
}

//! Driver lookup: turns a `{ driver = "...", ... }` table into a stage.

use crate::error::{Result, RouteError};
use crate::pipeline::expr::Content;
use crate::pipeline::stage::Stage;
use crate::pipeline::template::TemplateRegistry;
use crate::pipeline::stages::{
    CollectBuffer, CollectDestination, InternalSource, KvParser, MatchFilter, SetRewrite,
};
use crate::pipeline::message::FIELD_MESSAGE;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Built-in driver kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Internal,
    Match,
    Kv,
    Set,
    Collect,
}

impl DriverKind {
    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::Internal => "internal",
            DriverKind::Match => "match",
            DriverKind::Kv => "kv",
            DriverKind::Set => "set",
            DriverKind::Collect => "collect",
        }
    }

    /// The statement kind the driver may appear in.
    pub fn content(&self) -> Content {
        match self {
            DriverKind::Internal => Content::Source,
            DriverKind::Match => Content::Filter,
            DriverKind::Kv => Content::Parser,
            DriverKind::Set => Content::Rewrite,
            DriverKind::Collect => Content::Destination,
        }
    }

    pub fn all() -> &'static [DriverKind] {
        &[
            DriverKind::Internal,
            DriverKind::Match,
            DriverKind::Kv,
            DriverKind::Set,
            DriverKind::Collect,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            DriverKind::Internal => "Messages generated by the daemon itself.",
            DriverKind::Match => {
                "Passes messages whose field contains a value.\n\
                 Options: field (default MESSAGE), value, invert."
            }
            DriverKind::Kv => {
                "Extracts key=value pairs from a field.\n\
                 Options: field (default MESSAGE), separator, prefix."
            }
            DriverKind::Set => {
                "Assigns a template to a field.\n\
                 Options: field, value (template name or inline body)."
            }
            DriverKind::Collect => {
                "Stores messages in a named in-memory buffer.\n\
                 Options: buffer (default: default), capacity."
            }
        }
    }

    /// Driver of that name valid for `content`.
    pub fn lookup(content: Content, driver: &str) -> Option<DriverKind> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.name() == driver && kind.content() == content)
    }
}

/// One driver entry of a statement: the driver name and its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSpec {
    pub driver: String,
    #[serde(flatten)]
    pub options: toml::Table,
}

impl DriverSpec {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            options: toml::Table::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    fn wrong_type(&self, key: &str, expected: &str) -> RouteError {
        RouteError::invalid_option(&self.driver, key, format!("expected a {expected}"))
    }

    pub fn str_option(&self, key: &str) -> Result<Option<&str>> {
        match self.options.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "string")),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str_option(key)?
            .ok_or_else(|| RouteError::invalid_option(&self.driver, key, "missing"))
    }

    pub fn bool_option(&self, key: &str) -> Result<Option<bool>> {
        match self.options.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "boolean")),
        }
    }

    pub fn int_option(&self, key: &str) -> Result<Option<i64>> {
        match self.options.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "integer")),
        }
    }
}

/// Creates stage instances for the drivers named in a route file.
pub trait StageFactory {
    fn create(
        &self,
        content: Content,
        spec: &DriverSpec,
        templates: &TemplateRegistry,
    ) -> Result<Box<dyn Stage>>;
}

/// Factory for the built-in drivers.
///
/// `collect` destinations with the same `buffer` option share one buffer,
/// which stays reachable through [`BuiltinStages::buffer`].
#[derive(Debug, Default)]
pub struct BuiltinStages {
    buffers: Mutex<IndexMap<String, CollectBuffer>>,
}

impl BuiltinStages {
    pub const DEFAULT_BUFFER: &'static str = "default";

    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer of that name, if any `collect` destination uses it.
    pub fn buffer(&self, name: &str) -> Option<CollectBuffer> {
        self.buffers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn buffer_or_insert(&self, name: &str) -> CollectBuffer {
        self.buffers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl StageFactory for BuiltinStages {
    fn create(
        &self,
        content: Content,
        spec: &DriverSpec,
        templates: &TemplateRegistry,
    ) -> Result<Box<dyn Stage>> {
        let kind = DriverKind::lookup(content, &spec.driver).ok_or_else(|| {
            RouteError::UnknownDriver {
                content,
                driver: spec.driver.clone(),
            }
        })?;

        let stage: Box<dyn Stage> = match kind {
            DriverKind::Internal => Box::new(InternalSource::new()),
            DriverKind::Match => {
                let field = spec.str_option("field")?.unwrap_or(FIELD_MESSAGE);
                let value = spec.require_str("value")?;
                let invert = spec.bool_option("invert")?.unwrap_or(false);
                Box::new(MatchFilter::new(field, value).inverted(invert))
            }
            DriverKind::Kv => {
                let field = spec.str_option("field")?.unwrap_or(FIELD_MESSAGE);
                let separator = match spec.str_option("separator")? {
                    None => '=',
                    Some(sep) => {
                        let mut chars = sep.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => c,
                            _ => {
                                return Err(RouteError::invalid_option(
                                    &spec.driver,
                                    "separator",
                                    "expected a single character",
                                ))
                            }
                        }
                    }
                };
                let prefix = spec.str_option("prefix")?.unwrap_or_default();
                Box::new(KvParser::new(field, separator).with_prefix(prefix))
            }
            DriverKind::Set => {
                let field = spec.require_str("field")?;
                let template = templates.check_inline_template(spec.require_str("value")?);
                Box::new(SetRewrite::new(field, template))
            }
            DriverKind::Collect => {
                let name = spec.str_option("buffer")?.unwrap_or(Self::DEFAULT_BUFFER);
                let capacity = match spec.int_option("capacity")? {
                    None => 0,
                    Some(n) => usize::try_from(n).map_err(|_| {
                        RouteError::invalid_option(&spec.driver, "capacity", "must not be negative")
                    })?,
                };
                Box::new(CollectDestination::new(self.buffer_or_insert(name)).with_capacity(capacity))
            }
        };

        tracing::debug!(%content, driver = kind.name(), label = %stage.label(), "Stage created");
        Ok(stage)
    }
}

//! `set` rewrite: assigns a templated value to a field.

use crate::pipeline::message::{LogMessage, Verdict};
use crate::pipeline::stage::{Capabilities, Stage};
use crate::pipeline::template::Template;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SetRewrite {
    field: String,
    template: Arc<Template>,
}

impl SetRewrite {
    pub fn new(field: impl Into<String>, template: Arc<Template>) -> Self {
        Self {
            field: field.into(),
            template,
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }
}

impl Stage for SetRewrite {
    fn label(&self) -> String {
        format!("set({}={})", self.field, self.template.name())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CHANGES_MESSAGE
    }

    /// Clones share the template.
    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(self.clone()))
    }

    fn queue(&mut self, message: &mut LogMessage) -> Verdict {
        let value = self.template.expand(|field| message.get(field));
        message.set(self.field.clone(), value);
        Verdict::Forward
    }
}

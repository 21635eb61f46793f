//! Named message templates.
//!
//! Templates are registered once and shared by every stage that refers to
//! them. A stage option that is not the name of a registered template is
//! treated as an inline template body.

use indexmap::IndexMap;
use std::sync::Arc;

/// A template body plus its registration name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    body: String,
    /// Created on the fly from an option value, never registered.
    inline: bool,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            inline: false,
        }
    }

    /// An unregistered template whose name is its own body.
    pub fn inline(body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            name: body.clone(),
            body,
            inline: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Expand `${FIELD}` references with `lookup`. Unknown fields expand to
    /// nothing; an unterminated `${` is copied literally.
    pub fn expand<'a, F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    out.push_str(lookup(&after[..end]).unwrap_or_default());
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Templates by name, in registration order.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Arc<Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. An existing entry with the same name is kept and
    /// `false` is returned.
    pub fn register(&mut self, template: Template) -> bool {
        if self.templates.contains_key(template.name()) {
            tracing::warn!(template = template.name(), "Duplicate template, keeping the first definition");
            return false;
        }
        self.templates
            .insert(template.name().to_string(), Arc::new(template));
        true
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).cloned()
    }

    /// Resolve an option value: the registered template of that name, or a
    /// fresh inline template with the value as its body.
    pub fn check_inline_template(&self, template_or_name: &str) -> Arc<Template> {
        self.lookup(template_or_name)
            .unwrap_or_else(|| Arc::new(Template::inline(template_or_name)))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

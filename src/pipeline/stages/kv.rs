//! `kv` parser: splits `key=value` pairs out of a field.

use crate::pipeline::message::{LogMessage, Verdict, FIELD_MESSAGE};
use crate::pipeline::stage::{Capabilities, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvParser {
    field: String,
    separator: char,
    /// Prepended to every extracted key.
    prefix: String,
}

impl KvParser {
    pub fn new(field: impl Into<String>, separator: char) -> Self {
        Self {
            field: field.into(),
            separator,
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Whitespace-separated pairs; tokens without the separator are skipped.
    pub fn parse(&self, text: &str) -> Vec<(String, String)> {
        text.split_whitespace()
            .filter_map(|token| token.split_once(self.separator))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| {
                (
                    format!("{}{}", self.prefix, key),
                    value.trim_matches('"').to_string(),
                )
            })
            .collect()
    }
}

impl Default for KvParser {
    fn default() -> Self {
        Self::new(FIELD_MESSAGE, '=')
    }
}

impl Stage for KvParser {
    fn label(&self) -> String {
        format!("kv({})", self.field)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CHANGES_MESSAGE
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(self.clone()))
    }

    fn queue(&mut self, message: &mut LogMessage) -> Verdict {
        let Some(text) = message.get(&self.field) else {
            return Verdict::Forward;
        };
        for (key, value) in self.parse(text) {
            message.set(key, value);
        }
        Verdict::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let parser = KvParser::default();
        let mut msg = LogMessage::new("user=alice action=\"login\" junk =skip");
        assert_eq!(parser.clone().queue(&mut msg), Verdict::Forward);
        assert_eq!(msg.get("user"), Some("alice"));
        assert_eq!(msg.get("action"), Some("login"));
        assert_eq!(msg.get("junk"), None);
        assert_eq!(msg.len(), 3);
    }

    #[test]
    fn test_prefix_and_separator() {
        let parser = KvParser::new(FIELD_MESSAGE, ':').with_prefix(".kv.");
        assert_eq!(
            parser.parse("a:1 b:2"),
            vec![(".kv.a".to_string(), "1".to_string()), (".kv.b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_changes_message() {
        assert!(KvParser::default()
            .capabilities()
            .contains(Capabilities::CHANGES_MESSAGE));
    }
}

//! Log message handed to `Stage::queue`.
//!
//! Dispatch itself lives in the runtime; this is only the unit stages agree
//! on. Well-known field names are provided as constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FIELD_MESSAGE: &str = "MESSAGE";
pub const FIELD_PROGRAM: &str = "PROGRAM";
pub const FIELD_HOST: &str = "HOST";

/// One log message: a timestamp and a flat set of named text fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub received_at: DateTime<Utc>,
    fields: BTreeMap<String, String>,
}

impl LogMessage {
    pub fn new(message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_MESSAGE.to_string(), message.into());
        Self {
            received_at: Utc::now(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn message(&self) -> &str {
        self.get(FIELD_MESSAGE).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What a stage decided about a queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Pass the message on to the next stage.
    Forward,
    /// Stop processing this message on the current branch.
    Drop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_fields() {
        let mut msg = LogMessage::new("disk full");
        assert_eq!(msg.message(), "disk full");
        assert_eq!(msg.get(FIELD_HOST), None);

        msg.set(FIELD_HOST, "db01");
        assert_eq!(msg.get(FIELD_HOST), Some("db01"));
        assert_eq!(msg.len(), 2);

        assert_eq!(msg.remove(FIELD_HOST).as_deref(), Some("db01"));
        assert_eq!(msg.len(), 1);
    }
}

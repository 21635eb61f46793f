//! MatchFilter: field matching filter.
//!
//! Passes messages whose `field` contains `value`. With `invert` set, the
//! listed matches are dropped instead. An empty `value` matches everything
//! (passthrough mode).

use crate::pipeline::message::{LogMessage, Verdict, FIELD_MESSAGE};
use crate::pipeline::stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFilter {
    field: String,
    value: String,
    /// Invert mode: drop matching messages instead of passing them.
    invert: bool,
}

impl MatchFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            invert: false,
        }
    }

    /// Match against the message text.
    pub fn message(value: impl Into<String>) -> Self {
        Self::new(FIELD_MESSAGE, value)
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn is_passthrough(&self) -> bool {
        self.value.is_empty()
    }

    pub fn matches(&self, message: &LogMessage) -> bool {
        if self.is_passthrough() {
            return true;
        }
        let found = message
            .get(&self.field)
            .is_some_and(|text| text.contains(&self.value));
        // Pass if: (found AND !invert) OR (!found AND invert)
        found != self.invert
    }
}

impl Stage for MatchFilter {
    fn label(&self) -> String {
        let op = if self.invert { "!~" } else { "~" };
        format!("match({} {} '{}')", self.field, op, self.value)
    }

    fn clone_stage(&self) -> Option<Box<dyn Stage>> {
        Some(Box::new(self.clone()))
    }

    fn queue(&mut self, message: &mut LogMessage) -> Verdict {
        if self.matches(message) {
            Verdict::Forward
        } else {
            Verdict::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::message::FIELD_HOST;

    #[test]
    fn test_match_message() {
        let mut filter = MatchFilter::message("error");
        assert_eq!(filter.queue(&mut LogMessage::new("disk error")), Verdict::Forward);
        assert_eq!(filter.queue(&mut LogMessage::new("all good")), Verdict::Drop);
    }

    #[test]
    fn test_invert() {
        let mut filter = MatchFilter::message("debug").inverted(true);
        assert_eq!(filter.queue(&mut LogMessage::new("debug noise")), Verdict::Drop);
        assert_eq!(filter.queue(&mut LogMessage::new("warning")), Verdict::Forward);
    }

    #[test]
    fn test_missing_field_does_not_match() {
        let filter = MatchFilter::new(FIELD_HOST, "db");
        assert!(!filter.matches(&LogMessage::new("db down")));
        assert!(MatchFilter::new(FIELD_HOST, "db").inverted(true).matches(&LogMessage::new("x")));
    }

    #[test]
    fn test_passthrough() {
        let filter = MatchFilter::message("");
        assert!(filter.is_passthrough());
        assert!(filter.matches(&LogMessage::new("anything")));
    }

    #[test]
    fn test_label_and_clone() {
        let filter = MatchFilter::new(FIELD_HOST, "web").inverted(true);
        assert_eq!(filter.label(), "match(HOST !~ 'web')");
        let clone = filter.clone_stage().unwrap();
        assert_eq!(clone.label(), filter.label());
    }
}

//! Faults raised by receivers and the matchers chains use to catch them
//!
//! Faults are plain values: they travel through the processor as data and
//! are caught by an explicit search over the sequence stack, never by
//! unwinding.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::error::RuntimeError;

/// An error value raised by a receiver.
///
/// `kind` is a dotted path (`db`, `db.timeout`, `http.client.refused`);
/// matchers treat every `a.b` kind as a descendant of `a`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// Dotted fault kind
    kind:    String,
    /// Human-readable description
    message: String,
    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Whether this fault's kind is `kind` or nested below it
    pub fn is_kind_of(&self, kind: &str) -> bool {
        match self.kind.strip_prefix(kind) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false
        }
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({ "kind": self.kind, "message": self.message });
        if let Some(details) = &self.details {
            value["details"] = details.clone();
        }
        value
    }
}

impl From<RuntimeError> for Fault {
    fn from(err: RuntimeError) -> Self {
        Fault::new(err.kind(), err.to_string())
    }
}

/// Selects the faults an exceptional-chain entry is willing to catch.
///
/// Written in definitions as a plain string: `"*"` catches everything,
/// anything else is a kind prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FaultMatcher {
    /// Matches every fault
    Any,
    /// Matches the kind and all kinds nested below it
    Kind(String)
}

impl FaultMatcher {
    pub fn kind(kind: impl Into<String>) -> Self {
        FaultMatcher::Kind(kind.into())
    }

    pub fn matches(&self, fault: &Fault) -> bool {
        match self {
            FaultMatcher::Any => true,
            FaultMatcher::Kind(kind) => fault.is_kind_of(kind)
        }
    }
}

impl From<String> for FaultMatcher {
    fn from(value: String) -> Self {
        if value == "*" { FaultMatcher::Any } else { FaultMatcher::Kind(value) }
    }
}

impl From<FaultMatcher> for String {
    fn from(matcher: FaultMatcher) -> Self {
        matcher.to_string()
    }
}

impl Display for FaultMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultMatcher::Any => write!(f, "*"),
            FaultMatcher::Kind(kind) => write!(f, "{}", kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matcher_catches_descendants_only() {
        let matcher = FaultMatcher::kind("db");

        assert!(matcher.matches(&Fault::new("db", "x")));
        assert!(matcher.matches(&Fault::new("db.timeout", "x")));
        assert!(matcher.matches(&Fault::new("db.pool.exhausted", "x")));
        assert!(!matcher.matches(&Fault::new("dbx", "x")));
        assert!(!matcher.matches(&Fault::new("http.db", "x")));
    }

    #[test]
    fn test_any_matcher_parses_from_star() {
        let matchers: Vec<FaultMatcher> = serde_yaml::from_str("['*', 'http.client']").unwrap();

        assert_eq!(matchers, vec![FaultMatcher::Any, FaultMatcher::kind("http.client")]);
        assert!(matchers[0].matches(&Fault::new("anything", "x")));
    }

    #[test]
    fn test_fault_serializes_without_empty_details() {
        let value = Fault::new("validation", "missing field").to_value();

        assert_eq!(value, serde_json::json!({ "kind": "validation", "message": "missing field" }));

        let detailed = Fault::new("validation", "missing field").with_details(serde_json::json!({ "field": "id" }));
        assert_eq!(detailed.to_value()["details"]["field"], "id");
        assert_eq!(serde_json::from_value::<Fault>(detailed.to_value()).unwrap(), detailed);
    }
}

//! Free-form test payloads with a small set of recognised issue flags.
//!
//! A test body returns whatever domain fields it likes (`functions_found`,
//! `memory_increase_mb`, ...). Only the boolean flags in [`IssueFlag`] are
//! interpreted by the summary step; everything else passes through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known payload flags. A flag set to `false` marks a domain issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueFlag {
    RegressionPassed,
    PerformanceAcceptable,
    CompatibilityAcceptable,
}

impl IssueFlag {
    pub const ALL: [IssueFlag; 3] = [
        IssueFlag::RegressionPassed,
        IssueFlag::PerformanceAcceptable,
        IssueFlag::CompatibilityAcceptable,
    ];

    /// Payload key carrying this flag.
    pub fn key(&self) -> &'static str {
        match self {
            IssueFlag::RegressionPassed => "regression_passed",
            IssueFlag::PerformanceAcceptable => "performance_acceptable",
            IssueFlag::CompatibilityAcceptable => "compatibility_acceptable",
        }
    }
}

/// Result payload produced by a test body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TestPayload(Map<String, Value>);

impl TestPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Builder-style flag setter.
    pub fn with_flag(self, flag: IssueFlag, ok: bool) -> Self {
        self.with(flag.key(), ok)
    }

    /// Read a flag. Non-boolean values are ignored.
    pub fn flag(&self, flag: IssueFlag) -> Option<bool> {
        self.0.get(flag.key()).and_then(Value::as_bool)
    }

    /// Flags explicitly set to `false`.
    pub fn raised_flags(&self) -> Vec<IssueFlag> {
        IssueFlag::ALL
            .into_iter()
            .filter(|f| self.flag(*f) == Some(false))
            .collect()
    }

    /// Whether any recognised flag reports an unacceptable outcome.
    pub fn has_issue(&self) -> bool {
        !self.raised_flags().is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for TestPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_false_is_issue() {
        let payload = TestPayload::new()
            .with("functions_found", 12)
            .with_flag(IssueFlag::RegressionPassed, false);
        assert!(payload.has_issue());
        assert_eq!(payload.raised_flags(), vec![IssueFlag::RegressionPassed]);
    }

    #[test]
    fn test_flag_true_or_absent_is_not_issue() {
        let payload = TestPayload::new().with_flag(IssueFlag::PerformanceAcceptable, true);
        assert!(!payload.has_issue());
        assert!(!TestPayload::new().has_issue());
    }

    #[test]
    fn test_non_boolean_flag_ignored() {
        let payload = TestPayload::new().with("compatibility_acceptable", "no");
        assert_eq!(payload.flag(IssueFlag::CompatibilityAcceptable), None);
        assert!(!payload.has_issue());
    }

    #[test]
    fn test_payload_serializes_as_plain_object() {
        let payload = TestPayload::new()
            .with("memory_increase_mb", 12.5)
            .with_flag(IssueFlag::PerformanceAcceptable, true);
        let raw = serde_json::to_value(&payload).expect("serialize payload");
        assert_eq!(
            raw,
            json!({"memory_increase_mb": 12.5, "performance_acceptable": true})
        );
    }
}

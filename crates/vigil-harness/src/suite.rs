//! Ordered collections of named test cases.

use std::time::Instant;

use vigil_core::{PhaseKind, PhaseOutput, TestPayload, TestSuiteResult};

use crate::phase::{Phase, PhaseContext, PhaseError};
use crate::runner::TestCaseRunner;

/// Body of a test case.
pub type TestBody = Box<dyn Fn(&PhaseContext) -> anyhow::Result<TestPayload> + Send + Sync>;

/// Suite-level setup run before any test; an error here is a phase error.
pub type SetupHook = Box<dyn Fn(&PhaseContext) -> Result<(), PhaseError> + Send + Sync>;

struct TestCase {
    name: String,
    body: TestBody,
}

/// A named, ordered list of independent test cases bound to one phase.
///
/// Tests must not depend on state mutated by earlier tests; order only
/// matters for log readability.
pub struct TestSuite {
    kind: PhaseKind,
    name: String,
    setup: Option<SetupHook>,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(kind: PhaseKind) -> Self {
        Self::named(kind, kind.name())
    }

    pub fn named(kind: PhaseKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            setup: None,
            cases: Vec::new(),
        }
    }

    /// Builder-style [`add_test`](Self::add_test).
    pub fn test<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&PhaseContext) -> anyhow::Result<TestPayload> + Send + Sync + 'static,
    {
        self.add_test(name, body);
        self
    }

    /// Append a test. Re-using a name replaces the earlier body in place.
    pub fn add_test<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn(&PhaseContext) -> anyhow::Result<TestPayload> + Send + Sync + 'static,
    {
        let name = name.into();
        let body: TestBody = Box::new(body);
        match self.cases.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.body = body,
            None => self.cases.push(TestCase { name, body }),
        }
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&PhaseContext) -> Result<(), PhaseError> + Send + Sync + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name.as_str()).collect()
    }

    /// Run every test in order and summarise.
    ///
    /// Individual test failures are contained; only a setup failure escapes.
    pub fn run_all(&self, ctx: &PhaseContext) -> Result<TestSuiteResult, PhaseError> {
        let log = ctx.logger();
        if let Some(setup) = &self.setup {
            setup(ctx)?;
        }

        log.info(format!(
            "Running suite {} ({} tests)",
            self.name,
            self.cases.len()
        ));
        let start = Instant::now();
        let runner = TestCaseRunner::new(log.clone());

        let results = self
            .cases
            .iter()
            .map(|case| runner.run(&case.name, || (case.body)(ctx)))
            .collect();

        let suite = TestSuiteResult::new(
            self.name.clone(),
            results,
            start.elapsed().as_millis() as u64,
        );

        let s = &suite.summary;
        log.info(format!(
            "Suite {} finished: {}/{} passed, {} failed, {} issues ({:.1}%)",
            self.name,
            s.passed,
            s.total,
            s.failed,
            s.issue_count,
            s.success_rate * 100.0
        ));
        Ok(suite)
    }
}

impl Phase for TestSuite {
    fn kind(&self) -> PhaseKind {
        self.kind
    }

    fn run(&self, ctx: &PhaseContext) -> Result<PhaseOutput, PhaseError> {
        self.run_all(ctx).map(PhaseOutput::Suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_core::{Logger, ValidationConfig};

    fn ctx() -> PhaseContext {
        PhaseContext::new(
            "validation_test",
            PhaseKind::Integration,
            Arc::new(ValidationConfig::default()),
            &Logger::silent(),
        )
        .expect("context")
    }

    #[test]
    fn test_duplicate_name_replaces_body() {
        let suite = TestSuite::new(PhaseKind::Integration)
            .test("a", |_| anyhow::bail!("old"))
            .test("b", |_| Ok(TestPayload::new()))
            .test("a", |_| Ok(TestPayload::new()));

        assert_eq!(suite.test_names(), vec!["a", "b"]);
        let result = suite.run_all(&ctx()).expect("run");
        assert!(result.summary.overall_success);
    }

    #[test]
    fn test_setup_failure_escapes() {
        let suite = TestSuite::new(PhaseKind::Integration)
            .with_setup(|_| Err(PhaseError::Setup("no fixtures".into())))
            .test("never", |_| Ok(TestPayload::new()));

        let err = suite.run_all(&ctx()).expect_err("setup must fail");
        assert!(matches!(err, PhaseError::Setup(_)));
    }

    #[test]
    fn test_bodies_see_scratch_dir() {
        let suite = TestSuite::new(PhaseKind::Integration).test("writes", |ctx| {
            let path = ctx.scratch_dir().join("probe.txt");
            std::fs::write(&path, b"ok")?;
            Ok(TestPayload::new().with("written", path.exists()))
        });

        let result = suite.run_all(&ctx()).expect("run");
        let case = &result.results["writes"];
        assert!(case.success);
        assert_eq!(case.payload.get("written"), Some(&serde_json::json!(true)));
    }
}

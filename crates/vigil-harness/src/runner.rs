//! Isolated execution of a single test case.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use vigil_core::{ScopedLogger, TestCaseResult, TestPayload};

/// Runs one test body, containing any error or panic it raises.
pub struct TestCaseRunner {
    logger: ScopedLogger,
}

impl TestCaseRunner {
    pub fn new(logger: ScopedLogger) -> Self {
        Self { logger }
    }

    /// Execute `body`, measuring wall-clock time.
    ///
    /// Never propagates: an `Err` or a panic becomes a failed
    /// [`TestCaseResult`] carrying the message.
    pub fn run<F>(&self, name: &str, body: F) -> TestCaseResult
    where
        F: FnOnce() -> anyhow::Result<TestPayload>,
    {
        self.logger.info(format!("Running test: {name}"));
        let start = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(payload)) => TestCaseResult::passed(name, duration_ms, payload),
            Ok(Err(e)) => TestCaseResult::failed(name, duration_ms, format!("{e:#}")),
            Err(panic) => TestCaseResult::failed(
                name,
                duration_ms,
                format!("panicked: {}", panic_message(panic.as_ref())),
            ),
        };

        if !result.success {
            self.logger.error(format!(
                "✗ {name} failed after {duration_ms}ms: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ));
        } else if result.has_issue() {
            let flags: Vec<&str> = result
                .payload
                .raised_flags()
                .iter()
                .map(|f| f.key())
                .collect();
            self.logger.warning(format!(
                "⚠ {name} passed in {duration_ms}ms with issues: {}",
                flags.join(", ")
            ));
        } else {
            self.logger
                .info(format!("✓ {name} passed in {duration_ms}ms"));
        }

        result
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{IssueFlag, Logger};

    fn runner() -> TestCaseRunner {
        TestCaseRunner::new(Logger::silent().scoped("test"))
    }

    #[test]
    fn test_ok_body_passes_with_payload() {
        let result = runner().run("ok", || Ok(TestPayload::new().with("functions_found", 3)));
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.payload.get("functions_found"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_err_body_is_contained() {
        let result = runner().run("err", || anyhow::bail!("fixture missing"));
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap_or_default().contains("fixture missing"));
    }

    #[test]
    fn test_panicking_body_is_contained() {
        let result = runner().run("panics", || -> anyhow::Result<TestPayload> {
            panic!("index out of bounds")
        });
        assert!(!result.success);
        let error = result.error.expect("error recorded");
        assert!(error.contains("panicked"));
        assert!(error.contains("index out of bounds"));
    }

    #[test]
    fn test_issue_flag_keeps_success() {
        let result = runner().run("slow", || {
            Ok(TestPayload::new().with_flag(IssueFlag::PerformanceAcceptable, false))
        });
        assert!(result.success);
        assert!(result.has_issue());
    }

    #[test]
    fn test_error_context_chain_preserved() {
        let result = runner().run("ctx", || {
            Err(anyhow::anyhow!("inner cause").context("loading model"))
        });
        let error = result.error.expect("error recorded");
        assert!(error.contains("loading model"));
        assert!(error.contains("inner cause"));
    }
}

//! Regression phase: deterministic outputs stay where they were.

use anyhow::{bail, Context};
use serde_json::Value;
use sha2::{Digest, Sha256};
use vigil_core::{IssueFlag, PhaseKind, TestPayload};

use super::scan_sources;
use crate::phase::PhaseContext;
use crate::suite::TestSuite;

const BASELINE_SAMPLES: u64 = 100;
const REFERENCE_MEAN: f64 = 50.5;
const REFERENCE_VARIANCE: f64 = 833.25;
const REFERENCE_SUM_OF_SQUARES: f64 = 338_350.0;
const TOLERANCE: f64 = 1e-9;

pub fn suite() -> TestSuite {
    TestSuite::new(PhaseKind::Regression)
        .test("numeric_baseline", numeric_baseline)
        .test("artifact_digest_stability", artifact_digest_stability)
        .test("function_count_baseline", function_count_baseline)
}

fn numeric_baseline(_ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let samples: Vec<f64> = (1..=BASELINE_SAMPLES).map(|i| i as f64).collect();
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let sum_of_squares = samples.iter().map(|x| x * x).sum::<f64>();

    let passed = (mean - REFERENCE_MEAN).abs() < TOLERANCE
        && (variance - REFERENCE_VARIANCE).abs() < TOLERANCE
        && (sum_of_squares - REFERENCE_SUM_OF_SQUARES).abs() < TOLERANCE;

    Ok(TestPayload::new()
        .with("mean", mean)
        .with("variance", variance)
        .with("sum_of_squares", sum_of_squares)
        .with_flag(IssueFlag::RegressionPassed, passed))
}

fn artifact_digest_stability(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let artifact = serde_json::to_vec_pretty(ctx.config())?;
    let expected = hex::encode(Sha256::digest(&artifact));

    let path = ctx.scratch_dir().join("artifact.json");
    std::fs::write(&path, &artifact)?;
    let reread = std::fs::read(&path)?;
    let actual = hex::encode(Sha256::digest(&reread));

    // Re-serialising must be byte-identical too.
    let again = hex::encode(Sha256::digest(serde_json::to_vec_pretty(ctx.config())?));

    Ok(TestPayload::new()
        .with("digest", actual.clone())
        .with("artifact_bytes", artifact.len())
        .with_flag(
            IssueFlag::RegressionPassed,
            actual == expected && again == expected,
        ))
}

fn function_count_baseline(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let current = scan_sources(ctx.target_path(), &ctx.config().output_path)?.functions_found;
    let payload = TestPayload::new().with("functions_found", current);

    let Some(baseline_path) = &ctx.config().baseline_path else {
        return Ok(payload
            .with("baseline", "none")
            .with_flag(IssueFlag::RegressionPassed, true));
    };

    let content = std::fs::read(baseline_path)
        .with_context(|| format!("read baseline {}", baseline_path.display()))?;
    let baseline: Value = serde_json::from_slice(&content).context("parse baseline")?;
    let Some(expected) = find_u64(&baseline, "functions_found") else {
        bail!(
            "baseline {} has no functions_found figure",
            baseline_path.display()
        );
    };

    if (current as u64) < expected {
        ctx.logger().warning(format!(
            "function count dropped from {expected} to {current}"
        ));
    }
    Ok(payload
        .with("baseline", expected)
        .with_flag(IssueFlag::RegressionPassed, current as u64 >= expected))
}

/// First numeric value stored under `key`, searched depth-first.
fn find_u64(value: &Value, key: &str) -> Option<u64> {
    match value {
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_u64)
            .or_else(|| map.values().find_map(|v| find_u64(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_u64(v, key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;
    use vigil_core::{Logger, ValidationConfig};

    fn ctx(config: ValidationConfig) -> PhaseContext {
        PhaseContext::new(
            "validation_test",
            PhaseKind::Regression,
            Arc::new(config),
            &Logger::silent(),
        )
        .expect("context")
    }

    #[test]
    fn test_find_u64_nested() {
        let doc = json!({"categories": {"integration": {"tests": [{"payload": {"functions_found": 12}}]}}});
        assert_eq!(find_u64(&doc, "functions_found"), Some(12));
        assert_eq!(find_u64(&doc, "missing"), None);
    }

    #[test]
    fn test_function_drop_is_an_issue_not_a_failure() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("lib.rs"), "fn only() {}").expect("write");
        let baseline = dir.path().join("baseline.json");
        std::fs::write(&baseline, json!({"functions_found": 5}).to_string()).expect("write");

        let config = ValidationConfig {
            target_path: dir.path().to_path_buf(),
            baseline_path: Some(baseline),
            ..ValidationConfig::default()
        };
        let result = suite().run_all(&ctx(config)).expect("suite");

        let case = &result.results["function_count_baseline"];
        assert!(case.success);
        assert!(case.has_issue());
        assert_eq!(result.summary.failed, 0);
        assert_eq!(result.summary.issue_count, 1);
        assert!(!result.summary.overall_success);
    }

    #[test]
    fn test_clean_run_without_baseline() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("lib.rs"), "fn only() {}").expect("write");
        let config = ValidationConfig {
            target_path: dir.path().to_path_buf(),
            ..ValidationConfig::default()
        };

        let result = suite().run_all(&ctx(config)).expect("suite");
        assert!(result.summary.overall_success);
        assert_eq!(
            result.results["function_count_baseline"].payload.get("baseline"),
            Some(&json!("none"))
        );
    }
}

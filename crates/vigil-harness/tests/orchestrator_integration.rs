//! End-to-end orchestration: sessions, persistence, fatal propagation and
//! reporting.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::tempdir;
use vigil_core::{
    read_session, ComponentSpec, IssueFlag, PhaseKind, PhaseStatus, TestPayload, ValidationConfig,
};
use vigil_harness::{
    analyze_session, phase_fn, OrchestratorError, PhaseError, QualityReportGenerator, TestSuite,
    ValidationOrchestrator,
};

fn config(root: &Path, phases: &[PhaseKind]) -> ValidationConfig {
    ValidationConfig {
        output_path: root.join("results"),
        target_path: root.join("target_src"),
        console_logging: false,
        run_quick_tests: true,
        ..ValidationConfig::default()
    }
    .with_phases(phases.iter().copied())
}

fn passing(kind: PhaseKind, n: usize) -> TestSuite {
    (0..n).fold(TestSuite::new(kind), |suite, i| {
        suite.test(format!("case_{i}"), |_| Ok(TestPayload::new()))
    })
}

fn write_fixture(root: &Path) {
    let src = root.join("target_src/src");
    std::fs::create_dir_all(&src).expect("mkdir");
    std::fs::write(
        src.join("model_saver.rs"),
        "//! Saving.\n\n/// Saver.\npub struct ModelSaver;\n\nimpl ModelSaver {\n    pub fn new() -> Self { ModelSaver }\n    pub fn save(&self) {}\n}\n",
    )
    .expect("write");
}

#[tokio::test]
async fn test_isolation_ten_cases_two_throw() {
    let dir = tempdir().expect("tempdir");
    let suite = (0..10).fold(TestSuite::new(PhaseKind::Integration), |suite, i| {
        suite.test(format!("case_{i}"), move |_| {
            if i % 5 == 0 {
                anyhow::bail!("case {i} exploded");
            }
            Ok(TestPayload::new())
        })
    });

    let session = ValidationOrchestrator::new(config(dir.path(), &[PhaseKind::Integration]))
        .register(suite)
        .run_complete_validation()
        .await
        .expect("session");

    let summary = session
        .phase(PhaseKind::Integration)
        .and_then(|r| r.summary())
        .cloned()
        .expect("summary");
    assert_eq!(summary.total, 10);
    assert_eq!(summary.passed, 8);
    assert_eq!(summary.failed, 2);
    assert!((summary.success_rate - 0.8).abs() < 1e-9);
    assert!(!session.overall_success);
}

#[tokio::test]
async fn test_issue_is_not_a_failure() {
    let dir = tempdir().expect("tempdir");
    let suite = passing(PhaseKind::Regression, 4).test("drift", |_| {
        Ok(TestPayload::new().with_flag(IssueFlag::RegressionPassed, false))
    });

    let session = ValidationOrchestrator::new(config(dir.path(), &[PhaseKind::Regression]))
        .register(suite)
        .run_complete_validation()
        .await
        .expect("session");

    let record = session.phase(PhaseKind::Regression).expect("record");
    let summary = record.summary().expect("summary");
    assert_eq!(summary.total, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.issue_count, 1);
    assert!(!summary.overall_success);
    assert_eq!(record.status, PhaseStatus::Completed);
    assert!(!session.overall_success);
}

#[tokio::test]
async fn test_disabled_phase_is_excluded_from_and() {
    let dir = tempdir().expect("tempdir");
    let enabled = [
        PhaseKind::Integration,
        PhaseKind::Regression,
        PhaseKind::Performance,
    ];
    let failing_compat = TestSuite::new(PhaseKind::Compatibility)
        .test("broken", |_| anyhow::bail!("would fail"));

    let session = ValidationOrchestrator::new(config(dir.path(), &enabled))
        .register(passing(PhaseKind::Integration, 2))
        .register(passing(PhaseKind::Regression, 2))
        .register(passing(PhaseKind::Performance, 2))
        .register(failing_compat)
        .run_complete_validation()
        .await
        .expect("session");

    assert!(session.overall_success);
    assert!(session.phase(PhaseKind::Compatibility).is_none());
}

#[tokio::test]
async fn test_fatal_error_propagates_and_keeps_partial_results() {
    let dir = tempdir().expect("tempdir");
    let phases = [
        PhaseKind::Integration,
        PhaseKind::Regression,
        PhaseKind::Performance,
        PhaseKind::Compatibility,
    ];
    let later_ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later_ran);

    let err = ValidationOrchestrator::new(config(dir.path(), &phases))
        .register(passing(PhaseKind::Integration, 1))
        .register(passing(PhaseKind::Regression, 1))
        .register(phase_fn(PhaseKind::Performance, |_| {
            Err(PhaseError::Fatal("benchmark harness unavailable".into()))
        }))
        .register(phase_fn(PhaseKind::Compatibility, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PhaseError::Setup("unreachable".into()))
        }))
        .run_complete_validation()
        .await
        .expect_err("fatal must propagate");

    assert!(matches!(err, OrchestratorError::SessionFatal { .. }));
    assert!(err.to_string().contains("benchmark harness unavailable"));
    assert_eq!(later_ran.load(Ordering::SeqCst), 0);

    let partial = err.partial_session().expect("partial session");
    assert!(!partial.overall_success);
    assert!(partial.output_dir.join("integration_results.json").is_file());
    assert!(partial.output_dir.join("regression_results.json").is_file());
    assert!(!partial.output_dir.join("performance_results.json").exists());

    let persisted =
        read_session(&partial.output_dir.join("complete_results.json")).expect("persisted");
    assert!(persisted
        .session_error
        .as_deref()
        .unwrap_or_default()
        .contains("benchmark harness unavailable"));
    assert!(persisted.phase(PhaseKind::Integration).is_some_and(|r| r.success));
}

#[tokio::test]
async fn test_panicking_phase_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let err = ValidationOrchestrator::new(config(dir.path(), &[PhaseKind::Integration]))
        .register(phase_fn(PhaseKind::Integration, |_| panic!("phase blew up")))
        .run_complete_validation()
        .await
        .expect_err("panic is fatal");
    assert!(err.to_string().contains("phase blew up"));
}

#[tokio::test]
async fn test_parallel_phases_join_before_aggregate() {
    let dir = tempdir().expect("tempdir");
    let mut cfg = config(dir.path(), &PhaseKind::ALL);
    cfg.max_parallel_phases = 3;

    let session = ValidationOrchestrator::new(cfg)
        .register(passing(PhaseKind::Integration, 3))
        .register(passing(PhaseKind::Regression, 3))
        .register(passing(PhaseKind::Performance, 3))
        .register(phase_fn(PhaseKind::ComponentAssessment, |_| {
            Ok(vigil_core::PhaseOutput::Components(
                vigil_core::ComponentPhaseResult::new(Vec::new(), Vec::new(), 0),
            ))
        }))
        .register(passing(PhaseKind::Compatibility, 3))
        .run_complete_validation()
        .await
        .expect("session");

    assert!(session.overall_success);
    assert_eq!(session.phases.len(), 5);
    assert!(session
        .phases
        .values()
        .all(|r| r.status == PhaseStatus::Completed));

    let log = std::fs::read_to_string(session.log_path.as_ref().expect("log path")).expect("log");
    for kind in PhaseKind::ALL {
        assert!(
            log.contains(&format!(" - {} - ", kind.name())),
            "no lines tagged {kind}"
        );
    }
}

#[tokio::test]
async fn test_builtin_run_and_reports() {
    let dir = tempdir().expect("tempdir");
    write_fixture(dir.path());
    let mut cfg = config(dir.path(), &PhaseKind::ALL);
    cfg.components = vec![ComponentSpec::new(
        "model_saver",
        vec!["src/model_saver.rs".into()],
    )
    .with_capabilities(["save"])];
    // Timing thresholds are not under test here.
    cfg.thresholds.max_math_time_sec = 60.0;
    cfg.thresholds.max_file_time_sec = 60.0;
    cfg.thresholds.max_concurrent_time_sec = 60.0;
    cfg.thresholds.max_memory_increase_mb = 4096.0;

    let session = ValidationOrchestrator::with_builtin_phases(cfg)
        .run_complete_validation()
        .await
        .expect("session");

    for stem in [
        "integration_results",
        "regression_results",
        "performance_results",
        "component_validation",
        "compatibility_results",
        "complete_results",
    ] {
        assert!(
            session.output_dir.join(format!("{stem}.json")).is_file(),
            "missing {stem}"
        );
    }
    assert!(session
        .output_dir
        .join("logs")
        .join(format!("{}.log", session.session_id))
        .is_file());

    let generator = QualityReportGenerator::new();
    let report = generator.generate_final_report(&session);
    assert!(report.success(), "{:?}", report.outcome.errors);
    for file in [
        "quality_report.html",
        "quality_report.txt",
        "executive_summary.txt",
        "detailed_metrics.json",
    ] {
        assert!(session.output_dir.join(file).is_file(), "missing {file}");
    }

    let components = &report.analysis.components;
    assert_eq!(components.total, 1);
    assert_eq!(components.tested, 1);
    assert!((report.analysis.metrics.coverage_pct - 100.0).abs() < 1e-9);
    assert!(report.analysis.overall_score >= 0.0 && report.analysis.overall_score <= 100.0);
}

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let session = ValidationOrchestrator::new(config(
        dir.path(),
        &[PhaseKind::Integration, PhaseKind::Performance],
    ))
    .register(passing(PhaseKind::Integration, 2))
    .register(passing(PhaseKind::Performance, 1).test("slow", |_| {
        Ok(TestPayload::new().with_flag(IssueFlag::PerformanceAcceptable, false))
    }))
    .run_complete_validation()
    .await
    .expect("session");

    let first = analyze_session(&session);
    let second = analyze_session(&session);
    assert_eq!(first, second);
    assert!((first.metrics.performance_pct - 80.0).abs() < 1e-9);
    assert!(first.has_critical_issues());
}

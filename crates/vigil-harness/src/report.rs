//! Quality report rendering.
//!
//! Artifacts written next to the session results:
//! - `quality_report.html`: full report for humans
//! - `quality_report.txt`: the same content as plain text
//! - `executive_summary.txt`: score, verdict and top findings
//! - `detailed_metrics.json`: analysis plus per-test details
//!
//! Each format is rendered and written independently; one failing format
//! never blocks the others.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use vigil_core::{
    emit_quality_scored, emit_report_error, LogLevel, Logger, PhaseKind, PhaseStatus,
    ValidationSession,
};

use crate::quality::{analyze_session, QualityAnalysis, TRACKED_CATEGORIES};

/// Inputs available to every renderer.
pub struct ReportContext<'a> {
    pub session: &'a ValidationSession,
    pub analysis: &'a QualityAnalysis,
    pub generated_at: DateTime<Utc>,
}

/// One report format.
pub trait ReportRenderer: Send + Sync {
    /// Short format name, e.g. `html`.
    fn format(&self) -> &str;

    /// File name inside the report directory.
    fn file_name(&self) -> &str;

    fn render(&self, ctx: &ReportContext<'_>) -> anyhow::Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to render {format} report: {message}")]
    Render { format: String, message: String },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of writing all formats.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportOutcome {
    /// True only if every format was written.
    pub success: bool,
    /// Written artifacts keyed by format.
    pub artifacts: BTreeMap<String, PathBuf>,
    pub errors: Vec<String>,
}

/// Analysis plus the rendering outcome.
#[derive(Debug, Clone)]
pub struct FinalReport {
    pub analysis: QualityAnalysis,
    pub outcome: ReportOutcome,
}

impl FinalReport {
    pub fn success(&self) -> bool {
        self.outcome.success
    }
}

/// Turns a completed session into a [`QualityAnalysis`] and report files.
pub struct QualityReportGenerator {
    renderers: Vec<Box<dyn ReportRenderer>>,
    logger: Option<Logger>,
}

impl Default for QualityReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityReportGenerator {
    /// Generator with the four standard formats.
    pub fn new() -> Self {
        Self::empty()
            .with_renderer(HtmlReport)
            .with_renderer(TextReport)
            .with_renderer(ExecutiveSummary)
            .with_renderer(DetailedMetrics)
    }

    pub fn empty() -> Self {
        Self {
            renderers: Vec::new(),
            logger: None,
        }
    }

    /// Add a renderer, replacing any that writes the same file.
    pub fn with_renderer<R: ReportRenderer + 'static>(mut self, renderer: R) -> Self {
        self.renderers.retain(|r| r.file_name() != renderer.file_name());
        self.renderers.push(Box::new(renderer));
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn formats(&self) -> Vec<&str> {
        self.renderers.iter().map(|r| r.format()).collect()
    }

    /// Analysis only; read-only over the session.
    pub fn analyze(&self, session: &ValidationSession) -> QualityAnalysis {
        analyze_session(session)
    }

    /// Analyse and write every format into the session directory.
    pub fn generate_final_report(&self, session: &ValidationSession) -> FinalReport {
        self.generate_into(session, &session.output_dir)
    }

    /// Analyse and write every format into `dir`.
    pub fn generate_into(&self, session: &ValidationSession, dir: &Path) -> FinalReport {
        let logger = self
            .logger
            .clone()
            .unwrap_or_else(|| Logger::console_only(&session.session_id, LogLevel::Info));
        let log = logger.scoped("report");

        let analysis = self.analyze(session);
        emit_quality_scored(
            &session.session_id,
            analysis.overall_score,
            analysis.critical_issues.len(),
        );
        log.info(format!(
            "Quality score {:.1}/100 ({}), {} critical issue(s)",
            analysis.overall_score,
            analysis.quality_level,
            analysis.critical_issues.len()
        ));

        let ctx = ReportContext {
            session,
            analysis: &analysis,
            generated_at: Utc::now(),
        };

        let mut outcome = ReportOutcome::default();
        if let Err(e) = std::fs::create_dir_all(dir) {
            let err = ReportError::Write {
                path: dir.to_path_buf(),
                source: e,
            };
            for renderer in &self.renderers {
                emit_report_error(&session.session_id, renderer.format(), &err);
            }
            log.error(err.to_string());
            outcome.errors.push(err.to_string());
            return FinalReport { analysis, outcome };
        }

        for renderer in &self.renderers {
            match write_one(renderer.as_ref(), &ctx, dir) {
                Ok(path) => {
                    log.info(format!("Wrote {} report to {}", renderer.format(), path.display()));
                    outcome.artifacts.insert(renderer.format().to_string(), path);
                }
                Err(e) => {
                    emit_report_error(&session.session_id, renderer.format(), &e);
                    log.error(e.to_string());
                    outcome.errors.push(e.to_string());
                }
            }
        }
        outcome.success = outcome.errors.is_empty();
        FinalReport { analysis, outcome }
    }
}

fn write_one(
    renderer: &dyn ReportRenderer,
    ctx: &ReportContext<'_>,
    dir: &Path,
) -> Result<PathBuf, ReportError> {
    let content = renderer.render(ctx).map_err(|e| ReportError::Render {
        format: renderer.format().to_string(),
        message: format!("{e:#}"),
    })?;
    let path = dir.join(renderer.file_name());
    std::fs::write(&path, content).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn status_word(ok: bool) -> &'static str {
    if ok {
        "PASSED"
    } else {
        "FAILED"
    }
}

fn phase_status(session: &ValidationSession, kind: PhaseKind) -> String {
    match session.phase(kind) {
        Some(r) if r.status == PhaseStatus::Completed => status_word(r.success).to_string(),
        Some(r) if r.status == PhaseStatus::Failed => "FAILED".to_string(),
        Some(_) => "NOT COMPLETED".to_string(),
        None if session.config.is_enabled(kind) => "MISSING".to_string(),
        None => "DISABLED".to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `quality_report.html`
pub struct HtmlReport;

impl ReportRenderer for HtmlReport {
    fn format(&self) -> &str {
        "html"
    }

    fn file_name(&self) -> &str {
        "quality_report.html"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> anyhow::Result<String> {
        let a = ctx.analysis;
        let s = ctx.session;
        let mut h = String::new();

        writeln!(h, "<!DOCTYPE html>")?;
        writeln!(h, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(h, "<title>Quality Report - {}</title>", escape_html(&s.session_id))?;
        writeln!(
            h,
            "<style>body{{font-family:sans-serif;margin:2em}}table{{border-collapse:collapse}}\
             td,th{{border:1px solid #ccc;padding:4px 8px}}.pass{{color:#1a7f37}}.fail{{color:#cf222e}}</style>"
        )?;
        writeln!(h, "</head>\n<body>")?;
        writeln!(h, "<h1>Quality Report</h1>")?;
        writeln!(
            h,
            "<p>Session <code>{}</code> &middot; generated {}</p>",
            escape_html(&s.session_id),
            ctx.generated_at.to_rfc3339()
        )?;
        writeln!(
            h,
            "<h2>Overall score: {:.1}/100 ({})</h2>",
            a.overall_score, a.quality_level
        )?;
        writeln!(
            h,
            "<p class=\"{}\">Session {}</p>",
            if s.overall_success { "pass" } else { "fail" },
            status_word(s.overall_success)
        )?;

        writeln!(h, "<h2>Metrics</h2>\n<table>\n<tr><th>Metric</th><th>Value</th></tr>")?;
        for (name, value) in [
            ("Coverage", a.metrics.coverage_pct),
            ("Reliability", a.metrics.reliability_pct),
            ("Performance", a.metrics.performance_pct),
            ("Compatibility", a.metrics.compatibility_pct),
        ] {
            writeln!(h, "<tr><td>{name}</td><td>{value:.1}%</td></tr>")?;
        }
        writeln!(h, "</table>")?;

        writeln!(
            h,
            "<h2>Phases</h2>\n<table>\n<tr><th>Phase</th><th>Status</th><th>Passed</th>\
             <th>Failed</th><th>Issues</th><th>Duration</th></tr>"
        )?;
        for kind in PhaseKind::ALL {
            let status = phase_status(s, kind);
            let record = s.phase(kind);
            let summary = record.and_then(|r| r.summary()).cloned().unwrap_or_default();
            let class = if status == "PASSED" { "pass" } else { "fail" };
            writeln!(
                h,
                "<tr><td>{}</td><td class=\"{class}\">{status}</td><td>{}</td><td>{}</td><td>{}</td><td>{}ms</td></tr>",
                kind.title(),
                summary.passed,
                summary.failed,
                summary.issue_count,
                record.map_or(0, |r| r.duration_ms)
            )?;
        }
        writeln!(h, "</table>")?;

        if let Some(components) = s
            .phase(PhaseKind::ComponentAssessment)
            .and_then(|r| r.output.as_ref())
            .and_then(|o| o.components())
        {
            writeln!(
                h,
                "<h2>Components</h2>\n<table>\n<tr><th>Component</th><th>Score</th><th>Valid</th><th>Notes</th></tr>"
            )?;
            for c in components.assessments.values() {
                writeln!(
                    h,
                    "<tr><td>{}</td><td>{:.1}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&c.name),
                    c.quality_score,
                    if c.is_valid { "yes" } else { "no" },
                    escape_html(&c.notes.join("; "))
                )?;
            }
            for name in &components.not_found {
                writeln!(
                    h,
                    "<tr><td>{}</td><td>-</td><td>no</td><td>not found</td></tr>",
                    escape_html(name)
                )?;
            }
            writeln!(h, "</table>")?;
        }

        writeln!(h, "<h2>Critical issues</h2>")?;
        if a.critical_issues.is_empty() {
            writeln!(h, "<p>None.</p>")?;
        } else {
            writeln!(h, "<ul>")?;
            for issue in &a.critical_issues {
                writeln!(h, "<li>{}</li>", escape_html(issue))?;
            }
            writeln!(h, "</ul>")?;
        }

        writeln!(h, "<h2>Recommendations</h2>\n<ul>")?;
        for rec in &a.recommendations {
            writeln!(h, "<li>{}</li>", escape_html(rec))?;
        }
        writeln!(h, "</ul>")?;
        writeln!(
            h,
            "<p><strong>{}</strong>: {}</p>",
            a.quality_level,
            a.quality_level.verdict()
        )?;
        writeln!(h, "</body>\n</html>")?;
        Ok(h)
    }
}

/// `quality_report.txt`
pub struct TextReport;

impl ReportRenderer for TextReport {
    fn format(&self) -> &str {
        "text"
    }

    fn file_name(&self) -> &str {
        "quality_report.txt"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> anyhow::Result<String> {
        let a = ctx.analysis;
        let s = ctx.session;
        let rule = "=".repeat(72);
        let mut t = String::new();

        writeln!(t, "{rule}")?;
        writeln!(t, "QUALITY REPORT")?;
        writeln!(t, "{rule}")?;
        writeln!(t, "Session:       {}", s.session_id)?;
        writeln!(t, "Target:        {}", s.config.target_path.display())?;
        writeln!(t, "Config digest: {}", s.config_digest)?;
        writeln!(t, "Generated:     {}", ctx.generated_at.to_rfc3339())?;
        writeln!(t, "Duration:      {}ms", s.duration_ms)?;
        writeln!(t, "Session:       {}", status_word(s.overall_success))?;
        if let Some(err) = &s.session_error {
            writeln!(t, "Session error: {err}")?;
        }
        writeln!(t)?;
        writeln!(
            t,
            "Overall quality score: {:.1}/100 ({})",
            a.overall_score, a.quality_level
        )?;
        writeln!(t)?;

        writeln!(t, "METRICS")?;
        writeln!(t, "  Coverage:      {:>6.1}%", a.metrics.coverage_pct)?;
        writeln!(t, "  Reliability:   {:>6.1}%", a.metrics.reliability_pct)?;
        writeln!(t, "  Performance:   {:>6.1}%", a.metrics.performance_pct)?;
        writeln!(t, "  Compatibility: {:>6.1}%", a.metrics.compatibility_pct)?;
        writeln!(t)?;

        writeln!(t, "PHASES")?;
        for kind in PhaseKind::ALL {
            writeln!(t, "  {:<22} {}", kind.title(), phase_status(s, kind))?;
            let Some(suite) = s
                .phase(kind)
                .and_then(|r| r.output.as_ref())
                .and_then(|o| o.suite())
            else {
                continue;
            };
            for case in suite.ordered() {
                let mark = match (case.success, case.has_issue()) {
                    (false, _) => "✗",
                    (true, true) => "⚠",
                    (true, false) => "✓",
                };
                write!(t, "    {mark} {} ({}ms)", case.name, case.duration_ms)?;
                if let Some(err) = &case.error {
                    write!(t, ": {err}")?;
                }
                writeln!(t)?;
            }
        }
        writeln!(t)?;

        writeln!(
            t,
            "COMPONENTS: {}/{} valid, average score {:.1}",
            a.components.tested, a.components.total, a.components.average_score
        )?;
        writeln!(t)?;

        writeln!(t, "CRITICAL ISSUES ({})", a.critical_issues.len())?;
        for issue in &a.critical_issues {
            writeln!(t, "  - {issue}")?;
        }
        writeln!(t)?;
        writeln!(t, "RECOMMENDATIONS")?;
        for rec in &a.recommendations {
            writeln!(t, "  - {rec}")?;
        }
        writeln!(t)?;
        writeln!(t, "{}: {}", a.quality_level, a.quality_level.verdict())?;
        Ok(t)
    }
}

/// `executive_summary.txt`
pub struct ExecutiveSummary;

impl ReportRenderer for ExecutiveSummary {
    fn format(&self) -> &str {
        "summary"
    }

    fn file_name(&self) -> &str {
        "executive_summary.txt"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> anyhow::Result<String> {
        let a = ctx.analysis;
        let mut t = String::new();

        writeln!(t, "EXECUTIVE SUMMARY - {}", ctx.session.session_id)?;
        writeln!(t)?;
        writeln!(
            t,
            "Quality score: {:.1}/100 ({})",
            a.overall_score, a.quality_level
        )?;
        writeln!(t, "Validation:    {}", status_word(a.session_success))?;

        let (passed, total) = TRACKED_CATEGORIES
            .iter()
            .map(|&k| a.category(k))
            .fold((0, 0), |(p, n), s| (p + s.passed, n + s.total));
        writeln!(t, "Tests passed:  {passed}/{total}")?;
        writeln!(t, "Critical:      {}", a.critical_issues.len())?;
        writeln!(t)?;

        if let Some(top) = a.recommendations.first() {
            writeln!(t, "Top recommendation: {top}")?;
        }
        writeln!(t, "Verdict: {}", a.quality_level.verdict())?;
        Ok(t)
    }
}

/// `detailed_metrics.json`
pub struct DetailedMetrics;

impl ReportRenderer for DetailedMetrics {
    fn format(&self) -> &str {
        "json"
    }

    fn file_name(&self) -> &str {
        "detailed_metrics.json"
    }

    fn render(&self, ctx: &ReportContext<'_>) -> anyhow::Result<String> {
        let s = ctx.session;
        let phases: BTreeMap<&str, serde_json::Value> = PhaseKind::ALL
            .iter()
            .map(|&kind| {
                let record = s.phase(kind);
                let tests: Vec<serde_json::Value> = record
                    .and_then(|r| r.output.as_ref())
                    .and_then(|o| o.suite())
                    .map(|suite| {
                        suite
                            .ordered()
                            .map(|c| {
                                json!({
                                    "name": c.name,
                                    "success": c.success,
                                    "duration_ms": c.duration_ms,
                                    "error": c.error,
                                    "payload": c.payload,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let value = json!({
                    "status": phase_status(s, kind),
                    "duration_ms": record.map_or(0, |r| r.duration_ms),
                    "error": record.and_then(|r| r.error.clone()),
                    "tests": tests,
                });
                (kind.name(), value)
            })
            .collect();

        let doc = json!({
            "session_id": s.session_id,
            "config_digest": s.config_digest,
            "generated_at": ctx.generated_at,
            "duration_ms": s.duration_ms,
            "analysis": ctx.analysis,
            "phases": phases,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_with_renderer_replaces_same_file() {
        struct Alt;
        impl ReportRenderer for Alt {
            fn format(&self) -> &str {
                "alt-json"
            }
            fn file_name(&self) -> &str {
                "detailed_metrics.json"
            }
            fn render(&self, _ctx: &ReportContext<'_>) -> anyhow::Result<String> {
                Ok("{}".into())
            }
        }

        let generator = QualityReportGenerator::new().with_renderer(Alt);
        assert_eq!(generator.formats(), vec!["html", "text", "summary", "alt-json"]);
    }

    #[test]
    fn test_failing_format_does_not_block_others() {
        struct Broken;
        impl ReportRenderer for Broken {
            fn format(&self) -> &str {
                "broken"
            }
            fn file_name(&self) -> &str {
                "broken.txt"
            }
            fn render(&self, _ctx: &ReportContext<'_>) -> anyhow::Result<String> {
                anyhow::bail!("template missing")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let session =
            ValidationSession::new(vigil_core::ValidationConfig::default(), Utc::now()).unwrap();
        let generator = QualityReportGenerator::empty()
            .with_renderer(HtmlReport)
            .with_renderer(Broken)
            .with_renderer(TextReport)
            .with_renderer(DetailedMetrics)
            .with_logger(Logger::silent());

        let report = generator.generate_into(&session, dir.path());

        assert!(!report.success());
        assert_eq!(report.outcome.errors.len(), 1);
        assert!(report.outcome.errors[0].contains("broken"));
        assert!(report.outcome.errors[0].contains("template missing"));
        assert_eq!(report.outcome.artifacts.len(), 3);
        assert!(!dir.path().join("broken.txt").exists());
        for file in ["quality_report.html", "quality_report.txt", "detailed_metrics.json"] {
            assert!(dir.path().join(file).is_file(), "missing {file}");
        }
    }
}

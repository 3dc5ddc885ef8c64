//! Vigil - validation orchestration CLI
//!
//! ## Commands
//!
//! - `run`: Run complete validation and write quality reports
//! - `report`: Regenerate reports from a persisted session
//! - `init-config`: Write the default configuration file
//!
//! Exit status: 0 when the session and every report format succeeded, 1 on a
//! validation or report failure, 2 when the session aborted.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};

use vigil_core::{read_session, PhaseKind, ValidationConfig, ValidationSession, DEFAULT_CONFIG_FILE};
use vigil_harness::{FinalReport, OrchestratorError, QualityReportGenerator, ValidationOrchestrator};

const EXIT_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validation orchestration and quality reporting", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run complete validation against a target tree
    Run(RunArgs),

    /// Regenerate reports from a persisted complete_results.json
    Report {
        /// Path to complete_results.json
        session: PathBuf,

        /// Directory for the reports (default: next to the session file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default configuration
    InitConfig {
        /// Destination file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Configuration file (default: vigil.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root for session output directories
    #[arg(short, long, env = "VIGIL_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Codebase under validation
    #[arg(short, long, env = "VIGIL_TARGET")]
    target: Option<PathBuf>,

    /// Comma-separated phases to run (default: all)
    #[arg(long)]
    phases: Option<String>,

    /// Shrink workloads for a fast pass
    #[arg(long)]
    quick: bool,

    /// Maximum phases run concurrently
    #[arg(long)]
    parallel: Option<usize>,

    /// Do not write the session log file
    #[arg(long)]
    no_file_log: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vigil_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, cli.verbose, cli.json).await,
        Commands::Report { session, output } => cmd_report(&session, output.as_deref(), cli.json),
        Commands::InitConfig { path, force } => cmd_init_config(&path, force),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

/// File or default config, then environment, then flags.
fn resolve_config(args: &RunArgs, verbose: bool) -> Result<ValidationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = ValidationConfig::from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => ValidationConfig::load()?,
    };

    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(target) = &args.target {
        config.target_path = target.clone();
    }
    if let Some(phases) = &args.phases {
        config.enabled_phases =
            ValidationConfig::parse_phase_list(phases).context("Invalid --phases")?;
        if config.enabled_phases.is_empty() {
            bail!("--phases selected no phases");
        }
    }
    if args.quick {
        config.run_quick_tests = true;
    }
    if let Some(parallel) = args.parallel {
        config.max_parallel_phases = parallel.max(1);
    }
    if args.no_file_log {
        config.file_logging = false;
    }
    if verbose {
        config.verbose_logging = true;
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_run(args: RunArgs, verbose: bool, json: bool) -> Result<ExitCode> {
    let config = resolve_config(&args, verbose)?;
    info!(
        target_path = %config.target_path.display(),
        phases = config.enabled_phases.len(),
        "starting validation"
    );

    let orchestrator = ValidationOrchestrator::with_builtin_phases(config);
    let session = match orchestrator.run_complete_validation().await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("✗ {e}");
            if let OrchestratorError::SessionFatal { session, .. } = &e {
                eprintln!(
                    "  Partial results: {}",
                    session.output_dir.display()
                );
            }
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };

    let report = QualityReportGenerator::new().generate_final_report(&session);
    print_summary(&session, &report, json)?;

    if session.overall_success && report.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILED))
    }
}

fn cmd_report(path: &Path, output: Option<&Path>, json: bool) -> Result<ExitCode> {
    let session = read_session(path)
        .with_context(|| format!("Failed to load session from {}", path.display()))?;
    let dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| session.output_dir.clone()),
    };

    let report = QualityReportGenerator::new().generate_into(&session, &dir);
    print_summary(&session, &report, json)?;

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    })
}

fn cmd_init_config(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    ValidationConfig::default().save(path)?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn print_summary(session: &ValidationSession, report: &FinalReport, json: bool) -> Result<()> {
    let analysis = &report.analysis;

    if json {
        let summary = json!({
            "session_id": session.session_id,
            "overall_success": session.overall_success,
            "output_dir": session.output_dir,
            "duration_ms": session.duration_ms,
            "quality_score": analysis.overall_score,
            "quality_level": analysis.quality_level,
            "metrics": analysis.metrics,
            "critical_issues": analysis.critical_issues,
            "recommendations": analysis.recommendations,
            "reports": report.outcome,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mark = if session.overall_success { "✓" } else { "✗" };
    println!();
    println!(
        "{mark} Validation session {} {} in {}ms",
        session.session_id,
        if session.overall_success { "PASSED" } else { "FAILED" },
        session.duration_ms
    );
    for kind in PhaseKind::ALL {
        let Some(record) = session.phase(kind) else {
            continue;
        };
        let detail = match (record.summary(), &record.error) {
            (_, Some(err)) => err.clone(),
            (Some(s), None) => format!(
                "{}/{} passed, {} failed, {} issues",
                s.passed, s.total, s.failed, s.issue_count
            ),
            (None, None) => match record.output.as_ref().and_then(|o| o.components()) {
                Some(c) => format!(
                    "{}/{} components valid, average score {:.1}",
                    c.valid_count, c.total, c.average_score
                ),
                None => String::new(),
            },
        };
        println!(
            "  {} {:<22} {}",
            if record.success { "✓" } else { "✗" },
            kind.title(),
            detail
        );
    }

    println!();
    println!(
        "Quality score: {:.1}/100 ({})",
        analysis.overall_score, analysis.quality_level
    );
    if !analysis.critical_issues.is_empty() {
        println!("Critical issues:");
        for issue in &analysis.critical_issues {
            println!("  - {issue}");
        }
    }
    println!("Recommendations:");
    for rec in &analysis.recommendations {
        println!("  - {rec}");
    }
    for err in &report.outcome.errors {
        println!("⚠ {err}");
    }
    println!("Reports: {}", session.output_dir.display());
    Ok(())
}

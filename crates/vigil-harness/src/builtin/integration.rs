//! Integration phase: the target tree, its components and the configuration
//! fit together.

use anyhow::{ensure, Context};
use vigil_core::{PhaseKind, TestPayload, ValidationConfig};

use super::scan_sources;
use crate::assessor::ComponentAssessor;
use crate::phase::PhaseContext;
use crate::suite::TestSuite;

pub fn suite() -> TestSuite {
    TestSuite::new(PhaseKind::Integration)
        .test("source_discovery", source_discovery)
        .test("component_resolution", component_resolution)
        .test("config_persistence", config_persistence)
}

fn source_discovery(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let stats = scan_sources(ctx.target_path(), &ctx.config().output_path)?;
    ensure!(
        stats.files_scanned > 0,
        "no source files found under {}",
        ctx.target_path().display()
    );
    ctx.logger().debug(format!(
        "discovered {} files, {} functions",
        stats.files_scanned, stats.functions_found
    ));

    Ok(TestPayload::new()
        .with("files_scanned", stats.files_scanned)
        .with("functions_found", stats.functions_found)
        .with("bytes_scanned", stats.bytes_scanned))
}

fn component_resolution(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let assessor = ComponentAssessor::from_config(ctx.config());
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    for spec in &ctx.config().components {
        match assessor.locate(spec) {
            Ok(path) => resolved.push(path.display().to_string()),
            Err(_) => unresolved.push(spec.name.clone()),
        }
    }
    ensure!(
        unresolved.is_empty(),
        "unresolved components: {}",
        unresolved.join(", ")
    );

    Ok(TestPayload::new()
        .with("components_resolved", resolved.len())
        .with("paths", resolved))
}

fn config_persistence(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let path = ctx.scratch_dir().join(vigil_core::DEFAULT_CONFIG_FILE);
    ctx.config().save(&path)?;
    let loaded = ValidationConfig::from_file(&path).context("reload saved configuration")?;
    ensure!(
        &loaded == ctx.config(),
        "configuration changed across a save/load cycle"
    );

    let bytes = std::fs::metadata(&path)?.len();
    Ok(TestPayload::new().with("config_bytes", bytes))
}

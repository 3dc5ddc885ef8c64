//! Compatibility phase: platform, paths, formats and encodings.

use vigil_core::{IssueFlag, PhaseKind, TestPayload, ValidationConfig};

use super::source_files;
use crate::phase::PhaseContext;
use crate::suite::TestSuite;

const SUPPORTED_FAMILIES: &[&str] = &["unix", "windows"];
const MAX_LISTED: usize = 10;

pub fn suite() -> TestSuite {
    TestSuite::new(PhaseKind::Compatibility)
        .test("platform_support", platform_support)
        .test("path_handling", path_handling)
        .test("serialization_formats", serialization_formats)
        .test("text_encoding", text_encoding)
}

fn platform_support(_ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let family = std::env::consts::FAMILY;
    Ok(TestPayload::new()
        .with("os", std::env::consts::OS)
        .with("arch", std::env::consts::ARCH)
        .with("family", family)
        .with_flag(
            IssueFlag::CompatibilityAcceptable,
            SUPPORTED_FAMILIES.contains(&family),
        ))
}

fn path_handling(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let nested = ctx
        .scratch_dir()
        .join("nested")
        .join("deeper still")
        .join("ünïcödé");
    let file = nested.join("données.txt");
    let content = "path check ✓";

    let outcome = std::fs::create_dir_all(&nested)
        .and_then(|_| std::fs::write(&file, content))
        .and_then(|_| std::fs::read_to_string(&file))
        .and_then(|back| file.canonicalize().map(|canon| (back, canon)));

    Ok(match outcome {
        Ok((back, canon)) => TestPayload::new()
            .with("path", canon.display().to_string())
            .with_flag(IssueFlag::CompatibilityAcceptable, back == content),
        Err(e) => TestPayload::new()
            .with("error", e.to_string())
            .with_flag(IssueFlag::CompatibilityAcceptable, false),
    })
}

fn serialization_formats(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let config = ctx.config();

    let json = serde_json::to_string(config)?;
    let json_ok = serde_json::from_str::<ValidationConfig>(&json).is_ok_and(|c| &c == config);

    let toml = config.to_toml_string()?;
    let toml_ok = ValidationConfig::from_toml_str(&toml).is_ok_and(|c| &c == config);

    // Inline tables instead of the pretty layout the config file uses.
    let compact = toml::to_string(config)?;
    let compact_ok = toml::from_str::<ValidationConfig>(&compact).is_ok_and(|c| &c == config);

    Ok(TestPayload::new()
        .with("json", json_ok)
        .with("toml", toml_ok)
        .with("toml_compact", compact_ok)
        .with_flag(
            IssueFlag::CompatibilityAcceptable,
            json_ok && toml_ok && compact_ok,
        ))
}

fn text_encoding(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let files = source_files(ctx.target_path(), &ctx.config().output_path);
    let mut non_utf8 = Vec::new();
    for path in &files {
        let bytes = std::fs::read(path)?;
        if std::str::from_utf8(&bytes).is_err() {
            non_utf8.push(path.display().to_string());
        }
    }

    let count = non_utf8.len();
    non_utf8.truncate(MAX_LISTED);
    Ok(TestPayload::new()
        .with("files_checked", files.len())
        .with("non_utf8_count", count)
        .with("non_utf8", non_utf8)
        .with_flag(IssueFlag::CompatibilityAcceptable, count == 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use vigil_core::Logger;

    fn ctx(config: ValidationConfig) -> PhaseContext {
        PhaseContext::new(
            "validation_test",
            PhaseKind::Compatibility,
            Arc::new(config),
            &Logger::silent(),
        )
        .expect("context")
    }

    #[test]
    fn test_non_utf8_source_is_an_issue() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ok.rs"), "fn ok() {}").expect("write");
        std::fs::write(dir.path().join("bad.rs"), [0x66u8, 0x6e, 0xff, 0xfe]).expect("write");
        let config = ValidationConfig {
            target_path: dir.path().to_path_buf(),
            ..ValidationConfig::default()
        };

        let result = suite().run_all(&ctx(config)).expect("suite");
        let case = &result.results["text_encoding"];
        assert!(case.success);
        assert_eq!(case.payload.get("non_utf8_count"), Some(&serde_json::json!(1)));
        assert!(case.has_issue());
    }

    #[test]
    fn test_formats_and_paths_pass() {
        let dir = tempdir().expect("tempdir");
        let config = ValidationConfig {
            target_path: dir.path().to_path_buf(),
            ..ValidationConfig::default()
        };
        let result = suite().run_all(&ctx(config)).expect("suite");
        assert!(!result.results["serialization_formats"].has_issue());
        assert!(!result.results["path_handling"].has_issue());
    }
    #[test]
    fn test_nested_config_survives_every_format() {
        let dir = tempdir().expect("tempdir");
        let mut config = ValidationConfig {
            target_path: dir.path().to_path_buf(),
            components: vec![vigil_core::ComponentSpec::new(
                "modèle_saver",
                vec!["src/modèle_saver.rs".into()],
            )
            .with_capabilities(["save", "export"])],
            ..ValidationConfig::default()
        };
        config.thresholds.extra.insert("max_export_time_sec".into(), 2.5);

        let case = serialization_formats(&ctx(config)).expect("payload");
        for key in ["json", "toml", "toml_compact"] {
            assert_eq!(case.get(key), Some(&serde_json::json!(true)), "{key}");
        }
    }
}

//! Performance phase: timed workloads against configured thresholds.

use std::hint::black_box;
use std::io::{Read, Write};
use std::time::Instant;

use anyhow::ensure;
use vigil_core::{IssueFlag, PhaseKind, TestPayload};

use crate::phase::PhaseContext;
use crate::suite::TestSuite;

/// `/proc/self/statm` reports pages; 4 KiB on every platform we read it on.
const PAGE_SIZE: u64 = 4096;
const MB: f64 = 1024.0 * 1024.0;

pub fn suite() -> TestSuite {
    TestSuite::new(PhaseKind::Performance)
        .test("math_operations", math_operations)
        .test("file_operations", file_operations)
        .test("memory_usage", memory_usage)
        .test("concurrent_operations", concurrent_operations)
}

fn timed_payload(elapsed_sec: f64, limit_sec: f64) -> TestPayload {
    TestPayload::new()
        .with("elapsed_sec", elapsed_sec)
        .with("threshold_sec", limit_sec)
        .with_flag(IssueFlag::PerformanceAcceptable, elapsed_sec <= limit_sec)
}

fn math_operations(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let iterations: u64 = if ctx.quick() { 100_000 } else { 1_000_000 };

    let start = Instant::now();
    let mut acc = 0.0f64;
    for i in 1..=iterations {
        let x = black_box(i as f64);
        acc += x.sqrt() * x.ln() + (x * 1e-3).sin();
    }
    let elapsed = start.elapsed().as_secs_f64();
    ensure!(acc.is_finite(), "math workload produced a non-finite result");

    Ok(timed_payload(elapsed, ctx.thresholds().max_math_time_sec).with("operations", iterations))
}

fn file_operations(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let files = if ctx.quick() { 20 } else { 100 };
    let block: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let dir = ctx.scratch_dir().join("file_ops");
    std::fs::create_dir_all(&dir)?;

    let start = Instant::now();
    for i in 0..files {
        let path = dir.join(format!("block_{i:04}.bin"));
        std::fs::File::create(&path)?.write_all(&block)?;

        let mut back = Vec::with_capacity(block.len());
        std::fs::File::open(&path)?.read_to_end(&mut back)?;
        ensure!(back == block, "read-back mismatch for {}", path.display());
        std::fs::remove_file(&path)?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    Ok(timed_payload(elapsed, ctx.thresholds().max_file_time_sec)
        .with("files", files)
        .with("bytes_per_file", block.len()))
}

/// Resident set size in bytes, where the platform exposes it.
fn resident_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * PAGE_SIZE)
}

fn memory_usage(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let megabytes: usize = if ctx.quick() { 16 } else { 64 };
    let limit_mb = ctx.thresholds().max_memory_increase_mb;

    let before = resident_bytes();
    let blocks: Vec<Vec<u8>> = (0..megabytes).map(|i| vec![i as u8; 1 << 20]).collect();
    let touched: u64 = blocks.iter().map(|b| u64::from(b[b.len() - 1])).sum();
    let after = resident_bytes();
    drop(black_box(blocks));

    let payload = TestPayload::new()
        .with("allocated_mb", megabytes)
        .with("checksum", touched)
        .with("threshold_mb", limit_mb);

    Ok(match (before, after) {
        (Some(before), Some(after)) => {
            let increase_mb = after.saturating_sub(before) as f64 / MB;
            payload
                .with("rss_available", true)
                .with("memory_increase_mb", increase_mb)
                .with_flag(IssueFlag::PerformanceAcceptable, increase_mb <= limit_mb)
        }
        _ => payload
            .with("rss_available", false)
            .with("memory_increase_mb", "unknown")
            .with_flag(IssueFlag::PerformanceAcceptable, true),
    })
}

/// Sum of squares over `range`, wrapping.
fn square_sum(range: std::ops::Range<u64>) -> u64 {
    range.fold(0u64, |acc, i| acc.wrapping_add(black_box(i).wrapping_mul(i)))
}

fn concurrent_operations(ctx: &PhaseContext) -> anyhow::Result<TestPayload> {
    let available = std::thread::available_parallelism().map_or(2, |n| n.get());
    let workers = available.clamp(2, if ctx.quick() { 4 } else { 8 });
    let items: u64 = if ctx.quick() { 400_000 } else { 4_000_000 };
    let chunk = items.div_ceil(workers as u64);

    let start = Instant::now();
    let partials: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers as u64)
            .map(|w| {
                let lo = (w * chunk).min(items);
                let hi = ((w + 1) * chunk).min(items);
                scope.spawn(move || square_sum(lo..hi))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect()
    });
    let elapsed = start.elapsed().as_secs_f64();

    let total = partials.iter().fold(0u64, |acc, p| acc.wrapping_add(*p));
    ensure!(
        total == square_sum(0..items),
        "concurrent workers disagree with the sequential result"
    );

    Ok(timed_payload(elapsed, ctx.thresholds().max_concurrent_time_sec)
        .with("workers", workers)
        .with("items", items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vigil_core::{Logger, ValidationConfig};

    fn ctx(config: ValidationConfig) -> PhaseContext {
        PhaseContext::new(
            "validation_test",
            PhaseKind::Performance,
            Arc::new(config),
            &Logger::silent(),
        )
        .expect("context")
    }

    fn quick() -> ValidationConfig {
        ValidationConfig {
            run_quick_tests: true,
            ..ValidationConfig::default()
        }
    }

    #[test]
    fn test_quick_suite_executes_every_test() {
        let result = suite().run_all(&ctx(quick())).expect("suite");
        assert_eq!(result.summary.total, 4);
        assert_eq!(result.summary.failed, 0);
        assert_eq!(
            result.results["concurrent_operations"].payload.get("workers").and_then(|v| v.as_u64()).map(|w| w >= 2),
            Some(true)
        );
    }

    #[test]
    fn test_zero_threshold_raises_issue_not_failure() {
        let mut config = quick();
        config.thresholds.max_math_time_sec = 0.0;
        let result = suite().run_all(&ctx(config)).expect("suite");

        let math = &result.results["math_operations"];
        assert!(math.success);
        assert_eq!(math.payload.flag(IssueFlag::PerformanceAcceptable), Some(false));
        assert!(!result.summary.overall_success);
    }

    #[test]
    fn test_square_sum_split_matches_whole() {
        assert_eq!(square_sum(0..10), 285);
        assert_eq!(
            square_sum(0..5).wrapping_add(square_sum(5..10)),
            square_sum(0..10)
        );
    }
}

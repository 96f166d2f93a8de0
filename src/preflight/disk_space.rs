//! Disk space check.
//!
//! Verifies sufficient disk space is available for packages and project
//! dependencies.

use super::CheckResult;
use crate::process::Cmd;
use std::path::Path;

/// Minimum required disk space in bytes (2 GB).
///
/// Breakdown:
/// - apt index + system packages: ~400 MB
/// - Poetry and its virtualenv: ~100 MB
/// - Project dependencies (polars et al.): ~1 GB
const MIN_DISK_SPACE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Check that sufficient disk space is available.
pub fn check_disk_space(root: &Path) -> CheckResult {
    let required_gb = MIN_DISK_SPACE_BYTES as f64 / (1024.0 * 1024.0 * 1024.0);

    match available_space(root) {
        Some(available) => {
            let available_gb = available as f64 / (1024.0 * 1024.0 * 1024.0);

            if available >= MIN_DISK_SPACE_BYTES {
                CheckResult::pass(
                    "Disk space",
                    format!("{:.1} GB available (need {:.1} GB)", available_gb, required_gb),
                )
            } else {
                CheckResult::fail(
                    "Disk space",
                    format!(
                        "Only {:.1} GB available, need {:.1} GB",
                        available_gb, required_gb
                    ),
                    "Free up disk space or raise the builder's disk limit",
                )
            }
        }
        None => CheckResult::fail(
            "Disk space",
            "Failed to check available disk space",
            "Ensure df command is available",
        ),
    }
}

/// Get available disk space in bytes.
pub fn available_space(path: &Path) -> Option<u64> {
    Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(path)
        .allow_fail()
        .run()
        .ok()
        .filter(|r| r.success())
        .and_then(|r| parse_df(&r.stdout))
}

/// Skip header line, get first number.
fn parse_df(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .nth(1)
        .and_then(|line| line.trim().parse::<u64>().ok())
}

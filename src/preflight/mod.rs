//! Preflight checks for provisioning prerequisites.
//!
//! This module validates that all prerequisites are met BEFORE touching the
//! image: a half-provisioned image has to be thrown away, so it's cheaper to
//! fail here.
//!
//! # Checks Performed
//!
//! - **Host tools**: apt-get and curl are installed
//! - **Network**: the installer URL is reachable
//! - **Disk space**: enough room for packages and project dependencies
//! - **Stamp**: reports whether the image was already provisioned
//!
//! # Usage
//!
//! ```rust,ignore
//! use devbox::preflight::PreflightChecker;
//!
//! let checker = PreflightChecker::new(config);
//! let report = checker.run_all().await;
//!
//! if !report.is_ok() {
//!     report.print_summary();
//!     std::process::exit(1);
//! }
//! ```

mod disk_space;
mod host_tools;
mod network;

pub use disk_space::{available_space, check_disk_space};
pub use host_tools::check_host_tools;
pub use network::check_network;

use crate::config::ProvisionConfig;
use crate::stamp::Stamp;

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
    /// Optional suggestion for fixing the issue
    pub suggestion: Option<String>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Print as a single status line plus suggestion.
    pub fn print(&self) {
        let status = if self.passed { "[OK]" } else { "[FAIL]" };
        println!("{} {}: {}", status, self.name, self.message);
        if let Some(suggestion) = &self.suggestion {
            println!("     Suggestion: {}", suggestion);
        }
    }
}

/// Comprehensive preflight report.
#[derive(Debug, Default)]
pub struct PreflightReport {
    /// All check results
    pub checks: Vec<CheckResult>,
    /// Existing completion stamp, if any
    pub stamp: Option<Stamp>,
}

impl PreflightReport {
    /// Check if all preflight checks passed.
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Get all failing checks.
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// Get count of passing checks.
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Get total check count.
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Print a summary of the preflight checks.
    pub fn print_summary(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            check.print();
        }

        println!();
        match &self.stamp {
            Some(stamp) => println!(
                "[provisioned]  {} steps, plan {}",
                stamp.steps,
                short_fingerprint(&stamp.fingerprint)
            ),
            None => println!("[fresh]  Image not provisioned yet"),
        }

        println!();
        if self.is_ok() {
            println!("All preflight checks passed ({}/{})", self.passed_count(), self.total_count());
        } else {
            println!(
                "Preflight checks failed: {} of {} passed",
                self.passed_count(),
                self.total_count()
            );
        }
    }
}

/// Preflight checker for provisioning prerequisites.
pub struct PreflightChecker {
    config: ProvisionConfig,
}

impl PreflightChecker {
    /// Create a new preflight checker.
    pub fn new(config: ProvisionConfig) -> Self {
        Self { config }
    }

    /// Run all preflight checks and return a comprehensive report.
    pub async fn run_all(&self) -> PreflightReport {
        let mut report = PreflightReport::default();

        report.checks.extend(check_host_tools());
        report.checks.push(check_disk_space(&self.config.root));
        report.checks.push(check_network(&self.config.installer_url).await);

        report.stamp = match Stamp::read(&self.config.stamp_path()) {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!("ignoring unreadable stamp: {:#}", e);
                None
            }
        };

        report
    }
}

/// Leading 12 characters of a fingerprint, or all of it if shorter.
fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

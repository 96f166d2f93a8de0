//! Host tool validation.
//!
//! Only the tools the provisioner itself shells out to before step 3 are
//! required; everything else is installed by the plan.

use super::CheckResult;
use crate::process::which;

/// Required host tools with their install suggestions.
const REQUIRED_TOOLS: &[(&str, &str, &str)] = &[
    ("apt-get", "Refresh index, install packages", "Use a Debian/Ubuntu base image"),
    ("curl", "Download the installer", "apt-get install -y curl"),
    ("df", "Check disk space", "apt-get install -y coreutils"),
];

/// Check that all required host tools are installed.
pub fn check_host_tools() -> Vec<CheckResult> {
    REQUIRED_TOOLS
        .iter()
        .map(|(tool, purpose, install)| check_tool(tool, purpose, install))
        .collect()
}

fn check_tool(tool: &str, purpose: &str, install_cmd: &str) -> CheckResult {
    match which(tool) {
        Some(path) => CheckResult::pass(
            format!("{} tool", tool),
            format!("Found at {} ({})", path.display(), purpose),
        ),
        None => CheckResult::fail(
            format!("{} tool", tool),
            format!("Not found (needed for: {})", purpose),
            install_cmd,
        ),
    }
}

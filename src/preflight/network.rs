//! Network connectivity check.
//!
//! Verifies the installer host is reachable before any step needs it.

use super::CheckResult;

/// Check network connectivity to the installer URL.
///
/// Performs a HEAD request through curl.
pub async fn check_network(url: &str) -> CheckResult {
    let result = tokio::process::Command::new("curl")
        .args([
            "--head",           // HEAD request only
            "--silent",         // No progress output
            "--fail",           // Fail on HTTP errors
            "--location",       // Follow redirects
            "--max-time", "10", // 10 second timeout
            "--output", "/dev/null",
            url,
        ])
        .output()
        .await;

    let host = url_host(url);
    match result {
        Ok(output) if output.status.success() => {
            CheckResult::pass("Network", format!("Installer host reachable ({})", host))
        }
        Ok(_) => CheckResult::fail(
            "Network",
            format!("Installer host unreachable ({})", host),
            "Check your internet connection or set DEVBOX_INSTALLER_URL to a mirror",
        ),
        Err(e) => CheckResult::fail(
            "Network",
            format!("Failed to check network: {}", e),
            "Ensure curl is installed and you have network access",
        ),
    }
}

/// Extract just the host from a URL for display.
fn url_host(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_host() {
        assert_eq!(url_host("https://install.python-poetry.org"), "install.python-poetry.org");
        assert_eq!(url_host("http://mirror.local:8080/poetry/install.py"), "mirror.local:8080");
        assert_eq!(url_host("example.com/path"), "example.com");
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        // Port 9 (discard) on loopback refuses connections.
        let result = check_network("http://127.0.0.1:9/").await;
        assert_eq!(result.name, "Network");
        assert!(!result.passed);
    }
}

//! Post-provisioning verification.
//!
//! Checks what every successful build must leave behind: the working
//! directory, the dependency tool on the search path, and the persisted
//! environment variable.

use crate::config::ProvisionConfig;
use crate::context::ProvisionContext;
use crate::preflight::CheckResult;
use crate::process::{Cmd, Runner};
use crate::profile;
use crate::stamp::Stamp;

/// Run every verification check.
pub fn verify(config: &ProvisionConfig, runner: &dyn Runner) -> Vec<CheckResult> {
    vec![
        check_stamp(config),
        check_workdir(config),
        check_tool(config, runner),
        check_path_export(config),
        check_env(config),
    ]
}

fn check_stamp(config: &ProvisionConfig) -> CheckResult {
    let path = config.stamp_path();
    match Stamp::read(&path) {
        Ok(Some(stamp)) if stamp == Stamp::for_config(config) => {
            CheckResult::pass("Stamp", format!("{} steps applied", stamp.steps))
        }
        Ok(Some(_)) => CheckResult::fail(
            "Stamp",
            "Provisioned with a different plan",
            "Run 'devbox provision --force' or rebuild from the base image",
        ),
        Ok(None) => CheckResult::fail(
            "Stamp",
            format!("Not provisioned ({} missing)", path.display()),
            "Run 'devbox provision'",
        ),
        Err(e) => CheckResult::fail("Stamp", format!("{:#}", e), "Rebuild from the base image"),
    }
}

fn check_workdir(config: &ProvisionConfig) -> CheckResult {
    let dir = config.workdir_path();
    if dir.is_dir() {
        CheckResult::pass("Working directory", format!("{} exists", config.workdir.display()))
    } else {
        CheckResult::fail(
            "Working directory",
            format!("{} does not exist", dir.display()),
            "Run 'devbox provision'",
        )
    }
}

/// The tool must resolve via the extended search path and answer `--version`.
fn check_tool(config: &ProvisionConfig, runner: &dyn Runner) -> CheckResult {
    let name = format!("{} tool", config.tool);

    let mut ctx = ProvisionContext::new(config, runner);
    ctx.prepend_path(config.tool_bin_path());

    let Some(binary) = ctx.which(&config.tool) else {
        return CheckResult::fail(
            name,
            format!("Not found in {} or on PATH", config.tool_bin_dir.display()),
            "Re-run the installer step ('devbox provision --force')",
        );
    };

    let cmd = Cmd::new(binary.to_string_lossy().into_owned()).arg("--version");
    match ctx.run(&cmd) {
        Ok(result) => {
            let version = result.stdout.lines().next().unwrap_or("").trim().to_string();
            CheckResult::pass(name, format!("{} ({})", version, binary.display()))
        }
        Err(e) => CheckResult::fail(
            name,
            format!("{} --version failed: {:#}", binary.display(), e),
            "Re-run the installer step ('devbox provision --force')",
        ),
    }
}

fn check_path_export(config: &ProvisionConfig) -> CheckResult {
    let expected = format!("{}:$PATH", config.tool_bin_dir.display());
    match profile::exported_value(&config.profile_path(), "PATH") {
        Ok(Some(value)) if value == expected => {
            CheckResult::pass("PATH export", format!("PATH={}", value))
        }
        Ok(_) => CheckResult::fail(
            "PATH export",
            format!("{} not on exported PATH", config.tool_bin_dir.display()),
            "Run 'devbox provision'",
        ),
        Err(e) => CheckResult::fail("PATH export", format!("{:#}", e), "Run 'devbox provision'"),
    }
}

fn check_env(config: &ProvisionConfig) -> CheckResult {
    let name = format!("{} variable", config.env_name);
    match profile::exported_value(&config.profile_path(), &config.env_name) {
        Ok(Some(value)) if value == config.env_value => {
            CheckResult::pass(name, format!("{}={}", config.env_name, value))
        }
        Ok(Some(value)) => CheckResult::fail(
            name,
            format!("Expected {:?}, found {:?}", config.env_value, value),
            "Rebuild from the base image",
        ),
        Ok(None) => CheckResult::fail(name, "Not exported", "Run 'devbox provision'"),
        Err(e) => CheckResult::fail(name, format!("{:#}", e), "Run 'devbox provision'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::provision;
    use crate::testing::RecordingRunner;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn install_fake_tool(config: &ProvisionConfig) {
        let bin = config.tool_bin_path();
        fs::create_dir_all(&bin).unwrap();
        let tool = bin.join(&config.tool);
        fs::write(&tool, "#!/bin/sh\necho 'Poetry (version 1.8.3)'\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_bare_root_fails() {
        let dir = tempdir().unwrap();
        let config = ProvisionConfig {
            root: dir.path().to_path_buf(),
            tool: "definitely_not_a_real_command_12345".into(),
            ..Default::default()
        };
        let runner = RecordingRunner::new();

        let checks = verify(&config, &runner);
        assert_eq!(checks.len(), 5);
        assert!(checks.iter().all(|c| !c.passed));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_provisioned_root_passes() {
        let dir = tempdir().unwrap();
        let config = ProvisionConfig {
            root: dir.path().to_path_buf(),
            skip_base_check: true,
            ..Default::default()
        };
        let runner = RecordingRunner::new();
        provision(&config, &runner, false).unwrap();
        install_fake_tool(&config);

        let checks = verify(&config, &runner);
        for check in &checks {
            assert!(check.passed, "{}: {}", check.name, check.message);
        }

        let last = runner.commands().pop().unwrap();
        assert_eq!(last.get_args(), ["--version"]);
        assert_eq!(
            last.program(),
            config.tool_bin_path().join("poetry").to_string_lossy()
        );
    }

    #[test]
    fn test_tool_version_failure() {
        let dir = tempdir().unwrap();
        let config = ProvisionConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        install_fake_tool(&config);
        let program = config.tool_bin_path().join("poetry").to_string_lossy().into_owned();
        let runner = RecordingRunner::new().fail_on(&program);

        let check = check_tool(&config, &runner);
        assert!(!check.passed);
        assert!(check.message.contains("--version failed"));
    }

    #[test]
    fn test_changed_env_value_fails() {
        let dir = tempdir().unwrap();
        let config = ProvisionConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        profile::ensure_line(
            &config.profile_path(),
            &profile::export_line(&config.env_name, "no"),
        )
        .unwrap();

        let check = check_env(&config);
        assert!(!check.passed);
        assert!(check.message.contains("Expected \"yes\""));
    }
}

//! Step executor - interprets [`Step`] variants and performs the actual work.
//!
//! This is the single place where provisioning operations are implemented.
//! Every step either succeeds or returns an error; there is no retry and
//! nothing is undone on failure.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::context::ProvisionContext;
use crate::plan::Step;
use crate::profile;

/// Non-interactive frontend for apt.
const APT_FRONTEND: (&str, &str) = ("DEBIAN_FRONTEND", "noninteractive");

/// Execute a single step.
pub fn execute_step(ctx: &mut ProvisionContext<'_>, step: &Step) -> Result<()> {
    match step {
        Step::BaseImage { distro, version } => check_base_image(ctx, distro, version),

        Step::RefreshIndex => {
            let cmd = ctx
                .command("apt-get")
                .arg("update")
                .env(APT_FRONTEND.0, APT_FRONTEND.1)
                .inherit_output();
            ctx.run(&cmd)?;
            Ok(())
        }

        Step::InstallPackages(packages) => {
            if packages.is_empty() {
                println!("  [SKIP] No packages to install");
                return Ok(());
            }
            let cmd = ctx
                .command("apt-get")
                .args(["install", "-y", "--no-install-recommends"])
                .args(packages.iter().cloned())
                .env(APT_FRONTEND.0, APT_FRONTEND.1)
                .inherit_output();
            ctx.run(&cmd)?;
            Ok(())
        }

        Step::WorkDir(dir) => {
            let host_dir = ctx.config.in_root(dir);
            fs::create_dir_all(&host_dir)
                .with_context(|| format!("creating {}", host_dir.display()))?;
            println!("  Working directory: {}", dir.display());
            ctx.set_cwd(host_dir);
            Ok(())
        }

        Step::RunInstaller { url, interpreter } => run_installer(ctx, url, interpreter),

        Step::ExtendPath(dir) => {
            let host_dir = ctx.config.in_root(dir);
            ctx.prepend_path(host_dir);
            profile::ensure_line(&ctx.config.profile_path(), &profile::path_line(dir))?;
            Ok(())
        }

        Step::InstallDependencies { tool, args } => {
            let cmd = ctx
                .command(tool)
                .args(args.iter().cloned())
                .inherit_output();
            ctx.run(&cmd)?;
            Ok(())
        }

        Step::SetEnv { name, value } => {
            let profile_path = ctx.config.profile_path();
            profile::ensure_line(&profile_path, &profile::export_line(name, value))?;
            println!("  {}={} ({})", name, value, profile_path.display());
            Ok(())
        }
    }
}

/// Compare os-release against the expected base image.
fn check_base_image(ctx: &ProvisionContext<'_>, distro: &str, version: &str) -> Result<()> {
    if ctx.config.skip_base_check {
        tracing::warn!("base image check skipped (expected {}:{})", distro, version);
        println!("  [SKIP] Base image check disabled");
        return Ok(());
    }

    let os_release = ctx.config.in_root(Path::new("/etc/os-release"));
    let fields = read_os_release(&os_release)?;
    let id = fields.get("ID").map(String::as_str).unwrap_or("");
    let version_id = fields.get("VERSION_ID").map(String::as_str).unwrap_or("");

    if id != distro || version_id != version {
        bail!(
            "base image mismatch: expected {}:{}, found {}:{} ({})",
            distro,
            version,
            if id.is_empty() { "?" } else { id },
            if version_id.is_empty() { "?" } else { version_id },
            os_release.display()
        );
    }

    println!("  Base image: {}:{}", id, version_id);
    Ok(())
}

/// Parse an os-release file into key/value pairs.
fn read_os_release(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading {} (is this the expected base image?)", path.display()))?;
    Ok(parse_os_release(&content))
}

fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Download the installer script, then run it.
///
/// A failed download aborts before anything is executed.
fn run_installer(ctx: &ProvisionContext<'_>, url: &str, interpreter: &str) -> Result<()> {
    let state_dir = ctx.config.in_root(&ctx.config.state_dir);
    fs::create_dir_all(&state_dir)
        .with_context(|| format!("creating {}", state_dir.display()))?;
    let script = state_dir.join("installer");

    println!("  Fetching {}", url);
    let fetch = ctx
        .command("curl")
        .args(["-sSL", "--fail", "--output"])
        .arg_path(&script)
        .arg(url);
    ctx.run(&fetch).with_context(|| format!("downloading installer from {}", url))?;

    let install = ctx.command(interpreter).arg_path(&script).inherit_output();
    let result = ctx.run(&install);

    if let Err(e) = fs::remove_file(&script) {
        tracing::debug!("leaving installer at {}: {}", script.display(), e);
    }

    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvisionConfig;
    use crate::testing::RecordingRunner;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config_in(root: &Path) -> ProvisionConfig {
        ProvisionConfig {
            root: root.to_path_buf(),
            ..Default::default()
        }
    }

    fn write_os_release(root: &Path, content: &str) {
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("etc/os-release"), content).unwrap();
    }

    #[test]
    fn test_parse_os_release() {
        let fields = parse_os_release(
            "# comment\nNAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"22.04\"\nID_LIKE='debian'\n\n",
        );
        assert_eq!(fields["NAME"], "Ubuntu");
        assert_eq!(fields["ID"], "ubuntu");
        assert_eq!(fields["VERSION_ID"], "22.04");
        assert_eq!(fields["ID_LIKE"], "debian");
    }

    #[test]
    fn test_base_image_matches() {
        let dir = tempdir().unwrap();
        write_os_release(dir.path(), "ID=ubuntu\nVERSION_ID=\"22.04\"\n");
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::BaseImage {
            distro: "ubuntu".into(),
            version: "22.04".into(),
        };
        execute_step(&mut ctx, &step).unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_base_image_mismatch() {
        let dir = tempdir().unwrap();
        write_os_release(dir.path(), "ID=debian\nVERSION_ID=\"12\"\n");
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::BaseImage {
            distro: "ubuntu".into(),
            version: "22.04".into(),
        };
        let err = execute_step(&mut ctx, &step).unwrap_err();
        assert!(err.to_string().contains("expected ubuntu:22.04, found debian:12"));
    }

    #[test]
    fn test_base_image_missing_os_release() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::BaseImage {
            distro: "ubuntu".into(),
            version: "22.04".into(),
        };
        assert!(execute_step(&mut ctx, &step).is_err());
    }

    #[test]
    fn test_base_image_skip() {
        let dir = tempdir().unwrap();
        let config = ProvisionConfig {
            skip_base_check: true,
            ..config_in(dir.path())
        };
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::BaseImage {
            distro: "ubuntu".into(),
            version: "22.04".into(),
        };
        execute_step(&mut ctx, &step).unwrap();
    }

    #[test]
    fn test_install_packages_command() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::InstallPackages(vec!["git".into(), "curl".into()]);
        execute_step(&mut ctx, &step).unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].to_string(),
            "apt-get install -y --no-install-recommends git curl"
        );
        assert_eq!(commands[0].get_env("DEBIAN_FRONTEND"), Some("noninteractive"));
    }

    #[test]
    fn test_install_no_packages_runs_nothing() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        execute_step(&mut ctx, &Step::InstallPackages(vec![])).unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_workdir_created_and_entered() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        execute_step(&mut ctx, &Step::WorkDir(PathBuf::from("/workspace"))).unwrap();

        let workdir = dir.path().join("workspace");
        assert!(workdir.is_dir());
        assert_eq!(ctx.cwd(), workdir.as_path());
    }

    #[test]
    fn test_installer_fetch_failure_skips_execution() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new().fail_on("curl");
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::RunInstaller {
            url: "https://install.python-poetry.org".into(),
            interpreter: "python3".into(),
        };
        let err = execute_step(&mut ctx, &step).unwrap_err();
        assert!(format!("{:#}", err).contains("downloading installer"));
        assert_eq!(runner.programs(), ["curl"]);
    }

    #[test]
    fn test_installer_runs_downloaded_script() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::RunInstaller {
            url: "https://install.python-poetry.org".into(),
            interpreter: "python3".into(),
        };
        execute_step(&mut ctx, &step).unwrap();

        let commands = runner.commands();
        let script = dir.path().join("var/lib/devbox/installer");
        assert_eq!(runner.programs(), ["curl", "python3"]);
        assert!(commands[0].get_args().contains(&"https://install.python-poetry.org".to_string()));
        assert_eq!(commands[1].get_args(), [script.to_string_lossy().into_owned()]);
    }

    #[test]
    fn test_extend_path_affects_later_commands() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        execute_step(&mut ctx, &Step::ExtendPath(PathBuf::from("/root/.local/bin"))).unwrap();
        let step = Step::InstallDependencies {
            tool: "poetry".into(),
            args: vec!["install".into()],
        };
        execute_step(&mut ctx, &step).unwrap();

        let expected = format!("{}:/bin", dir.path().join("root/.local/bin").display());
        assert_eq!(runner.commands()[0].get_env("PATH"), Some(expected.as_str()));

        let exported = profile::exported_value(&config.profile_path(), "PATH").unwrap();
        assert_eq!(exported.as_deref(), Some("/root/.local/bin:$PATH"));
    }

    #[test]
    fn test_set_env_persists_literal_value() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = RecordingRunner::new();
        let mut ctx = ProvisionContext::with_base_path(&config, &runner, "/bin");

        let step = Step::SetEnv {
            name: "force_color_prompt".into(),
            value: "yes".into(),
        };
        execute_step(&mut ctx, &step).unwrap();

        let value = profile::exported_value(&config.profile_path(), "force_color_prompt").unwrap();
        assert_eq!(value.as_deref(), Some("yes"));
    }
}

//! Provisioning configuration.
//!
//! All parameters are baked in as constants. A handful of paths and the
//! package list can be overridden through environment variables.
//!
//! `DEVBOX_ROOT` only relocates the files devbox reads and writes itself:
//! the working directory, the profile snippet, the stamp, the installer
//! download and the os-release lookup. apt-get, the installer and poetry
//! still act on the host filesystem, so a relocated root is for tests and
//! dry inspection, not for provisioning a separate tree.
//!
//! # Environment Variables
//!
//! - `DEVBOX_ROOT`: Prefix for devbox's own state files (default `/`)
//! - `DEVBOX_WORKDIR`: Working directory inside the root
//! - `DEVBOX_INSTALLER_URL`: Override URL for the Poetry installer
//! - `DEVBOX_PACKAGES`: Whitespace-separated system package list
//! - `DEVBOX_SKIP_BASE_CHECK`: Skip the os-release comparison

use std::env;
use std::path::{Path, PathBuf};

/// Base image distribution ID (as reported by os-release `ID`).
pub const BASE_DISTRO: &str = "ubuntu";

/// Base image version (as reported by os-release `VERSION_ID`).
pub const BASE_VERSION: &str = "22.04";

/// System packages installed in step 3.
///
/// Packaging tool, version-control client, transfer client, archive utility.
pub const SYSTEM_PACKAGES: &[&str] = &["python3-pip", "git", "curl", "unzip"];

/// Working directory for the project.
pub const WORKDIR: &str = "/workspace";

/// Poetry installer script.
pub const INSTALLER_URL: &str = "https://install.python-poetry.org";

/// Interpreter the installer script is fed to.
pub const INSTALLER_INTERPRETER: &str = "python3";

/// Where the installer places the `poetry` binary.
pub const TOOL_BIN_DIR: &str = "/root/.local/bin";

/// Dependency-management tool.
pub const TOOL_NAME: &str = "poetry";

/// Arguments for the dependency restore.
pub const TOOL_INSTALL_ARGS: &[&str] = &["install"];

/// Shell prompt coloring switch read by the stock bashrc.
pub const PROMPT_ENV: (&str, &str) = ("force_color_prompt", "yes");

/// Profile snippet holding persisted exports, relative to the root.
pub const PROFILE_FILE: &str = "etc/profile.d/devbox.sh";

/// State directory for the completion stamp, relative to the root.
pub const STATE_DIR: &str = "var/lib/devbox";

pub const ROOT_ENV: &str = "DEVBOX_ROOT";
pub const WORKDIR_ENV: &str = "DEVBOX_WORKDIR";
pub const INSTALLER_URL_ENV: &str = "DEVBOX_INSTALLER_URL";
pub const PACKAGES_ENV: &str = "DEVBOX_PACKAGES";
pub const SKIP_BASE_CHECK_ENV: &str = "DEVBOX_SKIP_BASE_CHECK";

/// Everything a provisioning run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Prefix for devbox's own files. Child commands are not confined to it.
    pub root: PathBuf,
    /// Expected os-release `ID`.
    pub distro: String,
    /// Expected os-release `VERSION_ID`.
    pub version: String,
    /// Skip comparing os-release against `distro`/`version`.
    pub skip_base_check: bool,
    /// System packages to install.
    pub packages: Vec<String>,
    /// Absolute working directory (inside the root).
    pub workdir: PathBuf,
    /// Remote installer script URL.
    pub installer_url: String,
    /// Program that executes the installer script.
    pub installer_interpreter: String,
    /// Directory prepended to `PATH` after the installer ran.
    pub tool_bin_dir: PathBuf,
    /// Dependency tool binary name.
    pub tool: String,
    /// Arguments for the dependency restore.
    pub tool_args: Vec<String>,
    /// Name of the persisted environment variable.
    pub env_name: String,
    /// Value of the persisted environment variable.
    pub env_value: String,
    /// Profile snippet (relative to the root).
    pub profile_file: PathBuf,
    /// State directory (relative to the root).
    pub state_dir: PathBuf,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            distro: BASE_DISTRO.to_string(),
            version: BASE_VERSION.to_string(),
            skip_base_check: false,
            packages: SYSTEM_PACKAGES.iter().map(|p| p.to_string()).collect(),
            workdir: PathBuf::from(WORKDIR),
            installer_url: INSTALLER_URL.to_string(),
            installer_interpreter: INSTALLER_INTERPRETER.to_string(),
            tool_bin_dir: PathBuf::from(TOOL_BIN_DIR),
            tool: TOOL_NAME.to_string(),
            tool_args: TOOL_INSTALL_ARGS.iter().map(|a| a.to_string()).collect(),
            env_name: PROMPT_ENV.0.to_string(),
            env_value: PROMPT_ENV.1.to_string(),
            profile_file: PathBuf::from(PROFILE_FILE),
            state_dir: PathBuf::from(STATE_DIR),
        }
    }
}

impl ProvisionConfig {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults with overrides from an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(root) = lookup(ROOT_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!("{} override: {}", ROOT_ENV, root);
            config.root = PathBuf::from(root);
        }
        if let Some(workdir) = lookup(WORKDIR_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!("{} override: {}", WORKDIR_ENV, workdir);
            config.workdir = PathBuf::from(workdir);
        }
        if let Some(url) = lookup(INSTALLER_URL_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!("{} override: {}", INSTALLER_URL_ENV, url);
            config.installer_url = url;
        }
        if let Some(packages) = lookup(PACKAGES_ENV) {
            let packages: Vec<String> = packages.split_whitespace().map(String::from).collect();
            if !packages.is_empty() {
                tracing::debug!("{} override: {:?}", PACKAGES_ENV, packages);
                config.packages = packages;
            }
        }
        config.skip_base_check = lookup(SKIP_BASE_CHECK_ENV).is_some_and(|v| !v.is_empty());

        config
    }

    /// Resolve an absolute in-image path against the root.
    ///
    /// `/workspace` with root `/tmp/x` becomes `/tmp/x/workspace`.
    pub fn in_root(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }

    /// Working directory on the host side.
    pub fn workdir_path(&self) -> PathBuf {
        self.in_root(&self.workdir)
    }

    /// Tool bin directory on the host side.
    pub fn tool_bin_path(&self) -> PathBuf {
        self.in_root(&self.tool_bin_dir)
    }

    /// Profile snippet on the host side.
    pub fn profile_path(&self) -> PathBuf {
        self.in_root(&self.profile_file)
    }

    /// Completion stamp on the host side.
    pub fn stamp_path(&self) -> PathBuf {
        self.in_root(&self.state_dir).join("provisioned")
    }

    /// Base image reference, e.g. `ubuntu:22.04`.
    pub fn base_image(&self) -> String {
        format!("{}:{}", self.distro, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProvisionConfig::default();
        assert_eq!(config.base_image(), "ubuntu:22.04");
        assert_eq!(config.packages, vec!["python3-pip", "git", "curl", "unzip"]);
        assert_eq!(config.workdir, PathBuf::from("/workspace"));
        assert_eq!(config.env_name, "force_color_prompt");
        assert_eq!(config.env_value, "yes");
        assert!(!config.skip_base_check);
    }

    #[test]
    fn test_overrides() {
        let config = ProvisionConfig::from_lookup(lookup(&[
            (ROOT_ENV, "/tmp/image"),
            (WORKDIR_ENV, "/src"),
            (PACKAGES_ENV, "git  curl"),
            (SKIP_BASE_CHECK_ENV, "1"),
        ]));
        assert_eq!(config.root, PathBuf::from("/tmp/image"));
        assert_eq!(config.workdir, PathBuf::from("/src"));
        assert_eq!(config.packages, vec!["git", "curl"]);
        assert!(config.skip_base_check);
        assert_eq!(config.installer_url, INSTALLER_URL);
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let config = ProvisionConfig::from_lookup(lookup(&[
            (ROOT_ENV, ""),
            (PACKAGES_ENV, "   "),
            (SKIP_BASE_CHECK_ENV, ""),
        ]));
        assert_eq!(config, ProvisionConfig::default());
    }

    #[test]
    fn test_in_root() {
        let config = ProvisionConfig {
            root: PathBuf::from("/tmp/x"),
            ..Default::default()
        };
        assert_eq!(config.workdir_path(), PathBuf::from("/tmp/x/workspace"));
        assert_eq!(config.tool_bin_path(), PathBuf::from("/tmp/x/root/.local/bin"));
        assert_eq!(config.profile_path(), PathBuf::from("/tmp/x/etc/profile.d/devbox.sh"));
        assert_eq!(config.stamp_path(), PathBuf::from("/tmp/x/var/lib/devbox/provisioned"));
    }
}

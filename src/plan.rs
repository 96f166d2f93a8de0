//! The provisioning plan.
//!
//! A plan is the fixed, ordered list of steps applied to a fresh base image.
//! Each step is a hard dependency on the previous one. The executor
//! interprets steps; this module only describes them.
//!
//! | # | Step                | Dockerfile equivalent                  |
//! |---|---------------------|----------------------------------------|
//! | 1 | Base image          | `FROM ubuntu:22.04`                    |
//! | 2 | Refresh index       | `RUN apt-get update`                   |
//! | 3 | Install packages    | `RUN apt-get install -y ...`           |
//! | 4 | Working directory   | `WORKDIR /workspace`                   |
//! | 5 | Run installer       | `RUN curl -sSL ... \| python3 -`       |
//! | 6 | Extend PATH         | `ENV PATH="/root/.local/bin:$PATH"`    |
//! | 7 | Install dependencies| `RUN poetry install`                   |
//! | 8 | Set environment     | `ENV force_color_prompt=yes`           |

use std::fmt;
use std::path::PathBuf;

use crate::config::ProvisionConfig;

/// A single provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Confirm the running system is the expected base image.
    BaseImage { distro: String, version: String },
    /// Refresh the system package index.
    RefreshIndex,
    /// Install system packages non-interactively.
    InstallPackages(Vec<String>),
    /// Create and enter the working directory.
    WorkDir(PathBuf),
    /// Download the installer script and feed it to the interpreter.
    RunInstaller { url: String, interpreter: String },
    /// Prepend a directory to the executable search path.
    ExtendPath(PathBuf),
    /// Run the dependency tool inside the working directory.
    InstallDependencies { tool: String, args: Vec<String> },
    /// Persist one environment variable.
    SetEnv { name: String, value: String },
}

impl Step {
    /// Short human label.
    pub fn label(&self) -> &'static str {
        match self {
            Step::BaseImage { .. } => "base image",
            Step::RefreshIndex => "refresh package index",
            Step::InstallPackages(_) => "install packages",
            Step::WorkDir(_) => "working directory",
            Step::RunInstaller { .. } => "install dependency tool",
            Step::ExtendPath(_) => "extend PATH",
            Step::InstallDependencies { .. } => "install project dependencies",
            Step::SetEnv { .. } => "set environment",
        }
    }

    /// Whether the step needs network access.
    pub fn needs_network(&self) -> bool {
        matches!(
            self,
            Step::RefreshIndex
                | Step::InstallPackages(_)
                | Step::RunInstaller { .. }
                | Step::InstallDependencies { .. }
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::BaseImage { distro, version } => write!(f, "base image {}:{}", distro, version),
            Step::RefreshIndex => write!(f, "apt-get update"),
            Step::InstallPackages(packages) => {
                write!(f, "apt-get install -y {}", packages.join(" "))
            }
            Step::WorkDir(dir) => write!(f, "workdir {}", dir.display()),
            Step::RunInstaller { url, interpreter } => {
                write!(f, "curl -sSL {} | {} -", url, interpreter)
            }
            Step::ExtendPath(dir) => write!(f, "PATH={}:$PATH", dir.display()),
            Step::InstallDependencies { tool, args } => {
                write!(f, "{}", tool)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Step::SetEnv { name, value } => write!(f, "{}={}", name, value),
        }
    }
}

/// Build the ordered step list for a config.
pub fn build_plan(config: &ProvisionConfig) -> Vec<Step> {
    vec![
        Step::BaseImage {
            distro: config.distro.clone(),
            version: config.version.clone(),
        },
        Step::RefreshIndex,
        Step::InstallPackages(config.packages.clone()),
        Step::WorkDir(config.workdir.clone()),
        Step::RunInstaller {
            url: config.installer_url.clone(),
            interpreter: config.installer_interpreter.clone(),
        },
        Step::ExtendPath(config.tool_bin_dir.clone()),
        Step::InstallDependencies {
            tool: config.tool.clone(),
            args: config.tool_args.clone(),
        },
        Step::SetEnv {
            name: config.env_name.clone(),
            value: config.env_value.clone(),
        },
    ]
}

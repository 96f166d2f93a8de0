//! Provisioning context shared across all steps.
//!
//! Steps mutate the environment later steps run in: the working directory
//! becomes the cwd of every subsequent command and the tool's bin directory
//! is prepended to `PATH`. The context tracks both and stamps them onto each
//! [`Cmd`] it hands out.

use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ProvisionConfig;
use crate::process::{which_in, Cmd, CommandResult, Runner};

/// Fallback search path when the process has none.
const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Mutable state threaded through a provisioning run.
pub struct ProvisionContext<'a> {
    pub config: &'a ProvisionConfig,
    runner: &'a dyn Runner,
    /// Directory commands run in. Starts at the root, moves after step 4.
    cwd: PathBuf,
    /// Directories prepended to `PATH`, most recent first.
    path_prefix: Vec<PathBuf>,
    /// Inherited search path.
    base_path: OsString,
}

impl<'a> ProvisionContext<'a> {
    /// Create a context inheriting the process `PATH`.
    pub fn new(config: &'a ProvisionConfig, runner: &'a dyn Runner) -> Self {
        let base_path = std::env::var_os("PATH").unwrap_or_else(|| DEFAULT_PATH.into());
        Self::with_base_path(config, runner, base_path)
    }

    /// Create a context with an explicit base search path.
    pub fn with_base_path(
        config: &'a ProvisionConfig,
        runner: &'a dyn Runner,
        base_path: impl Into<OsString>,
    ) -> Self {
        Self {
            config,
            runner,
            cwd: config.root.clone(),
            path_prefix: Vec::new(),
            base_path: base_path.into(),
        }
    }

    /// Current command working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, dir: impl Into<PathBuf>) {
        self.cwd = dir.into();
    }

    /// Prepend a directory to the search path of later commands.
    pub fn prepend_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.path_prefix.contains(&dir) {
            self.path_prefix.insert(0, dir);
        }
    }

    /// The `PATH` later commands see.
    pub fn search_path(&self) -> OsString {
        let base = std::env::split_paths(&self.base_path);
        let dirs: Vec<PathBuf> = self.path_prefix.iter().cloned().chain(base).collect();
        // Only fails on a segment containing ':', which split_paths never yields.
        std::env::join_paths(dirs).unwrap_or_else(|_| self.base_path.clone())
    }

    /// Resolve a program against the current search path.
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        which_in(program, &self.search_path())
    }

    /// A command pre-configured with the current cwd and `PATH`.
    pub fn command(&self, program: &str) -> Cmd {
        Cmd::new(program)
            .current_dir(&self.cwd)
            .env("PATH", self.search_path().to_string_lossy().into_owned())
    }

    /// Execute a command through the context's runner.
    pub fn run(&self, cmd: &Cmd) -> Result<CommandResult> {
        tracing::debug!("run: {} (cwd {})", cmd, self.cwd.display());
        self.runner.run(cmd)
    }
}

//! Completion stamp.
//!
//! Written after every step succeeded. It records a fingerprint of the plan
//! so `status` can tell whether the image was provisioned with the current
//! configuration, and `provision` can refuse to re-run the installer.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::config::ProvisionConfig;
use crate::plan::build_plan;
use crate::render;

/// Contents of a completion stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    /// SHA-256 of the rendered plan.
    pub fingerprint: String,
    /// Number of steps applied.
    pub steps: usize,
}

impl Stamp {
    /// Stamp for the plan of a config.
    pub fn for_config(config: &ProvisionConfig) -> Self {
        Self {
            fingerprint: fingerprint(config),
            steps: build_plan(config).len(),
        }
    }

    /// Read a stamp file. `Ok(None)` if it doesn't exist.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

        let mut fingerprint = None;
        let mut steps = None;
        for line in content.lines() {
            match line.split_once('=') {
                Some(("fingerprint", value)) => fingerprint = Some(value.trim().to_string()),
                Some(("steps", value)) => steps = value.trim().parse().ok(),
                _ => {}
            }
        }

        match (fingerprint, steps) {
            (Some(fingerprint), Some(steps)) if is_sha256_hex(&fingerprint) => {
                Ok(Some(Self { fingerprint, steps }))
            }
            _ => anyhow::bail!("malformed stamp: {}", path.display()),
        }
    }

    /// Write the stamp, creating the state directory.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = format!("fingerprint={}\nsteps={}\n", self.fingerprint, self.steps);
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// SHA-256 of the rendered plan, hex encoded.
pub fn fingerprint(config: &ProvisionConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(render::dockerfile(config).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 64 lowercase hex digits.
fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

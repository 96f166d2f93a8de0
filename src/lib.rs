//! devbox - development workspace provisioner.
//!
//! Turns a fresh base image into a ready-to-use development environment by
//! applying a fixed, ordered list of steps. See [`plan`] for the steps and
//! [`provisioner`] for how they are run.

pub mod config;
pub mod context;
pub mod executor;
pub mod plan;
pub mod preflight;
pub mod process;
pub mod profile;
pub mod provisioner;
pub mod render;
pub mod stamp;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ProvisionConfig;
pub use provisioner::{provision, ProvisionReport, Provisioner, StepState};

use std::time::{Duration, Instant};

/// Wall-clock timer for a named phase.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    /// Log the elapsed time and return it.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        tracing::debug!("{} took {:.1}s", self.name, elapsed.as_secs_f64());
        elapsed
    }
}

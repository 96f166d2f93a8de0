//! Provisioner orchestration - runs the plan in order.
//!
//! The procedure is a linear pipeline of fallible steps:
//!
//! ```text
//! not started -> step 1 -> step 2 -> ... -> step 8 -> done
//!                   \         \                \
//!                    failed    failed           failed
//! ```
//!
//! The first failing step halts the run. Later steps never execute and are
//! reported as not run. Nothing is retried or rolled back; a failed image is
//! discarded and provisioning starts over from the base image.

use anyhow::{Context, Result};
use std::fmt;
use std::time::Duration;

use crate::config::ProvisionConfig;
use crate::context::ProvisionContext;
use crate::executor::execute_step;
use crate::plan::{build_plan, Step};
use crate::process::Runner;
use crate::stamp::Stamp;
use crate::Timer;

/// Where a step stands in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Completed,
    Failed(String),
    NotRun,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Pending => write!(f, "[PENDING]"),
            StepState::Completed => write!(f, "[OK]"),
            StepState::Failed(_) => write!(f, "[FAIL]"),
            StepState::NotRun => write!(f, "[NOT RUN]"),
        }
    }
}

/// One step and what happened to it.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: Step,
    pub state: StepState,
    pub elapsed: Option<Duration>,
}

/// Per-step outcomes of one provisioning run.
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub outcomes: Vec<StepOutcome>,
}

impl ProvisionReport {
    fn pending(plan: &[Step]) -> Self {
        Self {
            outcomes: plan
                .iter()
                .map(|step| StepOutcome {
                    step: step.clone(),
                    state: StepState::Pending,
                    elapsed: None,
                })
                .collect(),
        }
    }

    /// Every step completed.
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.state == StepState::Completed)
    }

    /// Index and outcome of the failing step, if any.
    pub fn failed(&self) -> Option<(usize, &StepOutcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .find(|(_, o)| matches!(o.state, StepState::Failed(_)))
    }

    pub fn completed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == StepState::Completed)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Print a per-step summary.
    pub fn print_summary(&self) {
        println!("=== Provisioning Summary ===\n");
        for (i, outcome) in self.outcomes.iter().enumerate() {
            let elapsed = outcome
                .elapsed
                .map(|d| format!(" ({:.1}s)", d.as_secs_f64()))
                .unwrap_or_default();
            println!(
                "{:<10} {}/{} {}{}",
                outcome.state.to_string(),
                i + 1,
                self.total_count(),
                outcome.step.label(),
                elapsed
            );
            if let StepState::Failed(message) = &outcome.state {
                println!("           {}", message);
            }
        }
        println!();
        println!("{} of {} steps completed", self.completed_count(), self.total_count());
    }
}

/// Runs a plan against a context.
pub struct Provisioner<'a> {
    config: &'a ProvisionConfig,
    runner: &'a dyn Runner,
    plan: Vec<Step>,
}

impl<'a> Provisioner<'a> {
    pub fn new(config: &'a ProvisionConfig, runner: &'a dyn Runner) -> Self {
        Self {
            config,
            runner,
            plan: build_plan(config),
        }
    }

    /// Apply every step, stopping at the first failure.
    ///
    /// The report is filled in as the run goes, so it is complete whether or
    /// not an error is returned.
    pub fn run(&self, report: &mut ProvisionReport) -> Result<()> {
        let mut ctx = ProvisionContext::new(self.config, self.runner);
        self.run_in(&mut ctx, report)
    }

    /// Same as [`run`](Self::run) with a caller-supplied context.
    pub fn run_in(
        &self,
        ctx: &mut ProvisionContext<'_>,
        report: &mut ProvisionReport,
    ) -> Result<()> {
        *report = ProvisionReport::pending(&self.plan);
        let total = self.plan.len();

        for (i, step) in self.plan.iter().enumerate() {
            println!("\n[{}/{}] {}: {}", i + 1, total, step.label(), step);
            tracing::info!(step = i + 1, total, "{}", step.label());

            let timer = Timer::start(step.label());
            let result = execute_step(ctx, step);
            let elapsed = timer.finish();

            let outcome = &mut report.outcomes[i];
            outcome.elapsed = Some(elapsed);

            if let Err(e) = result {
                outcome.state = StepState::Failed(format!("{:#}", e));
                for later in &mut report.outcomes[i + 1..] {
                    later.state = StepState::NotRun;
                }
                return Err(e).with_context(|| format!("step {}/{} ({})", i + 1, total, step.label()));
            }

            outcome.state = StepState::Completed;
        }

        Ok(())
    }
}

/// Provision the image described by `config`.
///
/// Skips the run when a completion stamp already exists, unless `force` is
/// set: the installer is not assumed to be safe to run twice. Writes the
/// stamp after every step succeeded. Returns `None` when skipped.
pub fn provision(
    config: &ProvisionConfig,
    runner: &dyn Runner,
    force: bool,
) -> Result<Option<ProvisionReport>> {
    let stamp_path = config.stamp_path();

    if !force {
        if let Some(existing) = Stamp::read(&stamp_path)? {
            println!("[SKIP] Already provisioned ({})", stamp_path.display());
            if existing != Stamp::for_config(config) {
                println!("  Stamp was written for a different plan");
            }
            println!("  Use 'devbox provision --force' to run again");
            return Ok(None);
        }
    }

    println!("=== Provisioning {} ===", config.base_image());

    let provisioner = Provisioner::new(config, runner);
    let mut report = ProvisionReport::default();
    let result = provisioner.run(&mut report);

    println!();
    report.print_summary();
    result?;

    Stamp::for_config(config).write(&stamp_path)?;
    tracing::debug!("stamp written to {}", stamp_path.display());

    Ok(Some(report))
}

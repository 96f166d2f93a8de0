//! Test doubles.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashSet;

use crate::process::{Cmd, CommandResult, Runner};

/// Records every command instead of running it.
///
/// Programs registered with [`fail_on`](Self::fail_on) exit with status 1.
#[derive(Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<Cmd>>,
    failing: HashSet<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    pub fn commands(&self) -> Vec<Cmd> {
        self.commands.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .map(|c| c.program().to_string())
            .collect()
    }
}

impl Runner for RecordingRunner {
    fn run(&self, cmd: &Cmd) -> Result<CommandResult> {
        self.commands.borrow_mut().push(cmd.clone());

        let result = if self.failing.contains(cmd.program()) {
            CommandResult {
                code: Some(1),
                stderr: format!("{}: simulated failure", cmd.program()),
                ..Default::default()
            }
        } else {
            CommandResult {
                code: Some(0),
                stdout: format!("{} ok\n", cmd.program()),
                ..Default::default()
            }
        };

        cmd.check(result)
    }
}

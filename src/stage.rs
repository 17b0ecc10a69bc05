// This file contains the stage sequencer, which runs a stage's steps in order and stops at the
// first one that fails.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use rayon::ThreadPoolBuilder;

use crate::error::PipelineError;
use crate::log::{failure_line, success_line};
use crate::misc::spinner;
use crate::step::{run_step, Step, StepResult, StepStatus};


#[derive(Clone, Debug)]
pub struct StageResult {
    pub name: String,
    pub completed: Vec<StepResult>,
    pub failed: Option<StepResult>,
    /// Failures of steps that ran alongside the one in `failed`.
    pub also_failed: Vec<StepResult>,
}

impl StageResult {
    pub fn new(name: &str) -> Self {
        StageResult { name: name.to_string(), completed: Vec::new(), failed: None,
                      also_failed: Vec::new() }
    }

    pub fn aborted(&self) -> bool {
        self.failed.is_some()
    }

    /// 0 on success. On failure, the failing step's exit code if it had one, otherwise 1 (e.g. a
    /// tool that exited 0 without writing its output).
    pub fn exit_code(&self) -> i32 {
        match &self.failed {
            None => 0,
            Some(step) if step.exit_code != 0 => step.exit_code,
            Some(_) => 1,
        }
    }

    /// Adds a step's result and returns whether the stage can carry on.
    pub fn record(&mut self, result: StepResult) -> bool {
        if result.success() {
            self.completed.push(result);
            true
        } else {
            self.failed = Some(result);
            false
        }
    }

    /// Adds the results of steps that ran at the same time. Every one is recorded, so a failure
    /// in each is reported rather than only the first.
    pub fn record_all(&mut self, results: Vec<StepResult>) -> bool {
        for result in results {
            if result.success() {
                self.completed.push(result);
            } else if self.failed.is_none() {
                self.failed = Some(result);
            } else {
                self.also_failed.push(result);
            }
        }
        !self.aborted()
    }

    pub fn report(&self) {
        match &self.failed {
            None => {
                let skipped = self.completed.iter().filter(|r| r.skipped()).count();
                success_line(&format!("{}: {} steps done ({} already complete)",
                                      self.name, self.completed.len(), skipped));
            }
            Some(step) => {
                let reason = match &step.status {
                    StepStatus::Failed(failure) => failure.to_string(),
                    _ => String::new(),
                };
                failure_line(&format!("{}: step {} failed: {}", self.name, step.name, reason));
                eprintln!("  see log: {}", step.log.display());
                for other in &self.also_failed {
                    failure_line(&format!("{}: step {} also failed (exit code {})", self.name,
                                          other.name, other.exit_code));
                    eprintln!("  see log: {}", other.log.display());
                }
            }
        }
    }
}


pub fn run_stage(name: &str, steps: Vec<Step>, show_spinner: bool) -> StageResult {
    let mut stage = StageResult::new(name);
    run_steps(&mut stage, steps, show_spinner);
    stage
}


/// Runs the steps in order onto an existing stage result. Nothing runs after a failure, including
/// when the stage had already failed before this call.
pub fn run_steps(stage: &mut StageResult, steps: Vec<Step>, show_spinner: bool) -> bool {
    if stage.aborted() {
        return false;
    }
    for step in steps {
        let pb = if show_spinner { Some(spinner(&step.name)) } else { None };
        let result = run_step(step);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        if !stage.record(result) {
            return false;
        }
    }
    true
}


/// Runs two independent steps at the same time. Both always run to completion; results come back
/// in argument order regardless of which finished first.
pub fn join_steps(a: Step, b: Step) -> Result<(StepResult, StepResult), PipelineError> {
    let pool = ThreadPoolBuilder::new().num_threads(2).build()?;
    Ok(pool.join(|| run_step(a), || run_step(b)))
}

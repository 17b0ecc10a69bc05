// This file contains the dual-haplotype orchestrator: the same step chain run for haplotype 1 and
// haplotype 2 at the same time, each in its own directory.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use rayon::ThreadPoolBuilder;
use std::fmt;
use std::path::Path;

use crate::error::PipelineError;
use crate::log::{error_message, failure_line, success_line};
use crate::stage::StageResult;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Haplotype {
    One,
    Two,
}

impl Haplotype {
    pub fn number(&self) -> usize {
        match self {
            Haplotype::One => 1,
            Haplotype::Two => 2,
        }
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "haplotype {}", self.number())
    }
}


#[derive(Debug)]
pub struct HaplotypeOutcome {
    pub haplotype: Haplotype,
    pub exit_code: i32,
    pub stage: Option<StageResult>,
    pub error: Option<String>,
}

impl HaplotypeOutcome {
    fn from_result(haplotype: Haplotype, result: Result<StageResult, PipelineError>) -> Self {
        match result {
            Ok(stage) => HaplotypeOutcome { haplotype, exit_code: stage.exit_code(),
                                            stage: Some(stage), error: None },
            Err(e) => HaplotypeOutcome { haplotype, exit_code: 1, stage: None,
                                         error: Some(e.to_string()) },
        }
    }

    fn report(&self) {
        if let Some(error) = &self.error {
            error_message(&format!("{}: {}", self.haplotype, error));
        }
        if let Some(stage) = &self.stage {
            stage.report();
        }
        let text = format!("{} exit code: {}", self.haplotype, self.exit_code);
        if self.exit_code == 0 { success_line(&text); } else { failure_line(&text); }
    }
}


#[derive(Debug)]
pub struct DualResult {
    pub hap_1: HaplotypeOutcome,
    pub hap_2: HaplotypeOutcome,
    pub overall: i32,
}

impl DualResult {
    pub fn report(&self) {
        self.hap_1.report();
        self.hap_2.report();
    }

    pub fn exit_codes(&self) -> [(&'static str, i32); 3] {
        [("Haplotype 1", self.hap_1.exit_code),
         ("Haplotype 2", self.hap_2.exit_code),
         ("Overall", self.overall)]
    }
}


/// Runs the haplotype pipeline once per input on a dedicated two-thread pool. Neither pipeline can
/// stop or block the other, and both results are collected before returning. The overall code is
/// 0 only if both pipelines succeeded.
pub fn run_both<F>(pipeline: F, input_1: &Path, input_2: &Path) -> Result<DualResult, PipelineError>
where F: Fn(Haplotype, &Path) -> Result<StageResult, PipelineError> + Sync {
    let pool = ThreadPoolBuilder::new().num_threads(2).build()?;
    let (result_1, result_2) = pool.join(|| pipeline(Haplotype::One, input_1),
                                         || pipeline(Haplotype::Two, input_2));
    let hap_1 = HaplotypeOutcome::from_result(Haplotype::One, result_1);
    let hap_2 = HaplotypeOutcome::from_result(Haplotype::Two, result_2);
    let overall = if hap_1.exit_code == 0 && hap_2.exit_code == 0 { 0 } else { 1 };
    Ok(DualResult { hap_1, hap_2, overall })
}

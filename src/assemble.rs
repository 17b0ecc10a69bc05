// This file contains the code for the hapflow assemble subcommand, which builds a draft assembly
// from the corrected long reads.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::artifacts::{draft_assembly, flye_dir, load_optional_manifest, save_manifest, step_log,
                       AssemblyManifest, CorrectionManifest, ASSEMBLE_MANIFEST};
use crate::error::{PipelineError, ValidationError};
use crate::log::{error_message, path_setting, print_resolved_settings, stage_end_banner,
                 stage_start_banner};
use crate::misc::{absolute_dir, create_dir};
use crate::stage::run_stage;
use crate::step::{ArtifactFormat, Invocation, Output, Step};
use crate::tools::{ToolRegistry, FLYE};
use crate::validate;


#[derive(Clone, Debug)]
pub struct AssembleSettings {
    pub reads: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub threads: String,
    pub genome_size: String,
}

impl AssembleSettings {
    fn as_flags(&self) -> Vec<(&'static str, String)> {
        vec![("--reads", path_setting(&self.reads)),
             ("--manifest", path_setting(&self.manifest)),
             ("--out_dir", path_setting(&self.out_dir)),
             ("--threads", self.threads.clone()),
             ("--genome_size", self.genome_size.clone())]
    }
}


struct AssembleConfig {
    reads: PathBuf,
    out_dir: PathBuf,
    threads: usize,
    genome_size: String,
}


pub fn assemble(settings: AssembleSettings, tools: &ToolRegistry) -> i32 {
    let start_time = stage_start_banner("assemble",
        "This command assembles the corrected long reads into a draft assembly.",
        &settings.as_flags());
    let code = match run(&settings, tools) {
        Ok(code) => code,
        Err(e) => { error_message(&e.to_string()); 1 }
    };
    stage_end_banner("assemble", start_time, &[("Overall", code)]);
    code
}


impl AssembleConfig {
    fn resolved(&self) -> Vec<(&'static str, String)> {
        vec![("reads", self.reads.display().to_string()),
             ("genome size", self.genome_size.clone())]
    }
}


fn run(settings: &AssembleSettings, tools: &ToolRegistry) -> Result<i32, PipelineError> {
    let config = check_settings(settings, tools)?;
    print_resolved_settings(&config.resolved());
    create_dir(&config.out_dir)?;
    let out_dir = absolute_dir(&config.out_dir)?;
    let stage = run_stage("assemble", vec![assemble_step(&config, &out_dir, tools)?], true);
    stage.report();
    if !stage.aborted() {
        let manifest = AssemblyManifest { draft_assembly: draft_assembly(&out_dir) };
        save_manifest(&out_dir.join(ASSEMBLE_MANIFEST), &manifest)?;
    }
    Ok(if stage.aborted() { 1 } else { 0 })
}


fn check_settings(settings: &AssembleSettings, tools: &ToolRegistry)
        -> Result<AssembleConfig, ValidationError> {
    let manifest: Option<CorrectionManifest> = load_optional_manifest(&settings.manifest)?;
    let reads = validate::path_or_manifest("-r", &settings.reads,
                                           manifest.as_ref().map(|m| m.corrected_reads.as_path()))?;
    let out_dir = validate::required_path("-o", &settings.out_dir)?;
    let threads = validate::positive_int("-t", &settings.threads)?;
    let genome_size = validate::genome_size("-g", &settings.genome_size)?;
    let reads = validate::input_file("-r", reads)?;
    let out_dir = validate::output_dir("-o", out_dir)?;
    tools.require(&[FLYE])?;
    Ok(AssembleConfig { reads, out_dir, threads, genome_size })
}


fn assemble_step(config: &AssembleConfig, out_dir: &Path, tools: &ToolRegistry)
        -> Result<Step, ValidationError> {
    // Flye always names its result assembly.fasta inside its own directory.
    let flye_dir = flye_dir(out_dir);
    let output = Output::staged_at(draft_assembly(out_dir), flye_dir.join("assembly.fasta"),
                                   ArtifactFormat::Fasta);
    let mut command = tools.command(FLYE)?;
    command.arg("--nano-corr").arg(&config.reads)
           .arg("-g").arg(&config.genome_size)
           .arg("-t").arg(config.threads.to_string())
           .arg("-o").arg(&flye_dir);
    Ok(Step::external("assemble", vec![output], vec![Invocation::single(command)],
                      step_log(out_dir, "assemble")))
}

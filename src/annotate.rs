// This file contains the code for the hapflow annotate subcommand, which lifts a reference genome's
// annotation over to both refined haplotype assemblies.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::artifacts::{annotation_dir, lifton_gff, load_optional_manifest, miniprot_gff,
                       save_manifest, step_log, AnnotationManifest, HaplotypeManifest,
                       ANNOTATE_MANIFEST};
use crate::error::{PipelineError, ValidationError};
use crate::haplotype::{run_both, Haplotype};
use crate::log::{error_message, path_setting, print_resolved_settings, stage_end_banner,
                 stage_start_banner};
use crate::misc::{absolute_dir, create_dir};
use crate::stage::{run_stage, StageResult};
use crate::step::{ArtifactFormat, Invocation, Output, Step};
use crate::tools::{ToolRegistry, LIFTON, MINIPROT};
use crate::validate;


#[derive(Clone, Debug)]
pub struct AnnotateSettings {
    pub reference: Option<PathBuf>,
    pub assembly_1: Option<PathBuf>,
    pub assembly_2: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub annotation: Option<PathBuf>,
    pub proteins: Option<PathBuf>,
    pub transcripts: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub threads: String,
}

impl AnnotateSettings {
    fn as_flags(&self) -> Vec<(&'static str, String)> {
        vec![("--reference", path_setting(&self.reference)),
             ("--assembly_1", path_setting(&self.assembly_1)),
             ("--assembly_2", path_setting(&self.assembly_2)),
             ("--manifest", path_setting(&self.manifest)),
             ("--annotation", path_setting(&self.annotation)),
             ("--proteins", path_setting(&self.proteins)),
             ("--transcripts", path_setting(&self.transcripts)),
             ("--out_dir", path_setting(&self.out_dir)),
             ("--threads", self.threads.clone())]
    }
}


struct AnnotateConfig {
    reference: PathBuf,
    assembly_1: PathBuf,
    assembly_2: PathBuf,
    annotation: PathBuf,
    proteins: PathBuf,
    transcripts: PathBuf,
    out_dir: PathBuf,
    threads: String,
}


impl AnnotateConfig {
    fn resolved(&self) -> Vec<(&'static str, String)> {
        vec![("reference", self.reference.display().to_string()),
             ("haplotype 1", self.assembly_1.display().to_string()),
             ("haplotype 2", self.assembly_2.display().to_string()),
             ("annotation", self.annotation.display().to_string()),
             ("proteins", self.proteins.display().to_string()),
             ("transcripts", self.transcripts.display().to_string())]
    }
}


pub fn annotate(settings: AnnotateSettings, tools: &ToolRegistry) -> i32 {
    let start_time = stage_start_banner("annotate",
        "This command aligns the reference proteins to each haplotype assembly, then lifts the \
         reference annotation over to it. The two haplotypes are processed at the same time.",
        &settings.as_flags());
    let codes = match run(&settings, tools) {
        Ok(codes) => codes,
        Err(e) => { error_message(&e.to_string()); vec![("Overall", 1)] }
    };
    stage_end_banner("annotate", start_time, &codes);
    codes.last().map(|(_, code)| *code).unwrap_or(1)
}


fn run(settings: &AnnotateSettings, tools: &ToolRegistry)
        -> Result<Vec<(&'static str, i32)>, PipelineError> {
    let config = check_settings(settings, tools)?;
    print_resolved_settings(&config.resolved());
    create_dir(&config.out_dir)?;
    let out_dir = absolute_dir(&config.out_dir)?;
    let result = run_both(|hap, assembly| annotate_haplotype(&config, &out_dir, tools, hap, assembly),
                          &config.assembly_1, &config.assembly_2)?;
    result.report();
    if result.overall == 0 {
        let annotation = |hap| lifton_gff(&annotation_dir(&out_dir, hap), hap);
        let manifest = AnnotationManifest { annotation_1: annotation(Haplotype::One),
                                            annotation_2: annotation(Haplotype::Two) };
        save_manifest(&out_dir.join(ANNOTATE_MANIFEST), &manifest)?;
    }
    Ok(result.exit_codes().to_vec())
}


fn check_settings(settings: &AnnotateSettings, tools: &ToolRegistry)
        -> Result<AnnotateConfig, ValidationError> {
    let manifest: Option<HaplotypeManifest> = load_optional_manifest(&settings.manifest)?;
    let reference = validate::required_path("-r", &settings.reference)?;
    let assembly_1 = validate::path_or_manifest("-1", &settings.assembly_1,
                                                manifest.as_ref().map(|m| m.haplotype_1.as_path()))?;
    let assembly_2 = validate::path_or_manifest("-2", &settings.assembly_2,
                                                manifest.as_ref().map(|m| m.haplotype_2.as_path()))?;
    let annotation = validate::required_path("-a", &settings.annotation)?;
    let proteins = validate::required_path("-p", &settings.proteins)?;
    let transcripts = validate::required_path("-x", &settings.transcripts)?;
    let out_dir = validate::required_path("-o", &settings.out_dir)?;
    let threads = validate::positive_int("-t", &settings.threads)?;
    let reference = validate::input_file("-r", reference)?;
    let assembly_1 = validate::input_file("-1", assembly_1)?;
    let assembly_2 = validate::input_file("-2", assembly_2)?;
    let annotation = validate::input_file("-a", annotation)?;
    let proteins = validate::input_file("-p", proteins)?;
    let transcripts = validate::input_file("-x", transcripts)?;
    let out_dir = validate::output_dir("-o", out_dir)?;
    tools.require(&[MINIPROT, LIFTON])?;
    Ok(AnnotateConfig { reference, assembly_1, assembly_2, annotation, proteins, transcripts,
                        out_dir, threads: threads.to_string() })
}


fn annotate_haplotype(config: &AnnotateConfig, out_dir: &Path, tools: &ToolRegistry,
                      hap: Haplotype, assembly: &Path) -> Result<StageResult, PipelineError> {
    let hap_dir = annotation_dir(out_dir, hap);
    create_dir(&hap_dir)?;
    let steps = vec![miniprot_step(config, tools, &hap_dir, hap, assembly)?,
                     lifton_step(config, tools, &hap_dir, hap, assembly)?];
    Ok(run_stage(&format!("annotate {}", hap), steps, false))
}


fn miniprot_step(config: &AnnotateConfig, tools: &ToolRegistry, hap_dir: &Path, hap: Haplotype,
                 assembly: &Path) -> Result<Step, ValidationError> {
    // The alignments go to stdout, so only stderr ends up in the log.
    let name = format!("miniprot_{}", hap.number());
    let output = Output::new(miniprot_gff(hap_dir, hap), ArtifactFormat::Any);
    let mut command = tools.command(MINIPROT)?;
    command.arg("-t").arg(&config.threads).arg("--gff").arg(assembly).arg(&config.proteins);
    let invocation = Invocation::single(command).stdout_to(output.staged.clone());
    Ok(Step::external(&name, vec![output], vec![invocation], step_log(hap_dir, &name)))
}


fn lifton_step(config: &AnnotateConfig, tools: &ToolRegistry, hap_dir: &Path, hap: Haplotype,
               assembly: &Path) -> Result<Step, ValidationError> {
    // LiftOn leaves its intermediate files in the working directory.
    let name = format!("lifton_{}", hap.number());
    let output = Output::new(lifton_gff(hap_dir, hap), ArtifactFormat::Any);
    let mut command = tools.command(LIFTON)?;
    command.arg("-g").arg(&config.annotation)
           .arg("-P").arg(&config.proteins)
           .arg("-T").arg(&config.transcripts)
           .arg("-M").arg(miniprot_gff(hap_dir, hap))
           .arg("-o").arg(&output.staged)
           .arg("-t").arg(&config.threads)
           .arg(assembly).arg(&config.reference)
           .current_dir(hap_dir);
    Ok(Step::external(&name, vec![output], vec![Invocation::single(command)],
                      step_log(hap_dir, &name)))
}

// This file contains the code for the hapflow polish subcommand: the draft assembly is corrected for
// misjoins, polished with both read sets and scaffolded into two haplotype assemblies.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::{load_optional_manifest, long_to_draft_bam, long_to_overlap_bam,
                       misjoin_fasta, overlap_fasta, polish_tempdir, polished_fasta, save_manifest,
                       scaffold_fasta, scaffold_output, scaffold_prefix, short_read_list,
                       short_to_overlap_bam, solid_kmers, solid_kmers_output, solid_kmers_prefix,
                       staging_path, step_log, AssemblyManifest, HaplotypeManifest,
                       POLISH_MANIFEST};
use crate::error::{PipelineError, ValidationError};
use crate::haplotype::Haplotype;
use crate::log::{error_message, explanation, path_setting, print_resolved_settings, section_header,
                 stage_end_banner, stage_start_banner};
use crate::misc::{absolute_dir, create_dir};
use crate::stage::run_stage;
use crate::step::{ArtifactFormat, Invocation, Output, Step};
use crate::tools::{ToolRegistry, HELPER_BIN_DIR, HYPO, MINIMAP2, MISJOIN, OVERLAP, POLISH_HELPERS,
                   SAMTOOLS, SCAFFOLD, SUK};
use crate::validate;


#[derive(Clone, Debug)]
pub struct PolishSettings {
    pub draft: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub long_reads: Option<PathBuf>,
    pub short_reads_1: Option<PathBuf>,
    pub short_reads_2: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub threads: String,
    pub genome_size: String,
    pub kmer: String,
    pub long_coverage: String,
    pub short_coverage: String,
    pub batches: String,
}

impl PolishSettings {
    fn as_flags(&self) -> Vec<(&'static str, String)> {
        vec![("--draft", path_setting(&self.draft)),
             ("--manifest", path_setting(&self.manifest)),
             ("--long_reads", path_setting(&self.long_reads)),
             ("--short_reads_1", path_setting(&self.short_reads_1)),
             ("--short_reads_2", path_setting(&self.short_reads_2)),
             ("--out_dir", path_setting(&self.out_dir)),
             ("--install_dir", path_setting(&self.install_dir)),
             ("--threads", self.threads.clone()),
             ("--genome_size", self.genome_size.clone()),
             ("--kmer", self.kmer.clone()),
             ("--long_cov", self.long_coverage.clone()),
             ("--short_cov", self.short_coverage.clone()),
             ("--batches", self.batches.clone())]
    }
}


struct PolishConfig {
    draft: PathBuf,
    long_reads: PathBuf,
    short_reads_1: PathBuf,
    short_reads_2: PathBuf,
    out_dir: PathBuf,
    helper_dir: PathBuf,
    tools: ToolRegistry,
    threads: String,
    genome_size: String,
    kmer: String,
    long_coverage: String,
    short_coverage: String,
    batches: String,
}


pub fn polish(settings: PolishSettings, tools: &ToolRegistry) -> i32 {
    let start_time = stage_start_banner("polish",
        "This command corrects misjoins in the draft assembly, polishes it with the long and short \
         reads, then scaffolds it into two haplotype assemblies.", &settings.as_flags());
    let code = match run(&settings, tools) {
        Ok(code) => code,
        Err(e) => { error_message(&e.to_string()); 1 }
    };
    stage_end_banner("polish", start_time, &[("Overall", code)]);
    code
}


impl PolishConfig {
    fn resolved(&self) -> Vec<(&'static str, String)> {
        vec![("draft assembly", self.draft.display().to_string()),
             ("long reads", self.long_reads.display().to_string()),
             ("short reads 1", self.short_reads_1.display().to_string()),
             ("short reads 2", self.short_reads_2.display().to_string()),
             ("helper dir", self.helper_dir.display().to_string()),
             ("genome size", self.genome_size.clone())]
    }
}


fn run(settings: &PolishSettings, tools: &ToolRegistry) -> Result<i32, PipelineError> {
    let config = check_settings(settings, tools)?;
    print_resolved_settings(&config.resolved());
    create_dir(&config.out_dir)?;
    let out_dir = absolute_dir(&config.out_dir)?;
    let tempdir = polish_tempdir(&out_dir);
    create_dir(&tempdir)?;
    write_short_read_list(&config, &tempdir)?;

    let steps = vec![map_long_step(&config, &tempdir)?,
                     solid_kmers_step(&config, &tempdir)?,
                     misjoin_step(&config, &tempdir)?,
                     overlap_step(&config, &tempdir)?,
                     realign_step(&config, &tempdir)?,
                     polish_step(&config, &tempdir)?,
                     scaffold_step(&config, &tempdir)?];
    let stage = run_stage("polish", steps, true);
    stage.report();
    if stage.aborted() {
        return Ok(1);
    }

    section_header("Saving haplotype scaffolds");
    explanation("The two scaffolded haplotypes are copied out of the temporary directory.");
    for hap in [Haplotype::One, Haplotype::Two] {
        copy_if_absent(&scaffold_fasta(&tempdir, hap), &scaffold_fasta(&out_dir, hap))?;
        eprintln!("  {}", scaffold_fasta(&out_dir, hap).display());
    }
    eprintln!();
    let manifest = HaplotypeManifest { haplotype_1: scaffold_fasta(&out_dir, Haplotype::One),
                                       haplotype_2: scaffold_fasta(&out_dir, Haplotype::Two) };
    save_manifest(&out_dir.join(POLISH_MANIFEST), &manifest)?;
    Ok(0)
}


fn check_settings(settings: &PolishSettings, tools: &ToolRegistry)
        -> Result<PolishConfig, ValidationError> {
    let manifest: Option<AssemblyManifest> = load_optional_manifest(&settings.manifest)?;
    let draft = validate::path_or_manifest("-d", &settings.draft,
                                           manifest.as_ref().map(|m| m.draft_assembly.as_path()))?;
    let long_reads = validate::required_path("-l", &settings.long_reads)?;
    let short_reads_1 = validate::required_path("-1", &settings.short_reads_1)?;
    let short_reads_2 = validate::required_path("-2", &settings.short_reads_2)?;
    let out_dir = validate::required_path("-o", &settings.out_dir)?;
    let install_dir = validate::required_path("-i", &settings.install_dir)?;
    let threads = validate::positive_int("-t", &settings.threads)?;
    let genome_size = validate::genome_size("-g", &settings.genome_size)?;
    let kmer = validate::positive_int("-k", &settings.kmer)?;
    let long_coverage = validate::positive_int("-L", &settings.long_coverage)?;
    let short_coverage = validate::positive_int("-S", &settings.short_coverage)?;
    let batches = validate::positive_int("-b", &settings.batches)?;
    let draft = validate::input_file("-d", draft)?;
    let long_reads = validate::input_file("-l", long_reads)?;
    let short_reads_1 = validate::input_file("-1", short_reads_1)?;
    let short_reads_2 = validate::input_file("-2", short_reads_2)?;
    let out_dir = validate::output_dir("-o", out_dir)?;
    let install_dir = validate::input_dir("-i", install_dir)?;

    let helper_dir = install_dir.join(HELPER_BIN_DIR);
    for helper in POLISH_HELPERS {
        validate::helper(&helper_dir.join(helper))?;
    }
    let tools = tools.with_helper_dir(&helper_dir);
    tools.require(&[MINIMAP2, SAMTOOLS])?;
    tools.require(POLISH_HELPERS)?;

    Ok(PolishConfig { draft, long_reads, short_reads_1, short_reads_2, out_dir, helper_dir, tools,
                      threads: threads.to_string(), genome_size, kmer: kmer.to_string(),
                      long_coverage: long_coverage.to_string(),
                      short_coverage: short_coverage.to_string(), batches: batches.to_string() })
}


fn write_short_read_list(config: &PolishConfig, tempdir: &Path) -> Result<(), PipelineError> {
    // The solid k-mer finder and the polisher both take their short reads as an @file.
    let list = short_read_list(tempdir);
    let contents = format!("{}\n{}\n", config.short_reads_1.display(), config.short_reads_2.display());
    fs::write(&list, contents).map_err(|e| PipelineError::Io { path: list, source: e })
}


fn short_read_arg(tempdir: &Path) -> String {
    format!("@{}", short_read_list(tempdir).display())
}


fn helper_command(config: &PolishConfig, tool: &str, tempdir: &Path)
        -> Result<std::process::Command, ValidationError> {
    let mut command = config.tools.command(tool)?;
    command.current_dir(tempdir);
    Ok(command)
}


/// minimap2 piped into samtools sort, giving a sorted BAM at the output path.
fn map_and_sort(config: &PolishConfig, preset: &str, reference: &Path, reads: &[&Path], bam: &Path,
                tempdir: &Path) -> Result<Invocation, ValidationError> {
    let mut minimap2 = helper_command(config, MINIMAP2, tempdir)?;
    minimap2.arg("-ax").arg(preset).arg("-t").arg(&config.threads).arg(reference).args(reads);
    let mut samtools = helper_command(config, SAMTOOLS, tempdir)?;
    samtools.arg("sort").arg("-@").arg(&config.threads).arg("-O").arg("bam").arg("-o").arg(bam);
    Ok(Invocation::pipe(vec![minimap2, samtools]))
}


fn map_long_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    let output = Output::new(long_to_draft_bam(tempdir), ArtifactFormat::Any);
    let invocation = map_and_sort(config, "map-ont", &config.draft, &[&config.long_reads],
                                  &output.staged, tempdir)?;
    Ok(Step::external("map_long", vec![output], vec![invocation], step_log(tempdir, "map_long")))
}


fn solid_kmers_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    let staged_prefix = staging_path(&solid_kmers_prefix(tempdir));
    let output = Output::staged_at(solid_kmers(tempdir), solid_kmers_output(&staged_prefix),
                                   ArtifactFormat::Any);
    let mut command = helper_command(config, SUK, tempdir)?;
    command.arg("-k").arg(&config.kmer)
           .arg("-i").arg(short_read_arg(tempdir))
           .arg("-t").arg(&config.threads)
           .arg("-e").arg(&config.genome_size)
           .arg("-o").arg(&staged_prefix);
    Ok(Step::external("solid_kmers", vec![output], vec![Invocation::single(command)],
                      step_log(tempdir, "solid_kmers")))
}


fn misjoin_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    let output = Output::new(misjoin_fasta(tempdir), ArtifactFormat::Fasta);
    let mut command = helper_command(config, MISJOIN, tempdir)?;
    command.arg("-k").arg(solid_kmers(tempdir))
           .arg("-i").arg(&config.draft)
           .arg("-b").arg(long_to_draft_bam(tempdir))
           .arg("-c").arg(&config.long_coverage)
           .arg("-t").arg(&config.threads)
           .arg("-o").arg(&output.staged);
    Ok(Step::external("misjoin", vec![output], vec![Invocation::single(command)],
                      step_log(tempdir, "misjoin")))
}


fn overlap_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    let output = Output::new(overlap_fasta(tempdir), ArtifactFormat::Fasta);
    let mut command = helper_command(config, OVERLAP, tempdir)?;
    command.arg("-k").arg(solid_kmers(tempdir))
           .arg("-i").arg(misjoin_fasta(tempdir))
           .arg("-r").arg(&config.long_reads)
           .arg("-t").arg(&config.threads)
           .arg("-o").arg(&output.staged);
    Ok(Step::external("overlap", vec![output], vec![Invocation::single(command)],
                      step_log(tempdir, "overlap")))
}


fn realign_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    let long_output = Output::new(long_to_overlap_bam(tempdir), ArtifactFormat::Any);
    let short_output = Output::new(short_to_overlap_bam(tempdir), ArtifactFormat::Any);
    let reference = overlap_fasta(tempdir);
    let long = map_and_sort(config, "map-ont", &reference, &[&config.long_reads],
                            &long_output.staged, tempdir)?;
    let short = map_and_sort(config, "sr", &reference, &[&config.short_reads_1, &config.short_reads_2],
                             &short_output.staged, tempdir)?;
    Ok(Step::external("realign", vec![long_output, short_output], vec![long, short],
                      step_log(tempdir, "realign")))
}


fn polish_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    let output = Output::new(polished_fasta(tempdir), ArtifactFormat::Fasta);
    let mut command = helper_command(config, HYPO, tempdir)?;
    command.arg("-d").arg(overlap_fasta(tempdir))
           .arg("-r").arg(short_read_arg(tempdir))
           .arg("-s").arg(&config.genome_size)
           .arg("-c").arg(&config.short_coverage)
           .arg("-b").arg(short_to_overlap_bam(tempdir))
           .arg("-B").arg(long_to_overlap_bam(tempdir))
           .arg("-t").arg(&config.threads)
           .arg("-p").arg(&config.batches)
           .arg("-o").arg(&output.staged);
    Ok(Step::external("polish", vec![output], vec![Invocation::single(command)],
                      step_log(tempdir, "polish")))
}


fn scaffold_step(config: &PolishConfig, tempdir: &Path) -> Result<Step, ValidationError> {
    // One run writes both haplotypes, and they are committed together.
    let staged_prefix = staging_path(&scaffold_prefix(tempdir));
    let outputs = [Haplotype::One, Haplotype::Two].iter()
        .map(|&hap| Output::staged_at(scaffold_fasta(tempdir, hap), scaffold_output(&staged_prefix, hap),
                                      ArtifactFormat::Fasta))
        .collect();
    let mut command = helper_command(config, SCAFFOLD, tempdir)?;
    command.arg("-k").arg(solid_kmers(tempdir))
           .arg("-i").arg(polished_fasta(tempdir))
           .arg("-b").arg(long_to_overlap_bam(tempdir))
           .arg("-t").arg(&config.threads)
           .arg("-o").arg(&staged_prefix);
    Ok(Step::external("scaffold", outputs, vec![Invocation::single(command)],
                      step_log(tempdir, "scaffold")))
}


fn copy_if_absent(source: &Path, destination: &Path) -> Result<(), PipelineError> {
    if destination.exists() {
        return Ok(());
    }
    let staged = staging_path(destination);
    let io_error = |e| PipelineError::Io { path: destination.to_path_buf(), source: e };
    fs::copy(source, &staged).map_err(io_error)?;
    fs::rename(&staged, destination).map_err(io_error)
}

// This file contains the code for the hapflow correct subcommand: short-read mates are tidied and
// merged, then used to correct the long reads.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use regex::Regex;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::artifacts::{corrected_reads, merged_short_reads, preprocessed_mate, save_manifest,
                       step_log, CorrectionManifest, CORRECT_MANIFEST};
use crate::error::{PipelineError, ValidationError};
use crate::log::{error_message, path_setting, print_resolved_settings, stage_end_banner,
                 stage_start_banner, text_setting};
use crate::misc::{absolute_dir, create_dir, open_text_file, sample_name_from_path};
use crate::stage::{join_steps, run_steps, StageResult};
use crate::step::{ArtifactFormat, Invocation, Output, Step};
use crate::tools::{ToolRegistry, RATATOSK};
use crate::validate;


const CHEMISTRIES: &[&str] = &["R9", "R10"];


/// Settings as given on the command line, before validation.
#[derive(Clone, Debug)]
pub struct CorrectSettings {
    pub work_dir: Option<PathBuf>,
    pub long_reads: Option<PathBuf>,
    pub short_reads: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub chemistry: String,
    pub sample: Option<String>,
    pub cores: String,
}

impl CorrectSettings {
    fn as_flags(&self) -> Vec<(&'static str, String)> {
        vec![("--work_dir", path_setting(&self.work_dir)),
             ("--long_reads", path_setting(&self.long_reads)),
             ("--short_reads", text_setting(&self.short_reads)),
             ("--out_dir", path_setting(&self.out_dir)),
             ("--chemistry", self.chemistry.clone()),
             ("--sample", text_setting(&self.sample)),
             ("--cores", self.cores.clone())]
    }
}


struct CorrectConfig {
    work_dir: PathBuf,
    long_reads: PathBuf,
    mate_1: PathBuf,
    mate_2: PathBuf,
    out_dir: PathBuf,
    max_lr_bq: u32,
    sample: String,
    cores: usize,
}


pub fn correct(settings: CorrectSettings, tools: &ToolRegistry) -> i32 {
    let start_time = stage_start_banner("correct",
        "This command merges the two short-read mate files into one read set, then uses it to \
         correct the ONT long reads.", &settings.as_flags());
    let code = match run(&settings, tools) {
        Ok(code) => code,
        Err(e) => { error_message(&e.to_string()); 1 }
    };
    stage_end_banner("correct", start_time, &[("Overall", code)]);
    code
}


impl CorrectConfig {
    fn resolved(&self) -> Vec<(&'static str, String)> {
        vec![("sample", self.sample.clone()),
             ("long reads", self.long_reads.display().to_string()),
             ("short reads 1", self.mate_1.display().to_string()),
             ("short reads 2", self.mate_2.display().to_string()),
             ("work dir", self.work_dir.display().to_string()),
             ("max_lr_bq", self.max_lr_bq.to_string())]
    }
}


fn run(settings: &CorrectSettings, tools: &ToolRegistry) -> Result<i32, PipelineError> {
    let config = check_settings(settings, tools)?;
    print_resolved_settings(&config.resolved());
    create_dir(&config.out_dir)?;
    let out_dir = absolute_dir(&config.out_dir)?;

    let mut stage = StageResult::new("correct");
    let preprocess_1 = preprocess_step(&out_dir, &config.sample, 1, &config.mate_1);
    let preprocess_2 = preprocess_step(&out_dir, &config.sample, 2, &config.mate_2);
    let (result_1, result_2) = join_steps(preprocess_1, preprocess_2)?;
    if stage.record_all(vec![result_1, result_2]) {
        let steps = vec![merge_step(&out_dir, &config.sample),
                         correct_step(&config, &out_dir, tools)?];
        run_steps(&mut stage, steps, true);
    }
    stage.report();
    if !stage.aborted() {
        let manifest = CorrectionManifest { sample: config.sample.clone(),
                                            short_reads: merged_short_reads(&out_dir, &config.sample),
                                            corrected_reads: corrected_reads(&out_dir, &config.sample) };
        save_manifest(&out_dir.join(CORRECT_MANIFEST), &manifest)?;
    }
    Ok(if stage.aborted() { 1 } else { 0 })
}


fn check_settings(settings: &CorrectSettings, tools: &ToolRegistry)
        -> Result<CorrectConfig, ValidationError> {
    let work_dir = validate::required_path("-w", &settings.work_dir)?;
    let long_reads = validate::required_path("-l", &settings.long_reads)?;
    let short_reads = validate::required("-s", &settings.short_reads)?;
    let out_dir = validate::required_path("-o", &settings.out_dir)?;
    let cores = validate::positive_int("-c", &settings.cores)?;
    let max_lr_bq = max_long_read_base_quality(&validate::choice("-t", &settings.chemistry,
                                                                 CHEMISTRIES)?);
    let work_dir = validate::input_dir("-w", work_dir)?;
    let long_reads = validate::input_file("-l", long_reads)?;
    let (mate_1, mate_2) = validate::file_pair("-s", short_reads)?;
    let out_dir = validate::output_dir("-o", out_dir)?;
    let sample = match settings.sample.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => sample_name_from_path(&long_reads),
    };
    tools.require(&[RATATOSK])?;
    Ok(CorrectConfig { work_dir, long_reads, mate_1, mate_2, out_dir, max_lr_bq, sample, cores })
}


fn max_long_read_base_quality(chemistry: &str) -> u32 {
    if chemistry == "R9" { 40 } else { 90 }
}


fn preprocess_step(out_dir: &Path, sample: &str, mate: usize, input: &Path) -> Step {
    let name = format!("preprocess_{}", mate);
    let output = Output::new(preprocessed_mate(out_dir, sample, mate), ArtifactFormat::Fastq);
    let staged = output.staged.clone();
    let input = input.to_path_buf();
    Step::native(&name, vec![output], Box::new(move || preprocess_mate(&input, &staged)),
                 step_log(out_dir, &name))
}


fn merge_step(out_dir: &Path, sample: &str) -> Step {
    let mate_1 = preprocessed_mate(out_dir, sample, 1);
    let mate_2 = preprocessed_mate(out_dir, sample, 2);
    let output = Output::new(merged_short_reads(out_dir, sample), ArtifactFormat::Fastq);
    let staged = output.staged.clone();
    Step::native("merge", vec![output], Box::new(move || merge_mates(&mate_1, &mate_2, &staged)),
                 step_log(out_dir, "merge"))
}


fn correct_step(config: &CorrectConfig, out_dir: &Path, tools: &ToolRegistry)
        -> Result<Step, ValidationError> {
    // The corrector appends .fastq to the prefix it is given.
    let output = Output::new(corrected_reads(out_dir, &config.sample), ArtifactFormat::Fastq);
    let prefix = output.staged.with_extension("");
    let mut command = tools.command(RATATOSK)?;
    command.arg("correct")
           .arg("-c").arg(config.cores.to_string())
           .arg("-s").arg(merged_short_reads(out_dir, &config.sample))
           .arg("-l").arg(&config.long_reads)
           .arg("-o").arg(&prefix)
           .arg("--max_lr_bq").arg(config.max_lr_bq.to_string())
           .current_dir(&config.work_dir);
    Ok(Step::external("correct", vec![output], vec![Invocation::single(command)],
                      step_log(out_dir, "correct")))
}


/// Copies a FASTQ mate file (optionally gzipped), reducing each header line to its read name with
/// any /1 or /2 mate suffix removed, so both mates of a pair carry the same name.
pub fn preprocess_mate(input: &Path, output: &Path) -> io::Result<()> {
    let mate_suffix = Regex::new(r"/[12]$").unwrap();
    let reader = open_text_file(input)?;
    let mut writer = BufWriter::new(File::create(output)?);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i % 4 == 0 {
            writeln!(writer, "{}", read_name(&line, &mate_suffix))?;
        } else {
            writeln!(writer, "{}", line)?;
        }
    }
    writer.flush()
}


fn read_name<'a>(header: &'a str, mate_suffix: &Regex) -> &'a str {
    let name = header.split_whitespace().next().unwrap_or("");
    match mate_suffix.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}


/// Mate 1 records, then mate 2 records.
pub fn merge_mates(mate_1: &Path, mate_2: &Path, output: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(output)?);
    for mate in [mate_1, mate_2] {
        io::copy(&mut File::open(mate)?, &mut writer)?;
    }
    writer.flush()
}

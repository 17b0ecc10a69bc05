// This file contains the code for the hapflow refine subcommand, which corrects, scaffolds and
// patches both haplotype assemblies against a reference genome.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::artifacts::{load_optional_manifest, ragtag_output, ragtag_result, refine_dir,
                       refined_assembly, save_manifest, step_log, HaplotypeManifest,
                       RAGTAG_OUTPUT_DIR, REFINE_MANIFEST};
use crate::error::{PipelineError, ValidationError};
use crate::haplotype::{run_both, Haplotype};
use crate::log::{error_message, path_setting, print_resolved_settings, stage_end_banner,
                 stage_start_banner};
use crate::misc::{absolute_dir, create_dir};
use crate::stage::{run_stage, StageResult};
use crate::step::{ArtifactFormat, Invocation, Output, Step};
use crate::tools::{ToolRegistry, MINIMAP2, RAGTAG};
use crate::validate;


const READ_TYPES: &[&str] = &["sr", "ont", "corr"];


#[derive(Clone, Debug)]
pub struct RefineSettings {
    pub reference: Option<PathBuf>,
    pub query_1: Option<PathBuf>,
    pub query_2: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub long_reads: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub threads: String,
    pub read_type: String,
}

impl RefineSettings {
    fn as_flags(&self) -> Vec<(&'static str, String)> {
        vec![("--reference", path_setting(&self.reference)),
             ("--query_1", path_setting(&self.query_1)),
             ("--query_2", path_setting(&self.query_2)),
             ("--manifest", path_setting(&self.manifest)),
             ("--long_reads", path_setting(&self.long_reads)),
             ("--out_dir", path_setting(&self.out_dir)),
             ("--threads", self.threads.clone()),
             ("--read_type", self.read_type.clone())]
    }
}


struct RefineConfig {
    reference: PathBuf,
    query_1: PathBuf,
    query_2: PathBuf,
    long_reads: PathBuf,
    out_dir: PathBuf,
    threads: String,
    read_type: String,
}


impl RefineConfig {
    fn resolved(&self) -> Vec<(&'static str, String)> {
        vec![("reference", self.reference.display().to_string()),
             ("haplotype 1", self.query_1.display().to_string()),
             ("haplotype 2", self.query_2.display().to_string()),
             ("long reads", self.long_reads.display().to_string())]
    }
}


pub fn refine(settings: RefineSettings, tools: &ToolRegistry) -> i32 {
    let start_time = stage_start_banner("refine",
        "This command uses the reference genome to correct, scaffold and patch each haplotype \
         assembly. The two haplotypes are processed at the same time.", &settings.as_flags());
    let codes = match run(&settings, tools) {
        Ok(codes) => codes,
        Err(e) => { error_message(&e.to_string()); vec![("Overall", 1)] }
    };
    stage_end_banner("refine", start_time, &codes);
    codes.last().map(|(_, code)| *code).unwrap_or(1)
}


fn run(settings: &RefineSettings, tools: &ToolRegistry)
        -> Result<Vec<(&'static str, i32)>, PipelineError> {
    let config = check_settings(settings, tools)?;
    print_resolved_settings(&config.resolved());
    create_dir(&config.out_dir)?;
    let out_dir = absolute_dir(&config.out_dir)?;
    let result = run_both(|hap, query| refine_haplotype(&config, &out_dir, tools, hap, query),
                          &config.query_1, &config.query_2)?;
    result.report();
    if result.overall == 0 {
        let manifest = HaplotypeManifest { haplotype_1: refined_assembly(&out_dir, Haplotype::One),
                                           haplotype_2: refined_assembly(&out_dir, Haplotype::Two) };
        save_manifest(&out_dir.join(REFINE_MANIFEST), &manifest)?;
    }
    Ok(result.exit_codes().to_vec())
}


fn check_settings(settings: &RefineSettings, tools: &ToolRegistry)
        -> Result<RefineConfig, ValidationError> {
    let manifest: Option<HaplotypeManifest> = load_optional_manifest(&settings.manifest)?;
    let reference = validate::required_path("-r", &settings.reference)?;
    let query_1 = validate::path_or_manifest("-1", &settings.query_1,
                                             manifest.as_ref().map(|m| m.haplotype_1.as_path()))?;
    let query_2 = validate::path_or_manifest("-2", &settings.query_2,
                                             manifest.as_ref().map(|m| m.haplotype_2.as_path()))?;
    let long_reads = validate::required_path("-l", &settings.long_reads)?;
    let out_dir = validate::required_path("-o", &settings.out_dir)?;
    let threads = validate::positive_int("-t", &settings.threads)?;
    let read_type = validate::choice("-T", &settings.read_type, READ_TYPES)?;
    let reference = validate::input_file("-r", reference)?;
    let query_1 = validate::input_file("-1", query_1)?;
    let query_2 = validate::input_file("-2", query_2)?;
    let long_reads = validate::input_file("-l", long_reads)?;
    let out_dir = validate::output_dir("-o", out_dir)?;
    tools.require(&[RAGTAG, MINIMAP2])?;
    Ok(RefineConfig { reference, query_1, query_2, long_reads, out_dir,
                      threads: threads.to_string(), read_type })
}


/// The correct, scaffold, patch chain for one haplotype. Each task gets its own directory, and
/// each one's result is the next one's query.
fn refine_haplotype(config: &RefineConfig, out_dir: &Path, tools: &ToolRegistry, hap: Haplotype,
                    query: &Path) -> Result<StageResult, PipelineError> {
    let correct_dir = refine_dir(out_dir, "correct", hap);
    let scaffold_dir = refine_dir(out_dir, "scaffold", hap);
    let patch_dir = refine_dir(out_dir, "patch", hap);
    for dir in [&correct_dir, &scaffold_dir, &patch_dir] {
        create_dir(dir)?;
    }

    let corrected = ragtag_result(&correct_dir, "correct");
    let scaffolded = ragtag_result(&scaffold_dir, "scaffold");
    let reference = config.reference.as_path();
    let steps = vec![ragtag_step(config, tools, "correct", &correct_dir, hap, [reference, query])?,
                     ragtag_step(config, tools, "scaffold", &scaffold_dir, hap,
                                 [reference, corrected.as_path()])?,
                     ragtag_step(config, tools, "patch", &patch_dir, hap,
                                 [scaffolded.as_path(), reference])?];
    Ok(run_stage(&format!("refine {}", hap), steps, false))
}


fn ragtag_step(config: &RefineConfig, tools: &ToolRegistry, task: &str, task_dir: &Path,
               hap: Haplotype, inputs: [&Path; 2]) -> Result<Step, ValidationError> {
    // RagTag always writes ragtag.<task>.fasta into its output directory, so that directory is
    // where the result is staged.
    let name = format!("{}_{}", task, hap.number());
    let output = Output::staged_at(ragtag_result(task_dir, task), ragtag_output(task_dir, task),
                                   ArtifactFormat::Fasta);
    let mut command = tools.command(RAGTAG)?;
    command.arg(task).args(inputs)
           .arg("-o").arg(task_dir.join(RAGTAG_OUTPUT_DIR))
           .arg("-t").arg(&config.threads);
    if task == "correct" {
        command.arg("-R").arg(&config.long_reads).arg("-T").arg(&config.read_type);
    }
    command.arg("-w");
    Ok(Step::external(&name, vec![output], vec![Invocation::single(command)],
                      step_log(task_dir, &name)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::read_to_string;
    use tempfile::tempdir;

    use crate::artifacts::{load_manifest, POLISH_MANIFEST};
    use crate::tests::{fake_registry, make_fake_tool, make_recording_tool, make_test_file};

    fn make_inputs(dir: &Path) {
        make_test_file(&dir.join("ref.fa"), ">chr1\nACGTACGT\n");
        make_test_file(&dir.join("scaffold_1.fa"), ">h1\nACGT\n");
        make_test_file(&dir.join("scaffold_2.fa"), ">h2\nACGT\n");
        make_test_file(&dir.join("long.fastq"), "@l\nACGT\n+\nIIII\n");
    }

    fn make_tools(dir: &Path, ragtag_body: &str) -> PathBuf {
        let calls = dir.join("calls.txt");
        make_recording_tool(dir, RAGTAG, &calls, ragtag_body);
        make_fake_tool(dir, MINIMAP2, "exit 0");
        calls
    }

    const RAGTAG_WORKS: &str = "mkdir -p \"$out\"\nprintf '>chr1_RagTag\\nACGT\\n' > \"$out/ragtag.$first.fasta\"";

    fn settings(dir: &Path) -> RefineSettings {
        RefineSettings { reference: Some(dir.join("ref.fa")),
                         query_1: Some(dir.join("scaffold_1.fa")),
                         query_2: Some(dir.join("scaffold_2.fa")),
                         manifest: None, long_reads: Some(dir.join("long.fastq")),
                         out_dir: Some(dir.join("refine")), threads: "24".to_string(),
                         read_type: "ont".to_string() }
    }

    #[test]
    fn test_refine() {
        let dir = tempdir().unwrap();
        make_inputs(dir.path());
        let calls = make_tools(dir.path(), RAGTAG_WORKS);
        assert_eq!(refine(settings(dir.path()), &fake_registry(dir.path())), 0);

        let out_dir = dir.path().join("refine").canonicalize().unwrap();
        for task in ["correct", "scaffold", "patch"] {
            for n in [1, 2] {
                let task_dir = out_dir.join(format!("{}_{}", task, n));
                assert!(task_dir.join(format!("ragtag.{}.fasta", task)).exists());
                assert!(!task_dir.join(RAGTAG_OUTPUT_DIR).join(format!("ragtag.{}.fasta", task)).exists());
            }
        }
        let all_calls = read_to_string(&calls).unwrap();
        assert_eq!(all_calls.lines().count(), 6);
        assert!(all_calls.contains("-R"));
        assert!(all_calls.contains("-T ont"));
        assert!(all_calls.contains(&out_dir.join("correct_2").join("ragtag.correct.fasta")
                                   .display().to_string()));

        let manifest: HaplotypeManifest = load_manifest(&out_dir.join(REFINE_MANIFEST)).unwrap();
        assert_eq!(manifest.haplotype_2, out_dir.join("patch_2").join("ragtag.patch.fasta"));
    }

    #[test]
    fn test_one_haplotype_fails() {
        // Haplotype 1's correct step is killed, haplotype 2 carries on to the end.
        let dir = tempdir().unwrap();
        make_inputs(dir.path());
        let body = format!("case \"$out\" in\n  *correct_1*) exit 137 ;;\nesac\n{}", RAGTAG_WORKS);
        let calls = make_tools(dir.path(), &body);
        let tools = fake_registry(dir.path());
        let s = settings(dir.path());
        let config = check_settings(&s, &tools).unwrap();
        create_dir(&config.out_dir).unwrap();
        let out_dir = absolute_dir(&config.out_dir).unwrap();
        let result = run_both(|hap, query| refine_haplotype(&config, &out_dir, &tools, hap, query),
                              &config.query_1, &config.query_2).unwrap();
        assert_eq!(result.hap_1.exit_code, 137);
        assert_eq!(result.hap_1.stage.as_ref().unwrap().failed.as_ref().unwrap().name, "correct_1");
        assert_eq!(result.hap_2.exit_code, 0);
        assert_eq!(result.overall, 1);
        assert!(out_dir.join("patch_2").join("ragtag.patch.fasta").exists());
        assert!(!out_dir.join("correct_1").join("ragtag.correct.fasta").exists());
        assert!(!out_dir.join("scaffold_1").join("ragtag.scaffold.fasta").exists());
        assert_eq!(read_to_string(&calls).unwrap().lines().count(), 4);

        assert_eq!(refine(settings(dir.path()), &tools), 1);
        assert!(!out_dir.join(REFINE_MANIFEST).exists());
    }

    #[test]
    fn test_refine_from_manifest() {
        let dir = tempdir().unwrap();
        make_inputs(dir.path());
        let calls = make_tools(dir.path(), RAGTAG_WORKS);
        let manifest = HaplotypeManifest { haplotype_1: dir.path().join("scaffold_1.fa"),
                                           haplotype_2: dir.path().join("scaffold_2.fa") };
        save_manifest(&dir.path().join(POLISH_MANIFEST), &manifest).unwrap();
        make_test_file(&dir.path().join("other_2.fa"), ">o2\nACGT\n");
        let mut s = settings(dir.path());
        s.query_1 = None;
        s.query_2 = Some(dir.path().join("other_2.fa"));
        s.manifest = Some(dir.path().join(POLISH_MANIFEST));
        let resolved = check_settings(&s, &fake_registry(dir.path())).unwrap().resolved();
        let path = |name: &str| dir.path().join(name).canonicalize().unwrap().display().to_string();
        assert_eq!(resolved[1], ("haplotype 1", path("scaffold_1.fa")));
        assert_eq!(resolved[2], ("haplotype 2", path("other_2.fa")));
        assert_eq!(refine(s, &fake_registry(dir.path())), 0);
        let all_calls = read_to_string(&calls).unwrap();
        assert!(all_calls.contains("scaffold_1.fa"));
        assert!(all_calls.contains("other_2.fa"));
        assert!(!all_calls.contains("scaffold_2.fa"));
    }

    #[test]
    fn test_refine_validation() {
        let dir = tempdir().unwrap();
        make_inputs(dir.path());
        let calls = make_tools(dir.path(), RAGTAG_WORKS);
        let tools = fake_registry(dir.path());

        let mut s = settings(dir.path());
        s.read_type = "pacbio".to_string();
        assert!(matches!(check_settings(&s, &tools), Err(ValidationError::InvalidChoice { .. })));

        let mut s = settings(dir.path());
        s.query_2 = None;
        assert!(matches!(check_settings(&s, &tools),
                         Err(ValidationError::MissingParameter { flag }) if flag == "-2"));
        assert_eq!(refine(s, &tools), 1);

        let mut s = settings(dir.path());
        s.threads = "0".to_string();
        assert_eq!(refine(s, &tools), 1);

        let s = settings(dir.path());
        let no_minimap2 = ToolRegistry::from_dirs(vec![dir.path().join("nothing_here")]);
        assert!(matches!(check_settings(&s, &no_minimap2), Err(ValidationError::MissingTool { .. })));
        assert!(!calls.exists());
        assert!(!dir.path().join("refine").exists());
    }
}

// This file contains some high-level tests for Hapflow and functions common to other tests.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, read_to_string};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

use crate::annotate::{annotate, AnnotateSettings};
use crate::artifacts::{load_manifest, AnnotationManifest, ANNOTATE_MANIFEST, ASSEMBLE_MANIFEST,
                       CORRECT_MANIFEST, POLISH_MANIFEST, REFINE_MANIFEST};
use crate::assemble::{assemble, AssembleSettings};
use crate::correct::{correct, CorrectSettings};
use crate::polish::{polish, PolishSettings};
use crate::refine::{refine, RefineSettings};
use crate::tools::*;


pub fn make_test_file(file_path: &Path, contents: &str) {
    let mut file = File::create(file_path).unwrap();
    write!(file, "{}", contents).unwrap();
}


pub fn make_gzipped_test_file(file_path: &Path, contents: &str) {
    let mut file = File::create(file_path).unwrap();
    let mut e = GzEncoder::new(Vec::new(), Compression::default());
    e.write_all(contents.as_bytes()).unwrap();
    let _ = file.write_all(&e.finish().unwrap());
}


/// Writes an executable shell script standing in for an external program.
pub fn make_fake_tool(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    {
        let mut file = File::create(&path).unwrap();
        write!(file, "#!/bin/sh\n{}\n", body).unwrap();
        file.sync_all().unwrap();
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}


/// A fake tool that appends its name and arguments to the calls file, then runs the body with
/// $first set to its first argument and $out set to the value of its -o option.
pub fn make_recording_tool(dir: &Path, name: &str, calls: &Path, body: &str) {
    let script = format!("echo {} \"$@\" >> {}\n\
                          first=\"$1\"\n\
                          out=\"\"\n\
                          while [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi\n  shift\ndone\n\
                          {}", name, calls.display(), body);
    make_fake_tool(dir, name, &script);
}


/// Tools are looked for in the given directory first, then in the usual system places so the
/// fake scripts can use mkdir, cat and friends.
pub fn fake_registry(dir: &Path) -> ToolRegistry {
    ToolRegistry::from_dirs(vec![dir.to_path_buf(), PathBuf::from("/bin"), PathBuf::from("/usr/bin")])
}


pub fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}


fn make_all_tools(tool_dir: &Path, install_dir: &Path, calls: &Path) {
    let bin = install_dir.join(HELPER_BIN_DIR);
    fs::create_dir_all(tool_dir).unwrap();
    fs::create_dir_all(&bin).unwrap();
    make_recording_tool(tool_dir, RATATOSK, calls, "printf '@long\\nACGTACGT\\n+\\nIIIIIIII\\n' > \"$out.fastq\"");
    make_recording_tool(tool_dir, FLYE, calls, "mkdir -p \"$out\"\nprintf '>contig_1\\nACGTACGT\\n' > \"$out/assembly.fasta\"");
    make_recording_tool(tool_dir, MINIMAP2, calls, "echo '@HD\tVN:1.6'");
    make_recording_tool(tool_dir, SAMTOOLS, calls, "cat > \"$out\"");
    make_recording_tool(tool_dir, RAGTAG, calls, "mkdir -p \"$out\"\nprintf '>chr1_RagTag\\nACGT\\n' > \"$out/ragtag.$first.fasta\"");
    make_recording_tool(tool_dir, MINIPROT, calls, "echo '##gff-version 3'");
    make_recording_tool(tool_dir, LIFTON, calls, "echo '##gff-version 3' > \"$out\"");
    make_recording_tool(&bin, SUK, calls, "echo kmers > \"$out-bv.bin\"");
    make_recording_tool(&bin, MISJOIN, calls, "printf '>a\\nACGT\\n' > \"$out\"");
    make_recording_tool(&bin, OVERLAP, calls, "printf '>b\\nACGT\\n' > \"$out\"");
    make_recording_tool(&bin, HYPO, calls, "printf '>c\\nACGT\\n' > \"$out\"");
    make_recording_tool(&bin, SCAFFOLD, calls, "printf '>h1\\nACGT\\n' > \"${out}_1.fa\"\n\
                                                printf '>h2\\nACGT\\n' > \"${out}_2.fa\"");
}


fn calls_to(calls: &Path, tool: &str) -> usize {
    read_to_string(calls).unwrap().lines()
        .filter(|l| l.split_whitespace().next() == Some(tool)).count()
}


#[test]
fn test_whole_pipeline_through_manifests() {
    // Each stage after the first finds its input through the previous stage's manifest.
    let dir = tempdir().unwrap();
    let d = dir.path();
    let calls = d.join("calls.txt");
    make_all_tools(&d.join("tools"), &d.join("install"), &calls);
    let tools = fake_registry(&d.join("tools"));
    make_test_file(&d.join("HG002.fastq"), "@long\nACGTACGT\n+\nIIIIIIII\n");
    make_test_file(&d.join("HG002_R1.fq"), "@p1/1\nACGT\n+\nIIII\n");
    make_test_file(&d.join("HG002_R2.fq"), "@p1/2\nTGCA\n+\nIIII\n");
    make_test_file(&d.join("ref.fa"), ">chr1\nACGTACGT\n");
    make_test_file(&d.join("ref.gff3"), "##gff-version 3\n");
    make_test_file(&d.join("proteins.fa"), ">p1\nMKV\n");
    make_test_file(&d.join("transcripts.fa"), ">t1\nACGT\n");

    let correct_settings = CorrectSettings {
        work_dir: Some(d.to_path_buf()), long_reads: Some(d.join("HG002.fastq")),
        short_reads: Some(format!("{},{}", d.join("HG002_R1.fq").display(),
                                  d.join("HG002_R2.fq").display())),
        out_dir: Some(d.join("1_correct")), chemistry: "R10".to_string(), sample: None,
        cores: "24".to_string() };
    assert_eq!(correct(correct_settings, &tools), 0);

    let assemble_settings = AssembleSettings {
        reads: None, manifest: Some(d.join("1_correct").join(CORRECT_MANIFEST)),
        out_dir: Some(d.join("2_assemble")), threads: "64".to_string(),
        genome_size: "2.5g".to_string() };
    assert_eq!(assemble(assemble_settings, &tools), 0);

    let polish_settings = PolishSettings {
        draft: None, manifest: Some(d.join("2_assemble").join(ASSEMBLE_MANIFEST)),
        long_reads: Some(d.join("HG002.fastq")), short_reads_1: Some(d.join("HG002_R1.fq")),
        short_reads_2: Some(d.join("HG002_R2.fq")), out_dir: Some(d.join("3_polish")),
        install_dir: Some(d.join("install")), threads: "24".to_string(),
        genome_size: "2.5G".to_string(), kmer: "17".to_string(), long_coverage: "25".to_string(),
        short_coverage: "25".to_string(), batches: "20".to_string() };
    assert_eq!(polish(polish_settings, &tools), 0);

    let refine_settings = RefineSettings {
        reference: Some(d.join("ref.fa")), query_1: None, query_2: None,
        manifest: Some(d.join("3_polish").join(POLISH_MANIFEST)),
        long_reads: Some(d.join("HG002.fastq")), out_dir: Some(d.join("4_refine")),
        threads: "24".to_string(), read_type: "ont".to_string() };
    assert_eq!(refine(refine_settings, &tools), 0);

    let annotate_settings = AnnotateSettings {
        reference: Some(d.join("ref.fa")), assembly_1: None, assembly_2: None,
        manifest: Some(d.join("4_refine").join(REFINE_MANIFEST)),
        annotation: Some(d.join("ref.gff3")), proteins: Some(d.join("proteins.fa")),
        transcripts: Some(d.join("transcripts.fa")), out_dir: Some(d.join("5_annotate")),
        threads: "24".to_string() };
    assert_eq!(annotate(annotate_settings, &tools), 0);

    let manifest: AnnotationManifest = load_manifest(&d.join("5_annotate").join(ANNOTATE_MANIFEST)).unwrap();
    assert!(manifest.annotation_1.exists());
    assert!(manifest.annotation_2.exists());
    assert_eq!(calls_to(&calls, RATATOSK), 1);
    assert_eq!(calls_to(&calls, FLYE), 1);
    assert_eq!(calls_to(&calls, SCAFFOLD), 1);
    assert_eq!(calls_to(&calls, RAGTAG), 6);
    assert_eq!(calls_to(&calls, LIFTON), 2);
    let refine_calls = read_to_string(&calls).unwrap();
    assert!(refine_calls.contains(&format!("correct {} ", d.join("ref.fa").canonicalize().unwrap().display())));
}


#[test]
fn test_rerun_runs_nothing() {
    let dir = tempdir().unwrap();
    let d = dir.path();
    let calls = d.join("calls.txt");
    make_all_tools(&d.join("tools"), &d.join("install"), &calls);
    let tools = fake_registry(&d.join("tools"));
    make_test_file(&d.join("reads.fastq"), "@r\nACGT\n+\nIIII\n");
    let settings = AssembleSettings {
        reads: Some(d.join("reads.fastq")), manifest: None, out_dir: Some(d.join("assemble")),
        threads: "8".to_string(), genome_size: "5m".to_string() };
    assert_eq!(assemble(settings.clone(), &tools), 0);
    assert_eq!(calls_to(&calls, FLYE), 1);
    assert_eq!(assemble(settings, &tools), 0);
    assert_eq!(calls_to(&calls, FLYE), 1);
    let log = read_to_string(d.join("assemble").join("assemble.log")).unwrap();
    assert_eq!(log.matches("=== assemble started").count(), 1);
}

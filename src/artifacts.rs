// This file defines every well-known artifact path in the pipeline and the YAML manifests that
// each stage leaves behind for the next one.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, ValidationError};
use crate::haplotype::Haplotype;


pub const CORRECT_MANIFEST: &str = "correct.yaml";
pub const ASSEMBLE_MANIFEST: &str = "assemble.yaml";
pub const POLISH_MANIFEST: &str = "polish.yaml";
pub const REFINE_MANIFEST: &str = "refine.yaml";
pub const ANNOTATE_MANIFEST: &str = "annotate.yaml";

const STAGING_TAG: &str = "partial";


/// The path a step writes to before its output is checked and renamed onto the declared
/// artifact: scaffold_1.fa -> scaffold_1.partial.fa. The extension is kept last because some
/// tools choose their output format from it.
pub fn staging_path(artifact: &Path) -> PathBuf {
    let stem = artifact.file_stem().unwrap_or_default().to_string_lossy();
    let name = match artifact.extension() {
        Some(ext) => format!("{}.{}.{}", stem, STAGING_TAG, ext.to_string_lossy()),
        None => format!("{}.{}", stem, STAGING_TAG),
    };
    artifact.with_file_name(name)
}


pub fn step_log(dir: &Path, step_name: &str) -> PathBuf {
    dir.join(format!("{}.log", step_name))
}


// Correction stage
pub fn preprocessed_mate(out_dir: &Path, sample: &str, mate: usize) -> PathBuf {
    out_dir.join(format!("{}_R{}.fq", sample, mate))
}

pub fn merged_short_reads(out_dir: &Path, sample: &str) -> PathBuf {
    out_dir.join(format!("{}.short_reads.fq", sample))
}

pub fn corrected_reads(out_dir: &Path, sample: &str) -> PathBuf {
    out_dir.join(format!("{}.corrected.fastq", sample))
}


// Assembly stage
pub fn flye_dir(out_dir: &Path) -> PathBuf {
    out_dir.join("flye")
}

pub fn draft_assembly(out_dir: &Path) -> PathBuf {
    out_dir.join("draft_assembly.fasta")
}


// Polishing stage: intermediates live in tempdir, only the scaffolds are copied up.
pub fn polish_tempdir(out_dir: &Path) -> PathBuf {
    out_dir.join("tempdir")
}

pub fn short_read_list(tempdir: &Path) -> PathBuf {
    tempdir.join("short_reads.txt")
}

pub fn long_to_draft_bam(tempdir: &Path) -> PathBuf {
    tempdir.join("lr_draft.bam")
}

pub fn solid_kmers_prefix(tempdir: &Path) -> PathBuf {
    tempdir.join("suk")
}

pub fn solid_kmers(tempdir: &Path) -> PathBuf {
    solid_kmers_output(&solid_kmers_prefix(tempdir))
}

pub fn solid_kmers_output(prefix: &Path) -> PathBuf {
    // suk writes <prefix>-bv.bin
    suffixed(prefix, "-bv.bin")
}

pub fn misjoin_fasta(tempdir: &Path) -> PathBuf {
    tempdir.join("misjoin.fa")
}

pub fn overlap_fasta(tempdir: &Path) -> PathBuf {
    tempdir.join("overlap.fa")
}

pub fn long_to_overlap_bam(tempdir: &Path) -> PathBuf {
    tempdir.join("lr_overlap.bam")
}

pub fn short_to_overlap_bam(tempdir: &Path) -> PathBuf {
    tempdir.join("sr_overlap.bam")
}

pub fn polished_fasta(tempdir: &Path) -> PathBuf {
    tempdir.join("polished.fa")
}

pub fn scaffold_prefix(tempdir: &Path) -> PathBuf {
    tempdir.join("scaffold")
}

pub fn scaffold_fasta(dir: &Path, hap: Haplotype) -> PathBuf {
    // Used for both the tempdir copy and the final copy in the stage's output directory.
    dir.join(format!("scaffold_{}.fa", hap.number()))
}

pub fn scaffold_output(prefix: &Path, hap: Haplotype) -> PathBuf {
    // scaffold writes <prefix>_1.fa and <prefix>_2.fa
    suffixed(prefix, &format!("_{}.fa", hap.number()))
}


// Refinement stage
pub const RAGTAG_OUTPUT_DIR: &str = "ragtag_output";

pub fn refine_dir(out_dir: &Path, task: &str, hap: Haplotype) -> PathBuf {
    out_dir.join(format!("{}_{}", task, hap.number()))
}

pub fn ragtag_output(task_dir: &Path, task: &str) -> PathBuf {
    task_dir.join(RAGTAG_OUTPUT_DIR).join(format!("ragtag.{}.fasta", task))
}

pub fn ragtag_result(task_dir: &Path, task: &str) -> PathBuf {
    task_dir.join(format!("ragtag.{}.fasta", task))
}

pub fn refined_assembly(out_dir: &Path, hap: Haplotype) -> PathBuf {
    ragtag_result(&refine_dir(out_dir, "patch", hap), "patch")
}


// Annotation stage
pub fn annotation_dir(out_dir: &Path, hap: Haplotype) -> PathBuf {
    out_dir.join(format!("hap_{}", hap.number()))
}

pub fn miniprot_gff(hap_dir: &Path, hap: Haplotype) -> PathBuf {
    hap_dir.join(format!("miniprot_{}.gff", hap.number()))
}

pub fn lifton_gff(hap_dir: &Path, hap: Haplotype) -> PathBuf {
    hap_dir.join(format!("lifton_{}.gff", hap.number()))
}


fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorrectionManifest {
    pub sample: String,
    pub short_reads: PathBuf,
    pub corrected_reads: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssemblyManifest {
    pub draft_assembly: PathBuf,
}

/// Written by both the polishing and refinement stages: one assembly per haplotype.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HaplotypeManifest {
    pub haplotype_1: PathBuf,
    pub haplotype_2: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnnotationManifest {
    pub annotation_1: PathBuf,
    pub annotation_2: PathBuf,
}


pub fn save_manifest<T: Serialize>(filename: &Path, data: &T) -> Result<(), PipelineError> {
    let manifest_error = |reason: String| PipelineError::Manifest { path: filename.to_path_buf(),
                                                                    reason };
    let yaml_string = serde_yaml::to_string(data).map_err(|e| manifest_error(e.to_string()))?;
    let mut file = File::create(filename).map_err(|e| manifest_error(e.to_string()))?;
    file.write_all(yaml_string.as_bytes()).map_err(|e| manifest_error(e.to_string()))?;
    Ok(())
}


pub fn load_manifest<T: DeserializeOwned>(filename: &Path) -> Result<T, ValidationError> {
    let bad_manifest = |reason: String| ValidationError::BadManifest { path: filename.to_path_buf(),
                                                                       reason };
    let file = File::open(filename).map_err(|e| bad_manifest(e.to_string()))?;
    serde_yaml::from_reader(file).map_err(|e| bad_manifest(e.to_string()))
}


pub fn load_optional_manifest<T: DeserializeOwned>(filename: &Option<PathBuf>)
        -> Result<Option<T>, ValidationError> {
    filename.as_deref().map(load_manifest::<T>).transpose()
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::tests::make_test_file;

    #[test]
    fn test_staging_path() {
        assert_eq!(staging_path(Path::new("/o/scaffold_1.fa")), PathBuf::from("/o/scaffold_1.partial.fa"));
        assert_eq!(staging_path(Path::new("c/ragtag.correct.fasta")),
                   PathBuf::from("c/ragtag.correct.partial.fasta"));
        assert_eq!(staging_path(Path::new("t/lr_draft.bam")), PathBuf::from("t/lr_draft.partial.bam"));
        assert_eq!(staging_path(Path::new("t/noext")), PathBuf::from("t/noext.partial"));
    }

    #[test]
    fn test_polish_paths_feed_refine() {
        // The polishing stage's final scaffolds are exactly what refinement looks for by default.
        let out = Path::new("/run/polish");
        let tmp = polish_tempdir(out);
        assert_eq!(scaffold_fasta(&tmp, Haplotype::One), PathBuf::from("/run/polish/tempdir/scaffold_1.fa"));
        assert_eq!(scaffold_fasta(out, Haplotype::Two), PathBuf::from("/run/polish/scaffold_2.fa"));
        assert_eq!(scaffold_output(&scaffold_prefix(&tmp), Haplotype::Two),
                   PathBuf::from("/run/polish/tempdir/scaffold_2.fa"));
        assert_eq!(solid_kmers(&tmp), PathBuf::from("/run/polish/tempdir/suk-bv.bin"));
        assert_eq!(solid_kmers_output(&staging_path(&solid_kmers_prefix(&tmp))),
                   PathBuf::from("/run/polish/tempdir/suk.partial-bv.bin"));
    }

    #[test]
    fn test_haplotype_dirs_are_disjoint() {
        let out = Path::new("/run/refine");
        for task in ["correct", "scaffold", "patch"] {
            assert_ne!(refine_dir(out, task, Haplotype::One), refine_dir(out, task, Haplotype::Two));
        }
        assert_eq!(refined_assembly(out, Haplotype::Two),
                   PathBuf::from("/run/refine/patch_2/ragtag.patch.fasta"));
        assert_eq!(ragtag_output(&refine_dir(out, "correct", Haplotype::One), "correct"),
                   PathBuf::from("/run/refine/correct_1/ragtag_output/ragtag.correct.fasta"));
        let ann = Path::new("/run/annotate");
        assert_eq!(lifton_gff(&annotation_dir(ann, Haplotype::One), Haplotype::One),
                   PathBuf::from("/run/annotate/hap_1/lifton_1.gff"));
    }

    #[test]
    fn test_manifest_save_and_load() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join(POLISH_MANIFEST);
        let manifest = HaplotypeManifest { haplotype_1: PathBuf::from("/a/scaffold_1.fa"),
                                           haplotype_2: PathBuf::from("/a/scaffold_2.fa") };
        save_manifest(&yaml, &manifest).unwrap();
        let loaded: HaplotypeManifest = load_manifest(&yaml).unwrap();
        assert_eq!(loaded, manifest);
        let loaded: Option<HaplotypeManifest> = load_optional_manifest(&Some(yaml)).unwrap();
        assert_eq!(loaded, Some(manifest));
        let loaded: Option<HaplotypeManifest> = load_optional_manifest(&None).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_bad_manifest() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join(ASSEMBLE_MANIFEST);
        make_test_file(&yaml, "not_the_right_field: 3\n");
        let result: Result<AssemblyManifest, _> = load_manifest(&yaml);
        assert!(matches!(result, Err(ValidationError::BadManifest { .. })));
        let result: Result<AssemblyManifest, _> = load_manifest(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ValidationError::BadManifest { .. })));
    }
}

// This is the main file of Hapflow and where execution starts. It mainly handles the CLI and then
// calls into other files to run whichever stage the user chose.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;
use clap::{Parser, Subcommand, crate_version};

mod annotate;
mod artifacts;
mod assemble;
mod correct;
mod error;
mod haplotype;
mod log;
mod misc;
mod polish;
mod refine;
mod stage;
mod step;
mod tools;
mod validate;

#[cfg(test)]
mod tests;

use crate::tools::ToolRegistry;

// Flags the stages require are optional here so that a missing one is reported by the stage's own
// validation, with the stage banners and exit code 1.

#[derive(Parser)]
#[clap(name = "Hapflow",
       version = concat!("v", crate_version!()),
       about = "resumable diploid genome assembly from ONT long reads and short reads")]
#[command(author, version, long_about = None, disable_help_subcommand = true,
          propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {

    /// correct long reads using merged short-read mates
    Correct {
        /// Working directory for the correction tool (required)
        #[clap(short = 'w', long = "work_dir")]
        work_dir: Option<PathBuf>,

        /// ONT long reads in FASTQ format (required)
        #[clap(short = 'l', long = "long_reads")]
        long_reads: Option<PathBuf>,

        /// Short-read mate files, comma-separated: R1,R2 (required)
        #[clap(short = 's', long = "short_reads")]
        short_reads: Option<String>,

        /// Output directory (required)
        #[clap(short = 'o', long = "out_dir")]
        out_dir: Option<PathBuf>,

        /// Sequencing chemistry: R9 or R10
        #[clap(short = 't', long = "chemistry", default_value = "R10")]
        chemistry: String,

        /// Sample name used for output files
        #[clap(short = 'n', long = "sample", hide_default_value = true,
               help = "Sample name used for output files [default: from long-read filename]")]
        sample: Option<String>,

        /// Number of CPU cores
        #[clap(short = 'c', long = "cores", default_value = "24")]
        cores: String,
    },

    /// assemble corrected long reads into a draft assembly
    Assemble {
        /// Corrected long reads (either -r or -m is required)
        #[clap(short = 'r', long = "reads")]
        reads: Option<PathBuf>,

        /// correct.yaml from the correct stage (either -r or -m is required)
        #[clap(short = 'm', long = "manifest")]
        manifest: Option<PathBuf>,

        /// Output directory (required)
        #[clap(short = 'o', long = "out_dir")]
        out_dir: Option<PathBuf>,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "64")]
        threads: String,

        /// Estimated genome size
        #[clap(short = 'g', long = "genome_size", default_value = "2.5g")]
        genome_size: String,
    },

    /// polish and scaffold the draft assembly into two haplotypes
    Polish {
        /// Draft assembly (either -d or -m is required)
        #[clap(short = 'd', long = "draft")]
        draft: Option<PathBuf>,

        /// assemble.yaml from the assemble stage (either -d or -m is required)
        #[clap(short = 'm', long = "manifest")]
        manifest: Option<PathBuf>,

        /// ONT long reads (required)
        #[clap(short = 'l', long = "long_reads")]
        long_reads: Option<PathBuf>,

        /// Short reads, mate 1 (required)
        #[clap(short = '1', long = "short_reads_1")]
        short_reads_1: Option<PathBuf>,

        /// Short reads, mate 2 (required)
        #[clap(short = '2', long = "short_reads_2")]
        short_reads_2: Option<PathBuf>,

        /// Output directory (required)
        #[clap(short = 'o', long = "out_dir")]
        out_dir: Option<PathBuf>,

        /// Polishing tool install directory, with helper programs in its bin directory (required)
        #[clap(short = 'i', long = "install_dir")]
        install_dir: Option<PathBuf>,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "24")]
        threads: String,

        /// Estimated genome size
        #[clap(short = 'g', long = "genome_size", default_value = "2.5G")]
        genome_size: String,

        /// K-mer size for solid k-mers
        #[clap(short = 'k', long = "kmer", default_value = "17")]
        kmer: String,

        /// Long-read coverage
        #[clap(short = 'L', long = "long_cov", default_value = "25")]
        long_cov: String,

        /// Short-read coverage
        #[clap(short = 'S', long = "short_cov", default_value = "25")]
        short_cov: String,

        /// Number of polishing batches
        #[clap(short = 'b', long = "batches", default_value = "20")]
        batches: String,
    },

    /// correct, scaffold and patch both haplotypes against a reference
    Refine {
        /// Reference genome (required)
        #[clap(short = 'r', long = "reference")]
        reference: Option<PathBuf>,

        /// Haplotype 1 assembly (either -1/-2 or -m is required)
        #[clap(short = '1', long = "query_1")]
        query_1: Option<PathBuf>,

        /// Haplotype 2 assembly (either -1/-2 or -m is required)
        #[clap(short = '2', long = "query_2")]
        query_2: Option<PathBuf>,

        /// polish.yaml from the polish stage
        #[clap(short = 'm', long = "manifest")]
        manifest: Option<PathBuf>,

        /// Long reads used to validate corrections (required)
        #[clap(short = 'l', long = "long_reads")]
        long_reads: Option<PathBuf>,

        /// Output directory (required)
        #[clap(short = 'o', long = "out_dir")]
        out_dir: Option<PathBuf>,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "24")]
        threads: String,

        /// Long-read type: sr, ont or corr
        #[clap(short = 'T', long = "read_type", default_value = "ont")]
        read_type: String,
    },

    /// lift a reference annotation over to both haplotypes
    Annotate {
        /// Reference genome (required)
        #[clap(short = 'r', long = "reference")]
        reference: Option<PathBuf>,

        /// Haplotype 1 assembly (either -1/-2 or -m is required)
        #[clap(short = '1', long = "assembly_1")]
        assembly_1: Option<PathBuf>,

        /// Haplotype 2 assembly (either -1/-2 or -m is required)
        #[clap(short = '2', long = "assembly_2")]
        assembly_2: Option<PathBuf>,

        /// refine.yaml from the refine stage
        #[clap(short = 'm', long = "manifest")]
        manifest: Option<PathBuf>,

        /// Reference annotation in GFF3 format (required)
        #[clap(short = 'a', long = "annotation")]
        annotation: Option<PathBuf>,

        /// Reference proteins in FASTA format (required)
        #[clap(short = 'p', long = "proteins")]
        proteins: Option<PathBuf>,

        /// Reference transcripts in FASTA format (required)
        #[clap(short = 'x', long = "transcripts")]
        transcripts: Option<PathBuf>,

        /// Output directory (required)
        #[clap(short = 'o', long = "out_dir")]
        out_dir: Option<PathBuf>,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "24")]
        threads: String,
    },
}


fn main() {
    let cli = Cli::parse();
    let tools = ToolRegistry::from_env();

    let code = match cli.command {
        Some(Commands::Correct { work_dir, long_reads, short_reads, out_dir, chemistry, sample,
                                 cores }) => {
            correct::correct(correct::CorrectSettings { work_dir, long_reads, short_reads, out_dir,
                                                        chemistry, sample, cores }, &tools)
        },
        Some(Commands::Assemble { reads, manifest, out_dir, threads, genome_size }) => {
            assemble::assemble(assemble::AssembleSettings { reads, manifest, out_dir, threads,
                                                            genome_size }, &tools)
        },
        Some(Commands::Polish { draft, manifest, long_reads, short_reads_1, short_reads_2, out_dir,
                                install_dir, threads, genome_size, kmer, long_cov, short_cov,
                                batches }) => {
            polish::polish(polish::PolishSettings { draft, manifest, long_reads, short_reads_1,
                                                    short_reads_2, out_dir, install_dir, threads,
                                                    genome_size, kmer, long_coverage: long_cov,
                                                    short_coverage: short_cov, batches }, &tools)
        },
        Some(Commands::Refine { reference, query_1, query_2, manifest, long_reads, out_dir,
                                threads, read_type }) => {
            refine::refine(refine::RefineSettings { reference, query_1, query_2, manifest,
                                                    long_reads, out_dir, threads, read_type },
                           &tools)
        },
        Some(Commands::Annotate { reference, assembly_1, assembly_2, manifest, annotation,
                                  proteins, transcripts, out_dir, threads }) => {
            annotate::annotate(annotate::AnnotateSettings { reference, assembly_1, assembly_2,
                                                            manifest, annotation, proteins,
                                                            transcripts, out_dir, threads },
                               &tools)
        },
        None => 0,
    };
    std::process::exit(code);
}

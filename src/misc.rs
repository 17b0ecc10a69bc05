// This file contains miscellaneous functions used by various parts of Hapflow.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use flate2::read::MultiGzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::fs::{File, create_dir_all};
use std::io;
use std::io::{prelude::*, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Duration;

use crate::error::PipelineError;


pub fn create_dir(dir_path: &Path) -> Result<(), PipelineError> {
    // mkdir -p semantics: an existing directory is fine.
    create_dir_all(dir_path).map_err(|e| PipelineError::CreateDir { path: dir_path.to_path_buf(),
                                                                   source: e })
}


pub fn absolute_dir(dir_path: &Path) -> Result<PathBuf, PipelineError> {
    // Only call this after the directory exists. Tools can be run from a different working
    // directory, so every path handed to them is made absolute.
    dir_path.canonicalize().map_err(|e| PipelineError::Io { path: dir_path.to_path_buf(),
                                                            source: e })
}


pub fn is_file_gzipped(filename: &Path) -> io::Result<bool> {
    // Returns true if the file appears to be gzipped (based on the first two bytes). Files too
    // small to hold two bytes are not gzipped.
    let mut reader = BufReader::new(File::open(filename)?);
    let mut buf = [0u8; 2];
    match reader.read_exact(&mut buf) {
        Ok(_) => Ok(buf[0] == 31 && buf[1] == 139),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}


pub fn open_text_file(filename: &Path) -> io::Result<Box<dyn BufRead>> {
    // Returns a buffered reader that works on both unzipped and gzipped files.
    let file = File::open(filename)?;
    let reader: Box<dyn Read> = if is_file_gzipped(filename)? { Box::new(MultiGzDecoder::new(file)) }
                                                         else { Box::new(file) };
    Ok(Box::new(BufReader::new(reader)))
}


pub fn looks_like_fasta(filename: &Path) -> bool {
    // True if the first record of the file parses as FASTA.
    let Ok(file) = File::open(filename) else { return false };
    let mut reader = seq_io::fasta::Reader::new(file);
    matches!(reader.next(), Some(Ok(_)))
}


pub fn looks_like_fastq(filename: &Path) -> bool {
    // True if the first record of the file parses as FASTQ.
    let Ok(file) = File::open(filename) else { return false };
    let mut reader = seq_io::fastq::Reader::new(file);
    matches!(reader.next(), Some(Ok(_)))
}


pub fn sample_name_from_path(filename: &Path) -> String {
    // Drops the directory and any read/assembly extensions (with or without .gz), so
    // /data/HG002.ont.fastq.gz becomes HG002.ont.
    let file_name = filename.file_name().unwrap_or_default().to_string_lossy().to_string();
    let re = Regex::new(r"^(.+?)(\.(fastq|fq|fasta|fa|fna|bam))?(\.gz)?$").unwrap();
    match re.captures(&file_name) {
        Some(caps) => caps[1].to_string(),
        None => file_name,
    }
}


pub fn parse_genome_size(genome_size: &str) -> Option<u64> {
    // Accepts plain integers or a number followed by k/m/g (either case), e.g. 2.5g or 800M.
    let genome_size = genome_size.trim().to_lowercase();
    let (number, multiplier) = match genome_size.chars().last()? {
        'k' => (&genome_size[..genome_size.len()-1], 1_000.0),
        'm' => (&genome_size[..genome_size.len()-1], 1_000_000.0),
        'g' => (&genome_size[..genome_size.len()-1], 1_000_000_000.0),
        _   => (genome_size.as_str(), 1.0),
    };
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() { return None; }
    let size = (value * multiplier).round();
    if size < 1.0 { return None; }
    Some(size as u64)
}


pub fn command_line(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().to_string()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}


pub fn exit_code(status: ExitStatus) -> i32 {
    // A process killed by a signal reports 128 + signal number, the same as a shell would.
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}


pub fn format_duration(duration: std::time::Duration) -> String {
    let microseconds = duration.as_micros() % 1000000;
    let seconds =      duration.as_micros() / 1000000 % 60;
    let minutes =      duration.as_micros() / 1000000 / 60 % 60;
    let hours =        duration.as_micros() / 1000000 / 60 / 60;
    format!("{}:{:02}:{:02}.{:06}", hours, minutes, seconds, microseconds)
}


pub fn spinner(message: &str) -> ProgressBar {
    if cfg!(test) {
        ProgressBar::hidden() // don't show a spinner during unit tests
    } else {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
                .template("{spinner} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::tests::{make_gzipped_test_file, make_test_file};

    #[test]
    fn test_format_duration() {
        let d1 = std::time::Duration::from_micros(123456789);
        let d2 = std::time::Duration::from_micros(3661000001);
        let d3 = std::time::Duration::from_micros(360959000001);
        assert_eq!(format_duration(d1), "0:02:03.456789");
        assert_eq!(format_duration(d2), "1:01:01.000001");
        assert_eq!(format_duration(d3), "100:15:59.000001");
    }

    #[test]
    fn test_sample_name_from_path() {
        assert_eq!(sample_name_from_path(Path::new("/data/HG002.fastq.gz")), "HG002");
        assert_eq!(sample_name_from_path(Path::new("HG002.ont.fq")), "HG002.ont");
        assert_eq!(sample_name_from_path(Path::new("reads.fasta")), "reads");
        assert_eq!(sample_name_from_path(Path::new("reads")), "reads");
        assert_eq!(sample_name_from_path(Path::new("dir/sample_1.txt")), "sample_1.txt");
    }

    #[test]
    fn test_parse_genome_size() {
        assert_eq!(parse_genome_size("2.5g"), Some(2_500_000_000));
        assert_eq!(parse_genome_size("2.5G"), Some(2_500_000_000));
        assert_eq!(parse_genome_size("800m"), Some(800_000_000));
        assert_eq!(parse_genome_size("150K"), Some(150_000));
        assert_eq!(parse_genome_size("5000000"), Some(5_000_000));
        assert_eq!(parse_genome_size("0"), None);
        assert_eq!(parse_genome_size("-3g"), None);
        assert_eq!(parse_genome_size("g"), None);
        assert_eq!(parse_genome_size("big"), None);
        assert_eq!(parse_genome_size(""), None);
    }

    #[test]
    fn test_gzip_detection_and_reading() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("reads.fq");
        let gzipped = dir.path().join("reads.fq.gz");
        let tiny = dir.path().join("tiny.fq");
        make_test_file(&plain, "@r1\nACGT\n+\nIIII\n");
        make_gzipped_test_file(&gzipped, "@r1\nACGT\n+\nIIII\n");
        make_test_file(&tiny, "@");
        assert!(!is_file_gzipped(&plain).unwrap());
        assert!(is_file_gzipped(&gzipped).unwrap());
        assert!(!is_file_gzipped(&tiny).unwrap());
        let lines: Vec<String> = open_text_file(&gzipped).unwrap().lines()
            .map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["@r1", "ACGT", "+", "IIII"]);
    }

    #[test]
    fn test_format_sniffing() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("a.fa");
        let fastq = dir.path().join("a.fq");
        let junk = dir.path().join("junk.txt");
        make_test_file(&fasta, ">ctg1\nACGT\n");
        make_test_file(&fastq, "@r1\nACGT\n+\nIIII\n");
        make_test_file(&junk, "not a sequence file\n");
        assert!(looks_like_fasta(&fasta));
        assert!(!looks_like_fasta(&fastq));
        assert!(!looks_like_fasta(&junk));
        assert!(looks_like_fastq(&fastq));
        assert!(!looks_like_fastq(&fasta));
        assert!(!looks_like_fasta(&dir.path().join("missing.fa")));
    }

    #[test]
    fn test_command_line() {
        let mut command = Command::new("minimap2");
        command.args(["-ax", "map-ont", "-t", "8"]);
        assert_eq!(command_line(&command), "minimap2 -ax map-ont -t 8");
    }

    #[test]
    fn test_exit_code() {
        let status = Command::new("sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(exit_code(status), 3);
        let status = Command::new("sh").args(["-c", "kill -9 $$"]).status().unwrap();
        assert_eq!(exit_code(status), 137);
    }
}

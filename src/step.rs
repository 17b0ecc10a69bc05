// This file contains the resumable step runner: a step runs only when its declared artifacts are
// missing, and its outputs only reach their declared paths after the step succeeded.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::artifacts::staging_path;
use crate::log::timestamp;
use crate::misc::{command_line, exit_code, looks_like_fasta, looks_like_fastq};


#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArtifactFormat {
    Fasta,
    Fastq,
    Any,
}


/// One declared artifact of a step, plus the path the step actually writes to.
#[derive(Clone, Debug)]
pub struct Output {
    pub artifact: PathBuf,
    pub staged: PathBuf,
    pub format: ArtifactFormat,
}

impl Output {
    pub fn new(artifact: PathBuf, format: ArtifactFormat) -> Self {
        let staged = staging_path(&artifact);
        Output { artifact, staged, format }
    }

    /// For tools that pick their own output file name inside a directory we give them.
    pub fn staged_at(artifact: PathBuf, staged: PathBuf, format: ArtifactFormat) -> Self {
        Output { artifact, staged, format }
    }
}


/// One external command line, or a pipe of several (each one's stdout feeding the next one's
/// stdin). If `stdout` is set, the last command's stdout goes to that file instead of the log.
pub struct Invocation {
    pub commands: Vec<Command>,
    pub stdout: Option<PathBuf>,
}

impl Invocation {
    pub fn single(command: Command) -> Self {
        Invocation { commands: vec![command], stdout: None }
    }

    pub fn pipe(commands: Vec<Command>) -> Self {
        Invocation { commands, stdout: None }
    }

    pub fn stdout_to(mut self, path: PathBuf) -> Self {
        self.stdout = Some(path);
        self
    }

    fn description(&self) -> String {
        let mut text = self.commands.iter().map(command_line).collect::<Vec<_>>().join(" | ");
        if let Some(stdout) = &self.stdout {
            text.push_str(&format!(" > {}", stdout.display()));
        }
        text
    }
}


pub type NativeAction = Box<dyn FnOnce() -> io::Result<()> + Send>;

pub enum Action {
    /// Invocations run in order, stopping at the first non-zero exit.
    External(Vec<Invocation>),
    /// Work done inside Hapflow itself. It must write only to its outputs' staged paths.
    Native(NativeAction),
}


pub struct Step {
    pub name: String,
    pub outputs: Vec<Output>,
    pub action: Action,
    pub log: PathBuf,
}

impl Step {
    pub fn external(name: &str, outputs: Vec<Output>, invocations: Vec<Invocation>,
                    log: PathBuf) -> Self {
        Step { name: name.to_string(), outputs, action: Action::External(invocations), log }
    }

    pub fn native(name: &str, outputs: Vec<Output>, action: NativeAction, log: PathBuf) -> Self {
        Step { name: name.to_string(), outputs, action: Action::Native(action), log }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub enum StepFailure {
    NonZeroExit(i32),
    LaunchFailed(String),
    ActionFailed(String),
    MissingOutput(PathBuf),
    EmptyOutput(PathBuf),
    MalformedOutput(PathBuf),
    CommitFailed(String),
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepFailure::NonZeroExit(code)    => write!(f, "command exited with code {}", code),
            StepFailure::LaunchFailed(e)      => write!(f, "command could not be run: {}", e),
            StepFailure::ActionFailed(e)      => write!(f, "{}", e),
            StepFailure::MissingOutput(p)     => write!(f, "command succeeded but did not create {}", p.display()),
            StepFailure::EmptyOutput(p)       => write!(f, "command succeeded but {} is empty", p.display()),
            StepFailure::MalformedOutput(p)   => write!(f, "command succeeded but {} is not in the expected format", p.display()),
            StepFailure::CommitFailed(e)      => write!(f, "failed to move output into place: {}", e),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub enum StepStatus {
    Skipped,
    Completed,
    Failed(StepFailure),
}


#[derive(Clone, Debug)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    pub exit_code: i32,
    pub log: PathBuf,
}

impl StepResult {
    pub fn success(&self) -> bool {
        matches!(self.status, StepStatus::Skipped | StepStatus::Completed)
    }

    pub fn skipped(&self) -> bool {
        self.status == StepStatus::Skipped
    }
}


pub fn run_step(step: Step) -> StepResult {
    let Step { name, outputs, action, log } = step;
    let result = |status: StepStatus, exit_code: i32| StepResult { name: name.clone(), status,
                                                                    exit_code, log: log.clone() };
    if outputs.iter().all(|o| o.artifact.exists()) {
        eprintln!("{}: skipped (already done)", name);
        for o in &outputs {
            eprintln!("  {}", o.artifact.display());
        }
        return result(StepStatus::Skipped, 0);
    }

    let mut log_file = match open_log(&log, &name) {
        Ok(f) => f,
        Err(e) => return result(StepStatus::Failed(StepFailure::LaunchFailed(
            format!("unable to open log {}: {}", log.display(), e))), 1),
    };
    for o in &outputs {
        remove_stale_staged_output(o);
    }

    match action {
        Action::External(invocations) => {
            for invocation in invocations {
                let description = invocation.description();
                eprintln!("{}: {}", name, description);
                let _ = writeln!(log_file, "$ {}", description);
                match run_invocation(invocation, &log_file) {
                    Ok(0) => {}
                    Ok(code) => {
                        let _ = writeln!(log_file, "exit code {}", code);
                        return result(StepStatus::Failed(StepFailure::NonZeroExit(code)), code);
                    }
                    Err(e) => {
                        let _ = writeln!(log_file, "{}", e);
                        return result(StepStatus::Failed(StepFailure::LaunchFailed(e.to_string())), 1);
                    }
                }
            }
        }
        Action::Native(action) => {
            eprintln!("{}: running", name);
            if let Err(e) = action() {
                let _ = writeln!(log_file, "{}", e);
                return result(StepStatus::Failed(StepFailure::ActionFailed(e.to_string())), 1);
            }
        }
    }

    if let Err(failure) = commit_outputs(&outputs) {
        let _ = writeln!(log_file, "{}", failure);
        return result(StepStatus::Failed(failure), 0);
    }
    let _ = writeln!(log_file, "finished {}", timestamp());
    result(StepStatus::Completed, 0)
}


fn open_log(log: &Path, step_name: &str) -> io::Result<File> {
    // Appended to, never truncated, so the output of earlier attempts is kept.
    if let Some(parent) = log.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(log)?;
    writeln!(file, "=== {} started {} ===", step_name, timestamp())?;
    Ok(file)
}


fn remove_stale_staged_output(output: &Output) {
    // Anything at a staged path is left over from an earlier failed attempt.
    if output.staged != output.artifact && output.staged.is_file() {
        let _ = fs::remove_file(&output.staged);
    }
}


fn run_invocation(invocation: Invocation, log: &File) -> io::Result<i32> {
    // Returns the rightmost non-zero exit code in the pipe (like bash's pipefail), or 0. An upstream
    // command killed by SIGPIPE therefore never hides the failure that closed its reader.
    let command_count = invocation.commands.len();
    let mut children: Vec<Child> = Vec::with_capacity(command_count);
    let mut previous_stdout = None;
    for (i, mut command) in invocation.commands.into_iter().enumerate() {
        match previous_stdout.take() {
            Some(stdout) => { command.stdin(Stdio::from(stdout)); }
            None         => { command.stdin(Stdio::null()); }
        }
        let is_last = i + 1 == command_count;
        if !is_last {
            command.stdout(Stdio::piped());
        } else if let Some(path) = &invocation.stdout {
            command.stdout(File::create(path)?);
        } else {
            command.stdout(log.try_clone()?);
        }
        command.stderr(log.try_clone()?);
        match command.spawn() {
            Ok(mut child) => {
                previous_stdout = child.stdout.take();
                children.push(child);
            }
            Err(e) => {
                // The unspawned command still holds the read end of the previous pipe, so it must
                // go before waiting or an earlier writer blocks on a full pipe forever.
                let program = command.get_program().to_string_lossy().into_owned();
                drop(command);
                drop(previous_stdout.take());
                for mut child in children {
                    let _ = child.wait();
                }
                return Err(io::Error::new(e.kind(), format!("{}: {}", program, e)));
            }
        }
    }
    let mut last_failure = 0;
    for mut child in children {
        let code = exit_code(child.wait()?);
        if code != 0 {
            last_failure = code;
        }
    }
    Ok(last_failure)
}


fn commit_outputs(outputs: &[Output]) -> Result<(), StepFailure> {
    // Every staged output is checked before any of them is moved, so a step never half-commits
    // because of a bad second output.
    for o in outputs {
        if o.artifact.exists() {
            continue;
        }
        check_output(&o.staged, o.format)?;
    }
    for o in outputs {
        if o.artifact.exists() || o.staged == o.artifact {
            continue;
        }
        fs::rename(&o.staged, &o.artifact).map_err(|e| StepFailure::CommitFailed(
            format!("{} -> {}: {}", o.staged.display(), o.artifact.display(), e)))?;
    }
    Ok(())
}


fn check_output(path: &Path, format: ArtifactFormat) -> Result<(), StepFailure> {
    let metadata = fs::metadata(path).map_err(|_| StepFailure::MissingOutput(path.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(StepFailure::MissingOutput(path.to_path_buf()));
    }
    if metadata.len() == 0 {
        return Err(StepFailure::EmptyOutput(path.to_path_buf()));
    }
    let well_formed = match format {
        ArtifactFormat::Fasta => looks_like_fasta(path),
        ArtifactFormat::Fastq => looks_like_fastq(path),
        ArtifactFormat::Any   => true,
    };
    if well_formed { Ok(()) } else { Err(StepFailure::MalformedOutput(path.to_path_buf())) }
}

// This file contains the error types for Hapflow's validation and stage infrastructure.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::io;
use std::path::PathBuf;
use thiserror::Error;


/// A precondition that failed before any step ran. Each variant names the offending flag (or tool
/// or path) so the operator knows exactly what to fix.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required parameter {flag}")]
    MissingParameter { flag: String },

    #[error("{flag} must be a positive integer, got '{value}'")]
    NotPositiveInteger { flag: String, value: String },

    #[error("{flag} is not a valid genome size (e.g. 2.5g, 800m, 5000000), got '{value}'")]
    InvalidGenomeSize { flag: String, value: String },

    #[error("{flag} must be one of {allowed}, got '{value}'")]
    InvalidChoice { flag: String, value: String, allowed: String },

    #[error("{flag} must be two files separated by a comma, got '{value}'")]
    InvalidFilePair { flag: String, value: String },

    #[error("{flag}: file does not exist: {}", path.display())]
    MissingFile { flag: String, path: PathBuf },

    #[error("{flag}: {} is not a file", path.display())]
    NotAFile { flag: String, path: PathBuf },

    #[error("{flag}: directory does not exist: {}", path.display())]
    MissingDirectory { flag: String, path: PathBuf },

    #[error("{flag}: {} exists but is not a directory", path.display())]
    NotADirectory { flag: String, path: PathBuf },

    #[error("required program '{tool}' not found in $PATH")]
    MissingTool { tool: String },

    #[error("required helper program not found: {}", path.display())]
    MissingHelper { path: PathBuf },

    #[error("unable to load manifest {}: {reason}", path.display())]
    BadManifest { path: PathBuf, reason: String },
}


/// Failures of the stage machinery itself (as opposed to a step's external command failing,
/// which is reported through a StepResult).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to save manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// This file contains the parameter and precondition checks that every stage runs before it touches
// the filesystem or launches a tool.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::misc::parse_genome_size;


pub fn required<'a>(flag: &str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingParameter { flag: flag.to_string() }),
    }
}


pub fn required_path<'a>(flag: &str, value: &'a Option<PathBuf>)
        -> Result<&'a Path, ValidationError> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p.as_path()),
        _ => Err(ValidationError::MissingParameter { flag: flag.to_string() }),
    }
}


/// An explicitly given path, or else one taken from a previous stage's manifest.
pub fn path_or_manifest<'a>(flag: &str, value: &'a Option<PathBuf>, from_manifest: Option<&'a Path>)
        -> Result<&'a Path, ValidationError> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p.as_path()),
        _ => from_manifest.ok_or_else(|| ValidationError::MissingParameter { flag: flag.to_string() }),
    }
}


pub fn positive_int(flag: &str, value: &str) -> Result<usize, ValidationError> {
    // Digits-only zero is rejected just like negatives and non-numbers.
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ValidationError::NotPositiveInteger { flag: flag.to_string(),
                                                       value: value.to_string() }),
    }
}


pub fn genome_size(flag: &str, value: &str) -> Result<String, ValidationError> {
    // The tools take the size as text, so the original spelling is passed through.
    match parse_genome_size(value) {
        Some(_) => Ok(value.trim().to_string()),
        None => Err(ValidationError::InvalidGenomeSize { flag: flag.to_string(),
                                                         value: value.to_string() }),
    }
}


pub fn choice(flag: &str, value: &str, allowed: &[&str]) -> Result<String, ValidationError> {
    let value = value.trim();
    match allowed.iter().find(|a| a.eq_ignore_ascii_case(value)) {
        Some(a) => Ok(a.to_string()),
        None => Err(ValidationError::InvalidChoice { flag: flag.to_string(),
                                                     value: value.to_string(),
                                                     allowed: allowed.join("/") }),
    }
}


pub fn input_file(flag: &str, path: &Path) -> Result<PathBuf, ValidationError> {
    // Returns the absolute path, since some tools run from a different working directory.
    if !path.exists() {
        return Err(ValidationError::MissingFile { flag: flag.to_string(),
                                                  path: path.to_path_buf() });
    }
    if !path.is_file() {
        return Err(ValidationError::NotAFile { flag: flag.to_string(), path: path.to_path_buf() });
    }
    path.canonicalize().map_err(|_| ValidationError::MissingFile { flag: flag.to_string(),
                                                                   path: path.to_path_buf() })
}


pub fn input_dir(flag: &str, path: &Path) -> Result<PathBuf, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::MissingDirectory { flag: flag.to_string(),
                                                       path: path.to_path_buf() });
    }
    if !path.is_dir() {
        return Err(ValidationError::NotADirectory { flag: flag.to_string(),
                                                    path: path.to_path_buf() });
    }
    path.canonicalize().map_err(|_| ValidationError::MissingDirectory { flag: flag.to_string(),
                                                                        path: path.to_path_buf() })
}


pub fn output_dir(flag: &str, path: &Path) -> Result<PathBuf, ValidationError> {
    // Not existing is okay (it will be created), but it can't be something other than a directory.
    if path.exists() && !path.is_dir() {
        return Err(ValidationError::NotADirectory { flag: flag.to_string(),
                                                    path: path.to_path_buf() });
    }
    Ok(path.to_path_buf())
}


pub fn file_pair(flag: &str, value: &str) -> Result<(PathBuf, PathBuf), ValidationError> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(ValidationError::InvalidFilePair { flag: flag.to_string(),
                                                      value: value.to_string() });
    }
    Ok((input_file(flag, Path::new(parts[0]))?, input_file(flag, Path::new(parts[1]))?))
}


pub fn helper(path: &Path) -> Result<PathBuf, ValidationError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(ValidationError::MissingHelper { path: path.to_path_buf() })
    }
}

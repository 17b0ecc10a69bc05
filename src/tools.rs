// This file contains the tool registry: the explicit search path that Hapflow uses to find external
// programs, plus the names of all the programs it runs.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use which::which_in;

use crate::error::ValidationError;


// External software
pub const RATATOSK: &str = "Ratatosk";
pub const FLYE: &str = "flye";
pub const MINIMAP2: &str = "minimap2";
pub const SAMTOOLS: &str = "samtools";
pub const RAGTAG: &str = "ragtag.py";
pub const MINIPROT: &str = "miniprot";
pub const LIFTON: &str = "lifton";

// Helper programs bundled in the polishing tool's install directory
pub const HELPER_BIN_DIR: &str = "bin";
pub const SUK: &str = "suk";
pub const MISJOIN: &str = "misjoin";
pub const OVERLAP: &str = "overlap";
pub const HYPO: &str = "hypo";
pub const SCAFFOLD: &str = "scaffold";
pub const POLISH_HELPERS: &[&str] = &[SUK, MISJOIN, OVERLAP, HYPO, SCAFFOLD];


/// Where to look for external programs. Extra directories (e.g. a tool's bundled helper
/// directory) go in front of the inherited PATH. The registry is passed into each stage rather
/// than written to the process environment, and every command it builds carries its own PATH.
#[derive(Clone, Debug)]
pub struct ToolRegistry {
    search_dirs: Vec<PathBuf>,
}

impl ToolRegistry {
    pub fn from_env() -> Self {
        let search_dirs = env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect())
            .unwrap_or_default();
        Self::from_dirs(search_dirs)
    }

    pub fn from_dirs(search_dirs: Vec<PathBuf>) -> Self {
        ToolRegistry { search_dirs }
    }

    pub fn with_helper_dir(&self, dir: &Path) -> Self {
        let mut search_dirs = vec![dir.to_path_buf()];
        search_dirs.extend(self.search_dirs.iter().cloned());
        ToolRegistry { search_dirs }
    }

    fn path_var(&self) -> OsString {
        env::join_paths(&self.search_dirs).unwrap_or_default()
    }

    pub fn resolve(&self, tool: &str) -> Result<PathBuf, ValidationError> {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which_in(tool, Some(self.path_var()), cwd)
            .map_err(|_| ValidationError::MissingTool { tool: tool.to_string() })
    }

    pub fn require(&self, tools: &[&str]) -> Result<(), ValidationError> {
        for tool in tools {
            self.resolve(tool)?;
        }
        Ok(())
    }

    /// A command for the given tool, launched by absolute path, with PATH set to this registry's
    /// search path so that anything the tool itself runs is found the same way.
    pub fn command(&self, tool: &str) -> Result<Command, ValidationError> {
        let mut command = Command::new(self.resolve(tool)?);
        command.env("PATH", self.path_var());
        Ok(command)
    }
}

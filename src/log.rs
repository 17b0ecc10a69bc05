// This file contains functions for writing Hapflow's progress to stderr.

// Copyright 2026 Hapflow contributors

// This file is part of Hapflow. Hapflow is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Hapflow
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Hapflow. If not, see <http://www.gnu.org/licenses/>.

use chrono::prelude::*;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Instant;

use crate::misc::format_duration;


pub fn section_header(text: &str) {
    let date = format!("({})", timestamp());
    eprintln!();
    eprintln!("{} {}", text.bold().bright_yellow().underline(), date.dimmed());
}


pub fn explanation(text: &str) {
    let term_width = match term_size::dimensions_stderr() {
        Some((w, _)) => w.clamp(40, 100),
        None => 80,
    };
    eprintln!("{}", textwrap::fill(text, term_width).dimmed());
    eprintln!();
}


pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}


pub fn print_settings(settings: &[(&str, String)]) {
    eprintln!("Settings:");
    for (flag, value) in settings {
        eprintln!("  {} {}", flag, value);
    }
    eprintln!();
}


/// Printed once validation has passed: the absolute paths and derived values the stage will
/// actually use, including inputs that came from a manifest.
pub fn print_resolved_settings(settings: &[(&str, String)]) {
    eprintln!("Resolved:");
    for (name, value) in settings {
        eprintln!("  {}: {}", name, value);
    }
    eprintln!();
}


pub fn text_setting(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(none)".to_string())
}


pub fn path_setting(value: &Option<PathBuf>) -> String {
    match value {
        Some(p) => p.display().to_string(),
        None => "(none)".to_string(),
    }
}


pub fn success_line(text: &str) {
    eprintln!("{}", text.green().bold());
}


pub fn failure_line(text: &str) {
    eprintln!("{}", text.red().bold());
}


pub fn error_message(text: &str) {
    eprintln!();
    eprintln!("{} {}", "Error:".red().bold(), text);
}


/// Stage start banner: the stage name, the time and every setting the stage will use. This is
/// printed before validation so that even a rejected invocation leaves an audit trail.
/// `print_resolved_settings` follows once the inputs are known.
pub fn stage_start_banner(stage: &str, description: &str, settings: &[(&str, String)]) -> Instant {
    section_header(&format!("Starting hapflow {}", stage));
    explanation(description);
    print_settings(settings);
    Instant::now()
}


/// Stage end banner. Always states the exit code(s) so that wrappers which lose the process exit
/// status can still branch on the text.
pub fn stage_end_banner(stage: &str, start_time: Instant, exit_codes: &[(&str, i32)]) {
    let overall = exit_codes.last().map(|(_, code)| *code).unwrap_or(1);
    section_header(&format!("Finished hapflow {}", stage));
    for (label, code) in exit_codes {
        eprintln!("{} exit code: {}", label, code);
    }
    eprintln!("Time to run: {}", format_duration(start_time.elapsed()));
    if overall == 0 {
        success_line(&format!("hapflow {} completed successfully", stage));
    } else {
        failure_line(&format!("hapflow {} failed", stage));
    }
    eprintln!();
}

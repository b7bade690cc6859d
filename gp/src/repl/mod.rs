//! Interactive terminal front ends for chat and plan building

mod chat;
mod plan;

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use eyre::{Context, Result};
use tracing::debug;

pub use chat::ChatRepl;
pub use plan::PlanRepl;

use crate::domain::Plan;

/// Result of handling one line of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashResult {
    Continue,
    Quit,
}

/// Explicit path, or `default_name` in the current directory
pub fn output_path(explicit: Option<&str>, default_name: &str) -> PathBuf {
    match explicit.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(default_name),
    }
}

/// Write an export file, creating parent directories
pub fn write_export(path: &Path, contents: &str) -> Result<()> {
    debug!(path = %path.display(), len = contents.len(), "write_export: called");
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("Failed to create export directory")?;
    }
    fs::write(path, contents).context(format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Print a plan with 1-based exercise numbers, as used by `/explain`
pub fn print_plan(plan: &Plan) {
    println!();
    for (day, exercises) in plan.days() {
        println!("{}", day.bright_cyan().bold());
        for (i, exercise) in exercises.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, exercise.summary());
        }
    }
    println!();
}

pub fn print_error(message: &str) {
    println!("{} {}", "Error:".red(), message);
}

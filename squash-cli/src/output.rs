// squash-cli/src/output.rs
//
// Console formatting helpers shared by the commands.

use std::fmt::Display;

use console::style;
use indicatif::ProgressStyle;
use squash_core::JobStatus;

/// Print a heading with styling and clear separation.
pub fn print_heading(text: &str) {
    let line = "=".repeat(50);
    println!("\n{}", style(&line).blue().bright());
    println!("{}", style(format!(" {text} ")).bold().white());
    println!("{}\n", style(&line).blue().bright());
}

/// Print a section heading (smaller than main heading).
pub fn print_section(text: &str) {
    println!("\n{}", style(format!(" {text} ")).bold());
    println!("{}", style("-".repeat(40)).blue());
}

/// Print an info line with label and value, with the label colored.
pub fn print_info<T: Display>(label: &str, value: T) {
    println!("{}: {}", style(label).cyan().bright(), value);
}

/// Status word colored by outcome.
pub fn styled_status(status: JobStatus) -> String {
    match status {
        JobStatus::Completed => style(status).green().bold().to_string(),
        JobStatus::Failed => style(status).red().bold().to_string(),
        JobStatus::Cancelled => style(status).yellow().bold().to_string(),
    }
}

/// Style for the per-job bars.
pub fn job_bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg:<28} [{bar:40.cyan/blue}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Style for the overall batch bar.
pub fn batch_bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:40.green/white}] {pos}/{len} jobs ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

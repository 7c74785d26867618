//! Output formatting utilities for CLI commands

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Bar for a job of known length; a spinner when `len` is zero.
pub fn progress(len: u64, label: &str) -> ProgressBar {
    if len == 0 {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(label.to_string());
        return spinner;
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.set_message(label.to_string());
    bar
}

//! Console progress reporting.

use indicatif::{ProgressBar, ProgressStyle};

/// Lines of successful command output shown before truncating
pub const MAX_OUTPUT_LINES: usize = 20;

/// Characters of a command shown in its progress line
pub const MAX_COMMAND_PREVIEW: usize = 100;

pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

/// Shorten a command for its progress line
pub fn command_preview(command: &str) -> String {
    let trimmed = command.trim();
    if trimmed.chars().count() > MAX_COMMAND_PREVIEW {
        let head: String = trimmed.chars().take(MAX_COMMAND_PREVIEW).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

/// Indented output lines, capped at `MAX_OUTPUT_LINES` with a trailer
pub fn output_lines(output: &str) -> Vec<String> {
    let lines: Vec<&str> = output.lines().collect();
    let mut shown: Vec<String> = lines
        .iter()
        .take(MAX_OUTPUT_LINES)
        .map(|line| format!("   {}", line))
        .collect();

    if lines.len() > MAX_OUTPUT_LINES {
        shown.push(format!("   ... ({} more lines)", lines.len() - MAX_OUTPUT_LINES));
    }

    shown
}

pub fn print_success(output: &str) {
    println!("   OK");
    for line in output_lines(output) {
        println!("{}", line);
    }
}

pub fn print_failure(status: &str, error_output: &str) {
    println!("   FAILED ({})", status);
    for line in error_output.lines() {
        println!("   ERROR: {}", line);
    }
}

//! Terminal output utilities

use console::style;
use indicatif::{MultiProgress, ProgressDrawTarget};
use zx3dl_core::types::RunReport;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Container for per-transfer progress bars; hidden when quiet
pub fn transfers(quiet: bool) -> MultiProgress {
    if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    }
}

/// End-of-run summary: counts, retries, warnings and every failure
pub fn summary(report: &RunReport) {
    header("Summary");
    kv("Installed", &report.installed.to_string());
    kv("Kept", &report.skipped.to_string());
    kv("Recovered from other sources", &report.retries.len().to_string());
    kv("Failed", &report.failures.len().to_string());

    for event in &report.retries {
        info(&format!("{}: {} failed ({})", event.subject, event.url, event.reason));
    }
    for message in &report.warnings {
        warning(message);
    }
    for failure in &report.failures {
        error(&failure.to_string());
    }

    if report.failures.is_empty() {
        success("Finished");
    } else if report.has_item_failures() {
        error("Finished with failures; run again to retry them");
    } else {
        warning("Finished, but some catalogs could not be read");
    }
}

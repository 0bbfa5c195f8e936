//! Console output for uid-migrate
//!
//! Provides the run header, the pre-change inventory, a progress bar over
//! the known job count and the final summary.

use crate::config::MigrateConfig;
use crate::owner::Owner;
use crate::walker::{ClassificationResult, RunSummary};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar over a fixed number of jobs
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter for `total` jobs
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display from the running tally
    pub fn update(&self, summary: &RunSummary) {
        self.bar.set_position(summary.processed());

        let changed = summary.changed + summary.would_change;
        let msg = if summary.failed > 0 {
            format!(
                "changed: {} | skipped: {} | failed: {}",
                format_number(changed),
                format_number(summary.skipped),
                format_number(summary.failed)
            )
        } else {
            format!(
                "changed: {} | skipped: {}",
                format_number(changed),
                format_number(summary.skipped)
            )
        };

        self.bar.set_message(msg);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// "1000 (alice)" when the id has a user name, "1000" otherwise
fn describe_owner(owner: Owner) -> String {
    match owner.user_name() {
        Some(name) => format!("{} ({})", owner, name),
        None => owner.to_string(),
    }
}

/// Print a header at the start of the run
pub fn print_header(config: &MigrateConfig) {
    println!();
    println!(
        "{} {}",
        style("uid-migrate").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), config.root.display());
    println!(
        "  {} {} -> {}",
        style("Owner:").bold(),
        describe_owner(config.old_owner),
        describe_owner(config.new_owner)
    );
    println!("  {} {}", style("Workers:").bold(), config.worker_count);
    if config.dry_run {
        println!("  {} {}", style("Mode:").bold(), style("dry run").yellow());
    } else {
        println!("  {} {}", style("Mode:").bold(), style("apply").red().bold());
    }
    println!();
}

/// Print what the scan found, before any change is made
pub fn print_inventory(config: &MigrateConfig, scan: &ClassificationResult) {
    println!("{}", style("Scan Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    if config.include_files {
        println!(
            "  {} {} ({})",
            style("Files to change:").bold(),
            format_number(scan.files.len() as u64),
            format_size(scan.stats.file_bytes, BINARY)
        );
    }
    if config.include_folders {
        println!(
            "  {} {}",
            style("Folders to change:").bold(),
            format_number(scan.directories.len() as u64)
        );
    }
    println!(
        "  {} {}",
        style("Entries scanned:").bold(),
        format_number(scan.stats.visited)
    );
    println!(
        "  {} {}",
        style("Other owners:").bold(),
        format_number(scan.stats.foreign)
    );
    if scan.stats.special > 0 {
        println!(
            "  {} {}",
            style("Symlinks/special (ignored):").bold(),
            format_number(scan.stats.special)
        );
    }
    if scan.stats.excluded > 0 {
        println!(
            "  {} {}",
            style("Excluded:").bold(),
            format_number(scan.stats.excluded)
        );
    }
    println!();
}

/// Print a summary of the run results
pub fn print_summary(summary: &RunSummary, dry_run: bool) {
    let duration_secs = summary.duration.as_secs_f64();

    println!();
    if summary.is_success() {
        println!("{}", style("Run Complete").green().bold());
    } else if summary.interrupted {
        println!("{}", style("Run Interrupted").yellow().bold());
    } else {
        println!("{}", style("Run Failed").red().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    if dry_run {
        println!(
            "  {} {}",
            style("Would change:").bold(),
            format_number(summary.would_change)
        );
    } else {
        println!(
            "  {} {}",
            style("Changed:").bold(),
            format_number(summary.changed)
        );
    }
    println!(
        "  {} {}",
        style("Skipped:").bold(),
        format_number(summary.skipped)
    );
    if summary.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").red().bold(),
            format_number(summary.failed)
        );
    }
    if summary.abandoned > 0 {
        println!(
            "  {} {}",
            style("Not attempted:").yellow().bold(),
            format_number(summary.abandoned)
        );
    }
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    for err in summary.failures.iter().take(10) {
        println!("  {} {}", style("error:").red(), err);
    }
    if summary.failures.len() > 10 {
        println!("  ... and {} more", summary.failures.len() - 10);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_describe_owner() {
        assert_eq!(describe_owner(Owner::from_raw(0)), "0 (root)");
        assert!(describe_owner(Owner::from_raw(3_999_999_999)).starts_with("3999999999"));
    }
}

//! uid-migrate - Recursive ownership migration
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uid_migrate::changelog::{ChangeLog, LineChangeLog, TracingChangeLog};
use uid_migrate::config::{CliArgs, MigrateConfig};
use uid_migrate::progress::{print_header, print_inventory, print_summary, ProgressReporter};
use uid_migrate::{MigrateCoordinator, Owner, SystemBackend};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run succeeded
fn run() -> Result<bool> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = MigrateConfig::from_args(&args).context("Invalid configuration")?;

    if !config.dry_run && Owner::current() != Owner::from_raw(0) {
        warn!("Not running as root; ownership changes will likely be refused");
    }

    if config.show_progress {
        print_header(&config);
    }

    let coordinator = MigrateCoordinator::new(config.clone(), SystemBackend)
        .context("Failed to initialize")?;

    // Setup signal handler for graceful shutdown. Nothing has been changed
    // while the prompt is waiting, so an interrupt there exits directly.
    let cancel = coordinator.cancel_flag();
    let prompting = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        let prompting = Arc::clone(&prompting);
        ctrlc::set_handler(move || {
            if prompting.load(Ordering::SeqCst) {
                eprintln!("\nAborted.");
                std::process::exit(1);
            }
            eprintln!("\nInterrupt received, stopping...");
            cancel.store(true, Ordering::SeqCst);
        })
        .context("Failed to set signal handler")?;
    }

    let scan = match coordinator.scan() {
        Err(e) if e.is_interrupted() => {
            println!("Interrupted during scan; nothing was changed.");
            return Ok(false);
        }
        other => other.context("Scan failed")?,
    };

    if config.show_progress || !config.assume_yes {
        print_inventory(&config, &scan);
    }

    if scan.is_empty() {
        info!("Nothing to change");
        return Ok(true);
    }

    if !config.dry_run && !config.assume_yes {
        prompting.store(true, Ordering::SeqCst);
        let confirmed = confirm(scan.total())?;
        prompting.store(false, Ordering::SeqCst);

        if !confirmed {
            println!("Aborted.");
            return Ok(true);
        }
    }

    if cancel.load(Ordering::SeqCst) {
        println!("Interrupted before any change was made.");
        return Ok(false);
    }

    let mut change_log: Box<dyn ChangeLog> = if config.log_to_file {
        let log = LineChangeLog::open(&config.log_file).with_context(|| {
            format!("Failed to open change log '{}'", config.log_file.display())
        })?;
        info!(path = %config.log_file.display(), "Writing change log");
        Box::new(log)
    } else {
        Box::new(TracingChangeLog)
    };

    let progress = config
        .show_progress
        .then(|| ProgressReporter::new(scan.total() as u64));
    let mut on_progress = |summary: &uid_migrate::RunSummary| {
        if let Some(p) = &progress {
            p.update(summary);
        }
    };

    let summary = coordinator
        .apply(
            &scan,
            Some(change_log.as_mut()),
            Some(&mut on_progress),
        )
        .context("Ownership change failed")?;

    if let Some(p) = &progress {
        if summary.is_success() {
            p.finish("done");
        } else {
            p.finish_and_clear();
        }
    }

    print_summary(&summary, config.dry_run);

    if summary.interrupted {
        info!("Run was interrupted before completion");
    }
    if let Some(err) = summary.first_error() {
        error!(failed = summary.failed, first = %err, "Run completed with errors");
    }

    Ok(summary.is_success())
}

/// Ask for an explicit "yes" before changing anything
fn confirm(count: usize) -> Result<bool> {
    print!(
        "{} Change the owner of {} entries? Type 'yes' to continue: ",
        style("Warning:").yellow().bold(),
        count
    );
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;

    Ok(is_affirmative(&input))
}

fn is_affirmative(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("yes")
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("uid_migrate=debug,warn")
    } else {
        EnvFilter::new("uid_migrate=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

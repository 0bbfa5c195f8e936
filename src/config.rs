//! Configuration types for uid-migrate
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The TOML settings file
//! - Runtime configuration with validation
//!
//! Settings file values are applied first, then command-line overrides.
//! The result is validated once and never mutated afterwards.

use crate::error::ConfigError;
use crate::owner::Owner;
use crate::walker::aggregate::FailurePolicy;
use crate::walker::classify::ClassifyOptions;
use crate::walker::pool::MAX_WORKERS;
use clap::Parser;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Owner changed from when nothing else is configured
const DEFAULT_OLD_UID: u32 = 0;

/// Owner changed to when nothing else is configured
const DEFAULT_NEW_UID: u32 = 1000;

const DEFAULT_WORKERS: usize = 10;

const DEFAULT_LOG_FILE: &str = "uid-migrate.log";

/// Recursively reassign file and directory ownership
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "uid-migrate",
    version,
    about = "Recursively reassign file and directory ownership from one user to another",
    long_about = "Walks a directory tree, collects every file and directory owned by the old \
                  user and changes its owner to the new user using a pool of worker threads.\n\n\
                  Runs as a dry run unless `dryrun = false` is set in the settings file or \
                  --apply is given. Only the owner changes; group ownership is left alone.",
    after_help = "EXAMPLES:\n    \
        uid-migrate -c settings.toml\n    \
        uid-migrate /srv/data --old-uid 1001 --new-uid alice\n    \
        uid-migrate /srv/data --old-uid 0 --new-uid 1000 --apply -w 32\n    \
        uid-migrate -c settings.toml --apply --yes --fail-soft"
)]
pub struct CliArgs {
    /// Root directory to scan (overrides `path` in the settings file)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// TOML settings file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Owner to change from (uid or user name)
    #[arg(long, value_name = "UID|USER")]
    pub old_uid: Option<OwnerSpec>,

    /// Owner to change to (uid or user name)
    #[arg(long, value_name = "UID|USER")]
    pub new_uid: Option<OwnerSpec>,

    /// Only report what would change
    #[arg(short = 'n', long, conflicts_with = "apply")]
    pub dry_run: bool,

    /// Actually change ownership (turns dry run off)
    #[arg(long)]
    pub apply: bool,

    /// Number of worker threads for the change phase
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Leave regular files alone
    #[arg(long)]
    pub no_files: bool,

    /// Leave directories alone
    #[arg(long)]
    pub no_folders: bool,

    /// Write per-item changes to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Do not write the per-item change log
    #[arg(long, conflicts_with = "log_file")]
    pub no_log_file: bool,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Keep going after a failed change and report all failures at the end
    #[arg(long)]
    pub fail_soft: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Owner given either as a numeric id or a user name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OwnerSpec {
    Id(u32),
    Name(String),
}

impl OwnerSpec {
    pub fn resolve(&self) -> Result<Owner, ConfigError> {
        match self {
            OwnerSpec::Id(id) => Ok(Owner::from_raw(*id)),
            OwnerSpec::Name(name) => match name.parse::<u32>() {
                Ok(id) => Ok(Owner::from_raw(id)),
                Err(_) => Owner::from_name(name),
            },
        }
    }
}

impl FromStr for OwnerSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u32>() {
            Ok(id) => OwnerSpec::Id(id),
            Err(_) => OwnerSpec::Name(s.to_string()),
        })
    }
}

/// Contents of the TOML settings file
///
/// Every key is optional; missing keys fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub path: Option<PathBuf>,
    pub dryrun: Option<bool>,
    pub olduid: Option<OwnerSpec>,
    pub newuid: Option<OwnerSpec>,
    pub includefolders: Option<bool>,
    pub includefiles: Option<bool>,
    pub log2file: Option<bool>,
    pub logfile: Option<PathBuf>,
    pub workers: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub failurepolicy: Option<String>,
}

impl Settings {
    /// Read and parse a settings file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse settings text; `origin` is only used in error messages
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseFailed {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "fail-soft" | "failsoft" => Ok(FailurePolicy::FailSoft),
            _ => Err(ConfigError::InvalidFailurePolicy {
                value: s.to_string(),
            }),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Root directory to scan
    pub root: PathBuf,

    /// Owner that must match for an entry to be eligible
    pub old_owner: Owner,

    /// Owner to assign
    pub new_owner: Owner,

    /// Report only, no ownership syscalls
    pub dry_run: bool,

    /// Record per-item events to `log_file`
    pub log_to_file: bool,

    pub log_file: PathBuf,

    pub include_files: bool,

    pub include_folders: bool,

    /// Number of worker threads
    pub worker_count: usize,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    pub failure_policy: FailurePolicy,

    /// Skip the confirmation prompt
    pub assume_yes: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl MigrateConfig {
    /// Load the settings file named in `args` (if any) and apply overrides
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let settings = match &args.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        Self::resolve(settings, args)
    }

    /// Merge settings and CLI overrides, then validate
    pub fn resolve(settings: Settings, args: &CliArgs) -> Result<Self, ConfigError> {
        let root = args
            .path
            .clone()
            .or(settings.path)
            .ok_or(ConfigError::MissingPath)?;

        let old_owner = match args.old_uid.as_ref().or(settings.olduid.as_ref()) {
            Some(spec) => spec.resolve()?,
            None => Owner::from_raw(DEFAULT_OLD_UID),
        };
        let new_owner = match args.new_uid.as_ref().or(settings.newuid.as_ref()) {
            Some(spec) => spec.resolve()?,
            None => Owner::from_raw(DEFAULT_NEW_UID),
        };
        if old_owner == new_owner {
            return Err(ConfigError::SameOwner {
                owner: old_owner.as_raw(),
            });
        }

        let dry_run = if args.apply {
            false
        } else if args.dry_run {
            true
        } else {
            settings.dryrun.unwrap_or(true)
        };

        let include_files = !args.no_files && settings.includefiles.unwrap_or(true);
        let include_folders = !args.no_folders && settings.includefolders.unwrap_or(true);
        if !include_files && !include_folders {
            return Err(ConfigError::NothingIncluded);
        }

        let worker_count = args.workers.or(settings.workers).unwrap_or(DEFAULT_WORKERS);
        if worker_count == 0 || worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: worker_count,
                max: MAX_WORKERS,
            });
        }

        let (log_to_file, log_file) = match &args.log_file {
            Some(path) => (true, path.clone()),
            None => (
                !args.no_log_file && settings.log2file.unwrap_or(true),
                settings
                    .logfile
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            ),
        };

        // Compile exclude patterns
        let exclude_patterns = settings
            .exclude
            .iter()
            .chain(args.exclude_patterns.iter())
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let failure_policy = if args.fail_soft {
            FailurePolicy::FailSoft
        } else {
            match settings.failurepolicy.as_deref() {
                Some(value) => value.parse()?,
                None => FailurePolicy::default(),
            }
        };

        Ok(Self {
            root,
            old_owner,
            new_owner,
            dry_run,
            log_to_file,
            log_file,
            include_files,
            include_folders,
            worker_count,
            exclude_patterns,
            failure_policy,
            assume_yes: args.yes,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Options for the classification phase
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            old_owner: self.old_owner,
            include_files: self.include_files,
            include_folders: self.include_folders,
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}

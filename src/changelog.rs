//! Per-item change log
//!
//! When `log2file` is enabled every job outcome is handed to a
//! [`ChangeLog`] sink. The sink is owned by the caller and driven only by
//! the result aggregator, so it is written from a single thread.

use crate::owner::Owner;
use crate::walker::changer::ChangeOutcome;
use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One logged job outcome
#[derive(Debug, Clone, Copy)]
pub struct ChangeRecord<'a> {
    pub path: &'a Path,

    /// Owner seen before the change, if it was read
    pub old_owner: Option<Owner>,

    /// Owner assigned (or that would be assigned in a dry run)
    pub new_owner: Option<Owner>,

    pub outcome: &'a ChangeOutcome,
}

/// Sink for per-item records
pub trait ChangeLog {
    fn record(&mut self, record: &ChangeRecord<'_>) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one timestamped line per record
pub struct LineChangeLog<W: Write> {
    writer: W,
}

impl LineChangeLog<BufWriter<File>> {
    /// Open (or create) a log file in append mode
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> LineChangeLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ChangeLog for LineChangeLog<W> {
    fn record(&mut self, record: &ChangeRecord<'_>) -> io::Result<()> {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        write!(
            self.writer,
            "{} {} {} old={} new={}",
            ts,
            record.outcome.label(),
            record.path.display(),
            fmt_owner(record.old_owner),
            fmt_owner(record.new_owner),
        )?;
        if let ChangeOutcome::Failed(err) = record.outcome {
            write!(self.writer, " error=\"{}\"", err)?;
        }
        writeln!(self.writer)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn fmt_owner(owner: Option<Owner>) -> String {
    owner.map_or_else(|| "-".to_string(), |o| o.to_string())
}

/// Emits each record as a tracing event
#[derive(Debug, Default)]
pub struct TracingChangeLog;

impl ChangeLog for TracingChangeLog {
    fn record(&mut self, record: &ChangeRecord<'_>) -> io::Result<()> {
        debug!(
            path = %record.path.display(),
            old_owner = ?record.old_owner.map(Owner::as_raw),
            new_owner = ?record.new_owner.map(Owner::as_raw),
            outcome = record.outcome.label(),
            "Ownership change"
        );
        Ok(())
    }
}

//! CSV audit trail of a cull run.
//!
//! Layout: two summary rows (`total_images,<n>` and `directories,<n>`), the
//! column header, then one row per image in the order chunks finished.

use crate::quarantine::unoccupied;
use crate::record::ImageRecord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOG_PREFIX: &str = "burstcull_";
pub const LOG_EXTENSION: &str = "csv";

const TOTAL_IMAGES: &str = "total_images";
const DIRECTORIES: &str = "directories";
pub const HEADER: [&str; 7] = [
    "directory",
    "filename",
    "hash",
    "distance",
    "is_duplicate",
    "destination",
    "note",
];

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed audit log {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Counts written at the top of every log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditSummary {
    pub total_images: usize,
    pub directories: usize,
}

/// A classified record plus what happened to it on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub record: ImageRecord,
    pub destination: Option<PathBuf>,
    pub note: Option<String>,
}

impl LogEntry {
    pub fn to_row(&self) -> AuditRow {
        AuditRow {
            directory: self.record.directory.to_string_lossy().into_owned(),
            filename: self.record.filename.to_string_lossy().into_owned(),
            hash: self.record.hash.as_ref().map(|h| h.to_string()),
            distance: self.record.distance,
            is_duplicate: self.record.is_duplicate,
            destination: self
                .destination
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            note: self.note.clone(),
        }
    }
}

/// One serialized line of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub directory: String,
    pub filename: String,
    pub hash: Option<String>,
    pub distance: Option<u32>,
    pub is_duplicate: bool,
    pub destination: Option<String>,
    pub note: Option<String>,
}

impl AuditRow {
    pub fn original_path(&self) -> PathBuf {
        Path::new(&self.directory).join(&self.filename)
    }
}

pub fn log_file_name(now: DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        LOG_PREFIX,
        now.format("%Y%m%d-%H%M%S-%3f"),
        LOG_EXTENSION
    )
}

pub struct AuditLog<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl AuditLog<File> {
    /// Create a fresh timestamped log inside `dir`.
    pub fn create_in(dir: &Path, summary: AuditSummary) -> Result<(Self, PathBuf), AuditError> {
        let path = unoccupied(dir.join(log_file_name(Local::now())));
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok((Self::new(file, summary)?, path))
    }
}

impl<W: Write> AuditLog<W> {
    pub fn new(inner: W, summary: AuditSummary) -> Result<Self, AuditError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(inner);
        writer.write_record([TOTAL_IMAGES, summary.total_images.to_string().as_str()])?;
        writer.write_record([DIRECTORIES, summary.directories.to_string().as_str()])?;
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append a whole chunk's entries and flush them together.
    pub fn append(&mut self, entries: &[LogEntry]) -> Result<(), AuditError> {
        for entry in entries {
            self.writer.serialize(entry.to_row())?;
        }
        self.writer.flush()?;
        self.rows += entries.len();
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(mut self) -> Result<W, AuditError> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| AuditError::Io(io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

/// Parse a log written by [`AuditLog`].
pub fn read_log(path: &Path) -> Result<(AuditSummary, Vec<AuditRow>), AuditError> {
    let malformed = |reason: &str| AuditError::Malformed {
        path: path.to_string_lossy().to_string(),
        reason: reason.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = reader.records();

    let mut count = |label: &str| -> Result<usize, AuditError> {
        let record = records
            .next()
            .ok_or_else(|| malformed("missing summary"))??;
        match (record.get(0), record.get(1)) {
            (Some(key), Some(value)) if key == label => value
                .parse()
                .map_err(|_| malformed(&format!("bad {} value", label))),
            _ => Err(malformed(&format!("expected {} row", label))),
        }
    };
    let summary = AuditSummary {
        total_images: count(TOTAL_IMAGES)?,
        directories: count(DIRECTORIES)?,
    };

    let header = records.next().ok_or_else(|| malformed("missing header"))??;
    if !header.iter().eq(HEADER) {
        return Err(malformed("unexpected header"));
    }

    let rows = records
        .map(|record| -> Result<AuditRow, AuditError> { Ok(record?.deserialize(None)?) })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((summary, rows))
}

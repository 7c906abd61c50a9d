use crate::record::ImageRecord;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("{path} is not under source root {root}")]
    OutsideSource { path: String, root: String },

    #[error("Failed to move {from} → {to}: {source}")]
    Move {
        from: String,
        to: String,
        source: io::Error,
    },

    #[error("Copied {from} → {to} but could not remove the original, so it now exists in both places: {source}")]
    SourceNotRemoved {
        from: String,
        to: String,
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Relocates duplicates from the source tree into a mirrored tree under the
/// destination root.
#[derive(Debug, Clone)]
pub struct Quarantine {
    source_root: PathBuf,
    dest_root: PathBuf,
    dry_run: bool,
}

impl Quarantine {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Map `path` under the source root onto the same relative path under the
    /// destination root. `path` must lie strictly inside the source root.
    pub fn destination_for(&self, path: &Path) -> Result<PathBuf, QuarantineError> {
        let relative = path
            .strip_prefix(&self.source_root)
            .ok()
            .filter(|rel| rel.components().next().is_some())
            .ok_or_else(|| QuarantineError::OutsideSource {
                path: path.to_string_lossy().to_string(),
                root: self.source_root.to_string_lossy().to_string(),
            })?;
        Ok(self.dest_root.join(relative))
    }

    /// Move a duplicate into quarantine, returning where it went (or would
    /// go, in dry-run mode). Originals are left alone and yield `None`.
    pub fn place(&self, record: &ImageRecord) -> Result<Option<PathBuf>, QuarantineError> {
        if !record.is_duplicate {
            return Ok(None);
        }

        let source = record.path();
        let destination = unoccupied(self.destination_for(&source)?);
        if self.dry_run {
            log::debug!("[dry-run] {} → {}", source.display(), destination.display());
            return Ok(Some(destination));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(&source, &destination)?;
        log::debug!("Moved {} → {}", source.display(), destination.display());
        Ok(Some(destination))
    }
}

/// Never overwrite: when `candidate` exists, try `stem (1).ext`,
/// `stem (2).ext`, ... in the same directory. Names are built from the raw
/// OS strings, so non-UTF-8 names keep their bytes.
pub fn unoccupied(candidate: PathBuf) -> PathBuf {
    if !candidate.exists() {
        return candidate;
    }

    let stem = candidate
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| OsString::from("file"));
    let extension = candidate.extension().map(|ext| ext.to_os_string());
    let mut index = 1;

    loop {
        let mut name = stem.clone();
        name.push(format!(" ({})", index));
        if let Some(ext) = &extension {
            name.push(".");
            name.push(ext);
        }
        let next = candidate.with_file_name(name);
        if !next.exists() {
            return next;
        }
        index += 1;
    }
}

/// Rename, falling back to [`copy_then_remove`] across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<(), QuarantineError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        Err(e) => Err(QuarantineError::Move {
            from: from.to_string_lossy().to_string(),
            to: to.to_string_lossy().to_string(),
            source: e,
        }),
    }
}

/// Copy `from` to `to`, then delete `from`.
///
/// A failed copy removes whatever part of `to` was written. A failed delete
/// leaves the file in both places and reports
/// [`QuarantineError::SourceNotRemoved`].
pub fn copy_then_remove(from: &Path, to: &Path) -> Result<(), QuarantineError> {
    let (from_str, to_str) = (
        from.to_string_lossy().to_string(),
        to.to_string_lossy().to_string(),
    );

    if let Err(source) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(QuarantineError::Move {
            from: from_str,
            to: to_str,
            source,
        });
    }
    fs::remove_file(from).map_err(|source| QuarantineError::SourceNotRemoved {
        from: from_str,
        to: to_str,
        source,
    })
}

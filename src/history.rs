//! Past runs, as recorded by their audit logs, and undoing them.

use crate::audit::{AuditError, AuditSummary, LOG_EXTENSION, LOG_PREFIX, read_log};
use crate::quarantine::move_file;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogListing {
    pub path: PathBuf,
    pub summary: AuditSummary,
    pub duplicates: usize,
}

/// Every audit log directly inside `dest`, oldest first. Logs that fail to
/// parse are skipped with a warning.
pub fn list(dest: &Path) -> Result<Vec<LogListing>, AuditError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dest)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_audit_log(path))
        .collect();
    paths.sort();

    let mut listings = Vec::new();
    for path in paths {
        match read_log(&path) {
            Ok((summary, rows)) => listings.push(LogListing {
                duplicates: rows.iter().filter(|row| row.is_duplicate).count(),
                path,
                summary,
            }),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(listings)
}

fn is_audit_log(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(LOG_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION);
    name_ok && ext_ok && path.is_file()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Move quarantined files listed in `log` back to where they came from.
///
/// A row is only restored when its quarantined copy exists and nothing
/// occupies the original path; rows from dry runs therefore skip naturally.
pub fn restore(log: &Path, dry_run: bool) -> Result<RestoreStats, AuditError> {
    let (_, rows) = read_log(log)?;
    let mut stats = RestoreStats::default();

    for row in rows.iter().filter(|row| row.is_duplicate) {
        let Some(quarantined) = row.destination.as_deref().map(Path::new) else {
            continue;
        };
        let original = row.original_path();

        if !quarantined.exists() {
            log::warn!("{} is not in quarantine; skipping", quarantined.display());
            stats.skipped += 1;
            continue;
        }
        if original.exists() {
            log::warn!("{} already exists; skipping", original.display());
            stats.skipped += 1;
            continue;
        }
        if dry_run {
            log::info!("[dry-run] restore {} → {}", quarantined.display(), original.display());
            stats.restored += 1;
            continue;
        }

        let result = fs::create_dir_all(&row.directory)
            .map_err(Into::into)
            .and_then(|_| move_file(quarantined, &original));
        match result {
            Ok(()) => {
                log::debug!("Restored {} → {}", quarantined.display(), original.display());
                stats.restored += 1;
            }
            Err(e) => {
                log::warn!("{}", e);
                stats.failed += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, LogEntry};
    use crate::record::ImageRecord;
    use tempfile::TempDir;

    fn write_log(dest: &Path, entries: &[LogEntry]) -> PathBuf {
        let summary = AuditSummary {
            total_images: entries.len(),
            directories: 1,
        };
        let (mut log, path) = AuditLog::create_in(dest, summary).unwrap();
        log.append(entries).unwrap();
        path
    }

    fn entry(dir: &Path, name: &str, destination: Option<PathBuf>) -> LogEntry {
        let mut record = ImageRecord::new(dir, name);
        record.is_duplicate = destination.is_some();
        LogEntry {
            record,
            destination,
            note: None,
        }
    }

    #[test]
    fn test_restore_moves_files_back() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let dir = source.path().join("trip");
        let quarantined = dest.path().join("trip/img002.jpg");
        fs::create_dir_all(quarantined.parent().unwrap()).unwrap();
        fs::write(&quarantined, b"burst").unwrap();

        let log = write_log(
            dest.path(),
            &[
                entry(&dir, "img001.jpg", None),
                entry(&dir, "img002.jpg", Some(quarantined.clone())),
            ],
        );

        let planned = restore(&log, true).unwrap();
        assert_eq!(planned.restored, 1);
        assert!(quarantined.exists());

        let stats = restore(&log, false).unwrap();
        assert_eq!(
            stats,
            RestoreStats {
                restored: 1,
                skipped: 0,
                failed: 0
            }
        );
        assert!(!quarantined.exists());
        assert_eq!(fs::read(dir.join("img002.jpg")).unwrap(), b"burst");

        // Second pass finds nothing left to restore.
        let again = restore(&log, false).unwrap();
        assert_eq!(again.restored, 0);
        assert_eq!(again.skipped, 1);
    }

    #[test]
    fn test_restore_never_overwrites() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let quarantined = dest.path().join("a.jpg");
        fs::write(&quarantined, b"quarantined").unwrap();
        fs::write(source.path().join("a.jpg"), b"newer").unwrap();

        let log = write_log(dest.path(), &[entry(source.path(), "a.jpg", Some(quarantined.clone()))]);
        let stats = restore(&log, false).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(fs::read(source.path().join("a.jpg")).unwrap(), b"newer");
        assert!(quarantined.exists());
    }

    #[test]
    fn test_list_reads_only_audit_logs() {
        let dest = TempDir::new().unwrap();
        let dir = Path::new("/photos");
        write_log(
            dest.path(),
            &[
                entry(dir, "1.jpg", None),
                entry(dir, "2.jpg", Some(dest.path().join("2.jpg"))),
            ],
        );
        fs::write(dest.path().join("notes.csv"), "a,b\n").unwrap();
        fs::write(dest.path().join("burstcull_broken.csv"), "garbage\n").unwrap();

        let listings = list(dest.path()).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].summary.total_images, 2);
        assert_eq!(listings[0].duplicates, 1);
    }
}

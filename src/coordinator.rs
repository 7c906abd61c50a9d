use crate::audit::{AuditError, AuditLog, LogEntry};
use crate::classify::classify_chunk;
use crate::hash::HashProvider;
use crate::quarantine::Quarantine;
use crate::record::DirectoryChunk;
use crossbeam_channel::unbounded;
use indicatif::ProgressBar;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::io::Write;
use std::path::PathBuf;

/// Everything a worker produced for one directory, handed back in one piece.
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub directory: PathBuf,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub images: usize,
    pub directories: usize,
    pub duplicates: usize,
    pub moved: usize,
    /// Records that could not be hashed or moved.
    pub failures: usize,
}

impl RunStats {
    fn absorb(&mut self, report: &ChunkReport, dry_run: bool) {
        self.directories += 1;
        for entry in &report.entries {
            self.images += 1;
            if entry.record.is_duplicate {
                self.duplicates += 1;
            }
            if entry.note.is_some() {
                self.failures += 1;
            } else if entry.destination.is_some() && !dry_run {
                self.moved += 1;
            }
        }
    }
}

/// Classify one directory and quarantine its duplicates.
///
/// Move failures are noted on the entry; the file stays where it was.
pub fn process_chunk<P>(
    chunk: DirectoryChunk,
    provider: &P,
    quarantine: &Quarantine,
    threshold: u32,
) -> ChunkReport
where
    P: HashProvider + ?Sized,
{
    let directory = chunk.directory.clone();
    let entries = classify_chunk(chunk, provider, threshold)
        .into_iter()
        .map(|record| {
            let note = record.error.clone();
            match quarantine.place(&record) {
                Ok(destination) => LogEntry {
                    record,
                    destination,
                    note,
                },
                Err(e) => {
                    log::warn!("{}", e);
                    LogEntry {
                        record,
                        destination: None,
                        note: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    ChunkReport { directory, entries }
}

/// Fans directory chunks out to a fixed-size pool and folds the results back
/// on the calling thread.
pub struct Coordinator<'a, P: ?Sized> {
    provider: &'a P,
    quarantine: &'a Quarantine,
    threshold: u32,
    pool: ThreadPool,
}

impl<'a, P> Coordinator<'a, P>
where
    P: HashProvider + ?Sized,
{
    pub fn new(
        provider: &'a P,
        quarantine: &'a Quarantine,
        threshold: u32,
        jobs: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("burstcull-worker-{}", i))
            .build()?;
        Ok(Self {
            provider,
            quarantine,
            threshold,
            pool,
        })
    }

    /// Process every chunk. Batches are appended to `audit` and counted on
    /// `progress` as they arrive, in whatever order workers finish.
    ///
    /// An audit write failure stops further writes, but chunks already
    /// dispatched still run to completion before the error is returned.
    pub fn run<W: Write>(
        &self,
        chunks: Vec<DirectoryChunk>,
        audit: &mut AuditLog<W>,
        progress: &ProgressBar,
    ) -> Result<RunStats, AuditError> {
        let (tx, rx) = unbounded::<ChunkReport>();
        let mut stats = RunStats::default();
        let mut failure: Option<AuditError> = None;
        let (provider, quarantine, threshold) = (self.provider, self.quarantine, self.threshold);

        self.pool.in_place_scope(|scope| {
            for chunk in chunks {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let report = process_chunk(chunk, provider, quarantine, threshold);
                    // The receiver lives until the scope ends.
                    let _ = tx.send(report);
                });
            }
            drop(tx);

            for report in rx.iter() {
                progress.inc(report.entries.len() as u64);
                progress.set_message(report.directory.display().to_string());
                stats.absorb(&report, quarantine.is_dry_run());
                if failure.is_none() {
                    if let Err(e) = audit.append(&report.entries) {
                        log::error!("Audit log write failed: {}", e);
                        failure = Some(e);
                    }
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditSummary;
    use crate::classify::tests::{FakeProvider, bits};
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    /// Accepts the first write (the summary and header) and fails after that.
    struct BrokenDisk {
        writes: usize,
    }

    impl Write for BrokenDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            if self.writes > 1 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn summary(chunks: &[DirectoryChunk]) -> AuditSummary {
        AuditSummary {
            total_images: crate::scanner::image_count(chunks),
            directories: chunks.len(),
        }
    }

    fn data_lines(log: AuditLog<Vec<u8>>) -> Vec<String> {
        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let mut lines: Vec<_> = text.lines().skip(3).map(str::to_string).collect();
        lines.sort();
        lines
    }

    #[test]
    fn test_process_chunk_moves_only_duplicates() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let dir = source.path().join("burst");
        fs::create_dir_all(&dir).unwrap();
        for name in ["1.jpg", "2.jpg", "3.jpg"] {
            fs::write(dir.join(name), name).unwrap();
        }
        let provider = FakeProvider::default()
            .with(dir.join("1.jpg"), bits(0))
            .with(dir.join("2.jpg"), bits(2))
            .with(dir.join("3.jpg"), bits(50));
        let quarantine = Quarantine::new(source.path(), dest.path(), false);

        let chunk = DirectoryChunk::with_files(&dir, ["3.jpg", "1.jpg", "2.jpg"]);
        let report = process_chunk(chunk, &provider, &quarantine, 10);

        assert_eq!(report.directory, dir);
        let destinations: Vec<_> = report.entries.iter().map(|e| e.destination.clone()).collect();
        assert_eq!(
            destinations,
            vec![None, Some(dest.path().join("burst/2.jpg")), None]
        );
        assert!(dir.join("1.jpg").exists());
        assert!(!dir.join("2.jpg").exists());
        assert!(dir.join("3.jpg").exists());
    }

    #[test]
    fn test_failed_move_is_noted_not_fatal() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let provider = FakeProvider::default()
            .with(source.path().join("a.jpg"), bits(0))
            .with(source.path().join("b.jpg"), bits(0));
        // b.jpg hashes fine but does not exist on disk, so the move fails.
        fs::write(source.path().join("a.jpg"), b"a").unwrap();
        let quarantine = Quarantine::new(source.path(), dest.path(), false);

        let chunk = DirectoryChunk::with_files(source.path(), ["a.jpg", "b.jpg"]);
        let report = process_chunk(chunk, &provider, &quarantine, 0);

        let b = &report.entries[1];
        assert!(b.record.is_duplicate);
        assert_eq!(b.destination, None);
        assert!(b.note.as_deref().unwrap().contains("Failed to move"));
    }

    #[test]
    fn test_run_logs_every_record_once() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut provider = FakeProvider::default();
        let mut chunks = Vec::new();
        for d in 0..6 {
            let dir = source.path().join(format!("dir{}", d));
            fs::create_dir_all(&dir).unwrap();
            let mut chunk = DirectoryChunk::new(&dir);
            for f in 0..4 {
                let name = format!("img{:03}.jpg", f);
                fs::write(dir.join(&name), b"x").unwrap();
                provider = provider.with(dir.join(&name), bits(f * 3));
                chunk.push(name);
            }
            chunks.push(chunk);
        }

        let quarantine = Quarantine::new(source.path(), dest.path(), true);
        let coordinator = Coordinator::new(&provider, &quarantine, 4, 3).unwrap();
        let mut audit = AuditLog::new(Vec::new(), summary(&chunks)).unwrap();
        let progress = ProgressBar::hidden();

        let stats = coordinator.run(chunks, &mut audit, &progress).unwrap();
        assert_eq!(progress.position(), 24);
        assert_eq!(audit.rows(), 24);
        assert_eq!(
            stats,
            RunStats {
                images: 24,
                directories: 6,
                // Per directory: 0 anchor, 3 dup, 6 break, 9 dup.
                duplicates: 12,
                moved: 0,
                failures: 0,
            }
        );

        let lines = data_lines(audit);
        assert_eq!(lines.len(), 24);
        assert_eq!(lines.iter().filter(|l| l.contains(",true,")).count(), 12);
    }

    #[test]
    fn test_identical_hashes_in_separate_directories_stay_originals() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let a = source.path().join("a");
        let b = source.path().join("b");
        let provider = FakeProvider::default()
            .with(a.join("x.jpg"), bits(7))
            .with(b.join("x.jpg"), bits(7));
        let chunks = vec![
            DirectoryChunk::with_files(&a, ["x.jpg"]),
            DirectoryChunk::with_files(&b, ["x.jpg"]),
        ];

        let quarantine = Quarantine::new(source.path(), dest.path(), true);
        let coordinator = Coordinator::new(&provider, &quarantine, 64, 2).unwrap();
        let mut audit = AuditLog::new(Vec::new(), summary(&chunks)).unwrap();
        let stats = coordinator
            .run(chunks, &mut audit, &ProgressBar::hidden())
            .unwrap();

        assert_eq!(stats.duplicates, 0);
        assert!(data_lines(audit).iter().all(|l| l.contains(",false,")));
    }

    #[test]
    fn test_no_chunks_no_rows() {
        let provider = FakeProvider::default();
        let quarantine = Quarantine::new("/src", "/dst", true);
        let coordinator = Coordinator::new(&provider, &quarantine, 20, 4).unwrap();
        let mut audit = AuditLog::new(Vec::new(), summary(&[])).unwrap();

        let stats = coordinator
            .run(Vec::new(), &mut audit, &ProgressBar::hidden())
            .unwrap();
        assert_eq!(stats, RunStats::default());
        assert!(data_lines(audit).is_empty());
    }

    #[test]
    fn test_write_failure_still_drains_every_chunk() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut provider = FakeProvider::default();
        let mut chunks = Vec::new();
        for d in 0..5 {
            let dir = source.path().join(format!("dir{}", d));
            provider = provider.with(dir.join("only.jpg"), bits(d));
            chunks.push(DirectoryChunk::with_files(&dir, ["only.jpg"]));
        }

        let quarantine = Quarantine::new(source.path(), dest.path(), true);
        let coordinator = Coordinator::new(&provider, &quarantine, 20, 2).unwrap();
        let mut audit = AuditLog::new(BrokenDisk { writes: 0 }, summary(&chunks)).unwrap();
        let progress = ProgressBar::hidden();

        let result = coordinator.run(chunks, &mut audit, &progress);
        assert!(result.is_err());
        assert_eq!(progress.position(), 5);
        assert_eq!(audit.rows(), 0);
    }
}

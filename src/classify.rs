//! Burst run detection within a single directory.
//!
//! Records are visited in filename order. Each hash is compared against the
//! anchor, i.e. the first member of the current run. A record within
//! `threshold` of the anchor is a duplicate and leaves the anchor alone; any
//! other record breaks the run and becomes the next anchor. Comparing against
//! the run's first frame instead of the previous one keeps many small
//! frame-to-frame changes from adding up unnoticed.

use crate::hash::{HashProvider, PerceptualHash};
use crate::record::{DirectoryChunk, ImageRecord};

/// Outcome of comparing one hash against the current anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub distance: Option<u32>,
    pub is_duplicate: bool,
}

/// Compare `hash` against `anchor` and move the anchor when the run breaks.
///
/// With no anchor the distance is unbounded, so the hash always starts a run.
pub fn judge(anchor: &mut Option<PerceptualHash>, hash: &PerceptualHash, threshold: u32) -> Verdict {
    let distance = anchor.as_ref().map(|a| a.distance(hash));
    let is_duplicate = matches!(distance, Some(d) if d <= threshold);
    if !is_duplicate {
        *anchor = Some(hash.clone());
    }
    Verdict {
        distance,
        is_duplicate,
    }
}

/// Classify every record of `chunk`.
///
/// The chunk is sorted first, so callers need not. A record whose hash
/// cannot be computed is kept as an original with its error attached and
/// does not touch the anchor.
pub fn classify_chunk<P>(chunk: DirectoryChunk, provider: &P, threshold: u32) -> Vec<ImageRecord>
where
    P: HashProvider + ?Sized,
{
    let mut chunk = chunk;
    chunk.sort();

    chunk
        .records
        .into_iter()
        .scan(None, |anchor: &mut Option<PerceptualHash>, mut record| {
            let path = record.path();
            match provider.hash_file(&path) {
                Ok(hash) => {
                    let verdict = judge(anchor, &hash, threshold);
                    record.distance = verdict.distance;
                    record.is_duplicate = verdict.is_duplicate;
                    record.hash = Some(hash);
                }
                Err(e) => {
                    log::warn!("Could not hash {}: {}", path.display(), e);
                    record.error = Some(e.to_string());
                }
            }
            Some(record)
        })
        .collect()
}

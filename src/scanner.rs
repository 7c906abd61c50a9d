use crate::record::DirectoryChunk;
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidRoot { path: String },
}

pub const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// Case-insensitive extension check.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Recursively walk `root` and group every image file by its parent
/// directory. Directories without images yield no chunk. Anything under
/// `exclude` is skipped entirely.
pub fn partition(
    root: &Path,
    exclude: Option<&Path>,
    progress: &ProgressBar,
) -> Result<Vec<DirectoryChunk>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::InvalidRoot {
            path: root.to_string_lossy().to_string(),
        });
    }

    let mut chunks: BTreeMap<PathBuf, DirectoryChunk> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| exclude.is_none_or(|skip| entry.path() != skip));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        progress.tick();

        // Symlinks report their own type here since links are not followed.
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };

        chunks
            .entry(parent.to_path_buf())
            .or_insert_with(|| DirectoryChunk::new(parent))
            .push(entry.file_name());
    }

    log::debug!("Partitioned {} into {} chunk(s)", root.display(), chunks.len());
    Ok(chunks.into_values().collect())
}

/// Total records across chunks.
pub fn image_count(chunks: &[DirectoryChunk]) -> usize {
    chunks.iter().map(DirectoryChunk::len).sum()
}

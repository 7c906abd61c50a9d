use crate::hash::HashAlgorithm;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_THRESHOLD: u32 = 20;
pub const DEFAULT_JOBS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Source directory {path} does not exist or is not a directory")]
    InvalidSource { path: String },

    #[error("Destination {path} exists and is not a directory")]
    InvalidDestination { path: String },

    #[error("Destination {dest} must not be the source directory or contain it ({source_root})")]
    Overlap { source_root: String, dest: String },

    #[error("Parallelism must be at least 1")]
    NoWorkers,

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Validated settings for one cull run. Both roots are absolute and
/// canonical, so path prefixes can be compared component-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CullConfig {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub threshold: u32,
    pub jobs: usize,
    pub dry_run: bool,
    pub algorithm: HashAlgorithm,
}

impl CullConfig {
    /// Check the roots before anything else happens. The destination is
    /// created when missing since the audit log is written there even in
    /// dry-run mode.
    pub fn resolve(
        source: &Path,
        dest: &Path,
        threshold: u32,
        jobs: usize,
        dry_run: bool,
        algorithm: HashAlgorithm,
    ) -> Result<Self, ConfigError> {
        if jobs == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let source = source
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| ConfigError::InvalidSource {
                path: source.to_string_lossy().to_string(),
            })?;

        if dest.exists() && !dest.is_dir() {
            return Err(ConfigError::InvalidDestination {
                path: dest.to_string_lossy().to_string(),
            });
        }

        // Refuse overlap before creating anything.
        let absolute_dest = if dest.is_absolute() {
            dest.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| ConfigError::Io {
                    path: dest.to_string_lossy().to_string(),
                    source,
                })?
                .join(dest)
        };
        let normalized = normalize(&absolute_dest).map_err(|source| ConfigError::Io {
            path: dest.to_string_lossy().to_string(),
            source,
        })?;
        check_overlap(&source, &normalized)?;

        fs::create_dir_all(&normalized).map_err(|source| ConfigError::Io {
            path: normalized.to_string_lossy().to_string(),
            source,
        })?;
        let dest = normalized.canonicalize().map_err(|source| ConfigError::Io {
            path: normalized.to_string_lossy().to_string(),
            source,
        })?;
        check_overlap(&source, &dest)?;

        Ok(Self {
            source,
            dest,
            threshold,
            jobs,
            dry_run,
            algorithm,
        })
    }

    /// The destination subtree when it sits inside the source tree, so that
    /// scanning never picks up already quarantined files.
    pub fn nested_dest(&self) -> Option<&Path> {
        self.dest
            .starts_with(&self.source)
            .then_some(self.dest.as_path())
    }
}

fn check_overlap(source: &Path, dest: &Path) -> Result<(), ConfigError> {
    if source.starts_with(dest) {
        return Err(ConfigError::Overlap {
            source_root: source.to_string_lossy().to_string(),
            dest: dest.to_string_lossy().to_string(),
        });
    }
    Ok(())
}

/// Resolve an absolute path that may not exist yet: canonicalize its deepest
/// existing ancestor, then apply the remaining components lexically. Nothing
/// past that ancestor exists, so no symlinks can hide in the tail.
fn normalize(path: &Path) -> std::io::Result<PathBuf> {
    let existing = path
        .ancestors()
        .find(|ancestor| ancestor.exists())
        .unwrap_or(path);
    let mut resolved = existing.canonicalize()?;
    let tail = path.strip_prefix(existing).unwrap_or(Path::new(""));

    for component in tail.components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

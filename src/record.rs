use crate::hash::PerceptualHash;
use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::PathBuf;

/// One image found during scanning. Classification fields stay empty until
/// the chunk it belongs to has been classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub directory: PathBuf,
    pub filename: OsString,
    pub hash: Option<PerceptualHash>,
    pub is_duplicate: bool,
    /// Distance to the anchor; `None` means no anchor yet or hashing failed.
    pub distance: Option<u32>,
    /// Why hashing failed, when it did.
    pub error: Option<String>,
}

impl ImageRecord {
    pub fn new(directory: impl Into<PathBuf>, filename: impl Into<OsString>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
            hash: None,
            is_duplicate: false,
            distance: None,
            error: None,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    /// Byte-wise filename order, which stands in for capture order.
    pub fn filename_order(&self, other: &Self) -> Ordering {
        self.filename
            .as_encoded_bytes()
            .cmp(other.filename.as_encoded_bytes())
    }
}

/// All images of a single directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChunk {
    pub directory: PathBuf,
    pub records: Vec<ImageRecord>,
}

impl DirectoryChunk {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            records: Vec::new(),
        }
    }

    /// Builds a chunk from bare filenames, mostly handy in tests.
    pub fn with_files<I, S>(directory: impl Into<PathBuf>, filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut chunk = Self::new(directory);
        for name in filenames {
            chunk.push(name);
        }
        chunk
    }

    pub fn push(&mut self, filename: impl Into<OsString>) {
        let record = ImageRecord::new(self.directory.clone(), filename);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stable sort by filename bytes.
    pub fn sort(&mut self) {
        self.records.sort_by(ImageRecord::filename_order);
    }
}

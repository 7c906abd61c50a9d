use clap::ValueEnum;
use image::ImageReader;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Fixed-width perceptual fingerprint. Only equality and Hamming distance are
/// meaningful; the bit layout belongs to whichever algorithm produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash(Box<[u8]>);

impl PerceptualHash {
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of differing bits. Bytes missing from the shorter hash count as
    /// fully different.
    pub fn distance(&self, other: &Self) -> u32 {
        let common: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let extra = self.0.len().abs_diff(other.0.len()) as u32 * 8;
        common + extra
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Anything that can turn an image file into a [`PerceptualHash`].
///
/// Workers share one provider across threads, hence `Sync`.
pub trait HashProvider: Sync {
    fn hash_file(&self, path: &Path) -> Result<PerceptualHash, HashError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HashAlgorithm {
    /// Difference hash over horizontal gradients
    #[default]
    Dhash,
    /// Average hash
    Ahash,
    /// DCT-based hash
    Phash,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Dhash => "dhash",
            HashAlgorithm::Ahash => "ahash",
            HashAlgorithm::Phash => "phash",
        };
        f.write_str(name)
    }
}

/// Side length of the hash grid; 8×8 gives 64-bit hashes.
const HASH_SIDE: u32 = 8;

/// Decodes images with `image` and fingerprints them with `image_hasher`.
pub struct ImageHashProvider {
    hasher: Hasher,
}

impl ImageHashProvider {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let config = HasherConfig::new().hash_size(HASH_SIDE, HASH_SIDE);
        let config = match algorithm {
            HashAlgorithm::Dhash => config.hash_alg(HashAlg::Gradient),
            HashAlgorithm::Ahash => config.hash_alg(HashAlg::Mean),
            HashAlgorithm::Phash => config.hash_alg(HashAlg::Mean).preproc_dct(),
        };
        Self {
            hasher: config.to_hasher(),
        }
    }
}

impl Default for ImageHashProvider {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl HashProvider for ImageHashProvider {
    fn hash_file(&self, path: &Path) -> Result<PerceptualHash, HashError> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let hash = self.hasher.hash_image(&img);
        Ok(PerceptualHash::from_bytes(hash.as_bytes()))
    }
}

//! Find burst-shot near-duplicates directory by directory and move them
//! into a mirrored quarantine tree, keeping a CSV audit trail.

pub mod audit;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod hash;
pub mod history;
pub mod progress;
pub mod quarantine;
pub mod record;
pub mod scanner;

pub use audit::{AuditLog, AuditSummary, LogEntry};
pub use classify::classify_chunk;
pub use config::CullConfig;
pub use coordinator::{ChunkReport, Coordinator, RunStats, process_chunk};
pub use hash::{HashAlgorithm, HashProvider, ImageHashProvider, PerceptualHash};
pub use quarantine::Quarantine;
pub use record::{DirectoryChunk, ImageRecord};

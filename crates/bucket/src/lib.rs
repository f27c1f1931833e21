//! # Bucket: a single-file key/value store with queue-style access
//!
//! One regular file holds an unordered set of `(key, data)` pairs. Point
//! lookups, batch inserts, ordered listing, cursor-style scans, bulk prefix
//! deletes, and an atomic "peek and consume" batch are all served out of the
//! same file with no sidecar state.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                    BUCKET                        │
//! │                                                  │
//! │ write.rs → mutex → advisory file lock            │
//! │              |                                   │
//! │              v                                   │
//! │        read header → scan index → plan gaps      │
//! │              |                                   │
//! │              v                                   │
//! │        payloads → index list → header  (commit)  │
//! │                                                  │
//! │ read.rs → header → index scan → verify from disk │
//! │            (no locks, lossy reads = misses)      │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The on-disk layout (header / data region / trailing index list) and both
//! byte codecs live in the [`codec`] crate; the cheap key pre-filter lives in
//! [`fingerprint`].
//!
//! ## Concurrency
//!
//! Mutations take the bucket's in-process mutex first, then an advisory
//! exclusive lock on the whole file, and release both in reverse order on
//! every exit path. The advisory lock serializes writers across processes on
//! filesystems that enforce it; where it is denied the mutation proceeds
//! under the mutex alone and the denial is logged. Reads take neither lock:
//! they may observe a partially rewritten index, which is why every entry a
//! read returns is re-verified against the key bytes actually on disk.
//!
//! ## Durability
//!
//! There is none beyond write ordering. Payloads are written before the
//! index list and the index list before the header, so an interrupted
//! mutation strands at worst unreferenced bytes (which later inserts
//! reclaim) or discards itself entirely. A crash in the middle of the
//! header write can corrupt the file; embedders that need crash safety must
//! layer a journal above this crate. The file grows as needed and is never
//! truncated.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bucket::{Bucket, Item};
//!
//! # fn main() -> bucket::Result<()> {
//! let bucket = Bucket::open("queue.db")?;
//! bucket.set_many(&[
//!     Item::new(b"job-1".to_vec(), b"A".to_vec()),
//!     Item::new(b"job-2".to_vec(), b"B".to_vec()),
//! ]);
//! for item in bucket.list_lock_delete(2)? {
//!     println!("{:?} -> {:?}", item.key, item.data);
//! }
//! # Ok(())
//! # }
//! ```

mod io;
mod lock;
mod planner;
mod read;
mod write;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// One stored entry: a key and its data, both nonzero-length byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: Vec<u8>,
    pub data: Vec<u8>,
}

impl Item {
    #[must_use]
    pub fn new(key: Vec<u8>, data: Vec<u8>) -> Self {
        Self { key, data }
    }
}

/// Errors surfaced by bucket operations.
///
/// Read operations never fail; a lossy read degrades to a miss or a
/// truncated listing. An advisory-lock denial is not an error either: the
/// mutation proceeds under the in-process mutex and the denial is logged.
#[derive(Debug, Error)]
pub enum BucketError {
    /// The backing file could not be opened; the bucket cannot be built.
    #[error("failed to open bucket file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A payload, index, or header write failed or came up short. `written`
    /// is the best-effort count of bytes the operation managed to write.
    #[error("write failed after {written} bytes: {source}")]
    Write {
        written: usize,
        #[source]
        source: std::io::Error,
    },

    /// Keys must be nonzero-length.
    #[error("key must not be empty")]
    EmptyKey,

    /// Values must be nonzero-length.
    #[error("data must not be empty")]
    EmptyData,
}

/// A bucket `Result` returning [`BucketError`].
pub type Result<T> = std::result::Result<T, BucketError>;

/// One opened instance of the single-file store.
///
/// Owns two handles on the same path: a read-only handle the lock-free read
/// path uses, and a read/write handle (behind the mutation mutex) that the
/// write path and the advisory file lock target. Dropping the bucket closes
/// both handles.
pub struct Bucket {
    reader: File,
    writer: Mutex<File>,
    path: PathBuf,
}

impl Bucket {
    /// Opens the bucket at `path`, creating the file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::Open`] when either handle cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // The read/write handle goes first so it can create the file; the
        // read-only handle then opens what is guaranteed to exist.
        let writer = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| BucketError::Open {
                path: path.clone(),
                source,
            })?;
        let reader = File::open(&path).map_err(|source| BucketError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            reader,
            writer: Mutex::new(writer),
            path,
        })
    }

    /// The path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("path", &self.path)
            .field("entries", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests;

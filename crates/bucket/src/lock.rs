//! Advisory whole-file locking for the mutation prelude.

use std::fs::File;

use fs2::FileExt;
use log::warn;

/// Exclusive advisory lock on the read/write handle, released on drop.
///
/// Acquisition never fails the operation: not every filesystem enforces
/// advisory locks, and in-process mutations are already serialized by the
/// bucket mutex. A denial is logged and the guard simply skips the unlock.
pub(crate) struct FileLock<'a> {
    file: &'a File,
    locked: bool,
}

impl<'a> FileLock<'a> {
    pub(crate) fn acquire(file: &'a File) -> Self {
        let locked = match file.lock_exclusive() {
            Ok(()) => true,
            Err(err) => {
                warn!("advisory file lock denied, mutating under the process mutex only: {err}");
                false
            }
        };
        Self { file, locked }
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if self.locked {
            let _ = FileExt::unlock(self.file);
        }
    }
}

//! Read path: `get()`, `list()`, `list_next()`, `find_next()`, `count()`.
//!
//! Reads take no locks and never return errors. A read racing a writer may
//! observe a partially rewritten index, so nothing from the index is trusted
//! on its own: every entry handed back has had its key re-read from the data
//! region and checked against the descriptor's length and sums. Anything
//! that fails to read or verify is a miss, never a failure.

use codec::{Descriptor, DescriptorStream, Header, END, HEADER_BYTES};
use fingerprint::Fingerprint;

use crate::io;
use crate::{Bucket, Item};

/// A point-in-time copy of the header and the raw index bytes it points at.
pub(crate) struct IndexSnapshot {
    pub index_start: u64,
    pub raw: Vec<u8>,
}

impl Bucket {
    /// Reads the header and the index list. Lossy by contract: a fresh,
    /// truncated, or unreadable file yields the empty snapshot.
    pub(crate) fn read_index(&self) -> IndexSnapshot {
        let mut header_buf = [0u8; HEADER_BYTES];
        let _ = io::read_exact_at(&self.reader, &mut header_buf, 0);
        let header = Header::decode(&header_buf);
        if header.index_len == 0 {
            return IndexSnapshot {
                index_start: header.index_start,
                raw: Vec::new(),
            };
        }

        // Clamp to the real file size so a torn header cannot demand an
        // absurd allocation.
        let file_len = self.reader.metadata().map(|m| m.len()).unwrap_or(0);
        let len = header.index_len.min(file_len.saturating_sub(header.index_start)) as usize;
        let mut raw = vec![0u8; len];
        let _ = io::read_exact_at(&self.reader, &mut raw, header.index_start);
        if let Some(end) = raw.iter().position(|&b| b == END) {
            raw.truncate(end);
        }
        IndexSnapshot {
            index_start: header.index_start,
            raw,
        }
    }

    /// Whether `d` describes an interval that actually lies inside the file.
    fn payload_in_file(&self, d: &Descriptor) -> bool {
        let file_len = self.reader.metadata().map(|m| m.len()).unwrap_or(0);
        d.size_key > 0
            && d.size_key
                .checked_add(d.size_data)
                .and_then(|block| d.start.checked_add(block))
                .is_some_and(|end| end <= file_len)
    }

    /// Reads the stored key bytes for `d`, or `None` on any short read.
    pub(crate) fn pull_key(&self, d: &Descriptor) -> Option<Vec<u8>> {
        if !self.payload_in_file(d) {
            return None;
        }
        let mut key = vec![0u8; d.size_key as usize];
        io::read_exact_at(&self.reader, &mut key, d.start).then_some(key)
    }

    /// Reads the whole payload for `d` as an [`Item`], unverified.
    pub(crate) fn pull_item(&self, d: &Descriptor) -> Option<Item> {
        if !self.payload_in_file(d) {
            return None;
        }
        let mut buf = vec![0u8; d.block_size() as usize];
        if !io::read_exact_at(&self.reader, &mut buf, d.start) {
            return None;
        }
        let data = buf.split_off(d.size_key as usize);
        Some(Item { key: buf, data })
    }

    /// Reads the payload for `d` and verifies the stored key against the
    /// descriptor's length and sums. The consistency filter behind every
    /// listing operation.
    pub(crate) fn pull_verified(&self, d: &Descriptor) -> Option<Item> {
        let item = self.pull_item(d)?;
        let fp = Fingerprint::of(&item.key);
        fp.may_match(d.size_key, d.sum_key, d.sum_md5)
            .then_some(item)
    }

    /// Point lookup. Returns the stored item for `key`, or `None` on a miss.
    ///
    /// Descriptors are pre-filtered by fingerprint; the first whose stored
    /// key compares byte-equal wins. Live keys are unique, so "first" is
    /// also "only" on an intact file.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Item> {
        let fp = Fingerprint::of(key);
        let snap = self.read_index();
        DescriptorStream::new(&snap.raw).find_map(|parsed| {
            let d = parsed.descriptor;
            if !fp.may_match(d.size_key, d.sum_key, d.sum_md5) {
                return None;
            }
            self.pull_item(&d).filter(|item| item.key == key)
        })
    }

    /// Returns up to `limit` verified entries from the front of the index,
    /// in index order.
    #[must_use]
    pub fn list(&self, limit: u8) -> Vec<Item> {
        self.list_next(limit, 0)
    }

    /// As [`list`](Bucket::list), but skips the first `skip` verified
    /// entries first. `skip` counts entries that verified, not raw
    /// descriptors.
    #[must_use]
    pub fn list_next(&self, limit: u8, skip: u64) -> Vec<Item> {
        let snap = self.read_index();
        let mut out = Vec::new();
        let mut skipped = 0u64;
        for parsed in DescriptorStream::new(&snap.raw) {
            if out.len() >= usize::from(limit) {
                break;
            }
            let Some(item) = self.pull_verified(&parsed.descriptor) else {
                continue;
            };
            if skipped < skip {
                skipped += 1;
                continue;
            }
            out.push(item);
        }
        out
    }

    /// Cursor-style scan: suppresses output until the entry whose key equals
    /// `key`, then returns verified entries from there on, up to `limit`.
    ///
    /// With `only_after` the matching entry itself is withheld but still
    /// counts against `limit`. A missing `key` yields an empty result.
    #[must_use]
    pub fn find_next(&self, key: &[u8], limit: u8, only_after: bool) -> Vec<Item> {
        let fp = Fingerprint::of(key);
        let snap = self.read_index();
        let mut out = Vec::new();
        let mut begun = false;
        let mut seen = 0usize;
        for parsed in DescriptorStream::new(&snap.raw) {
            if seen >= usize::from(limit) {
                break;
            }
            let d = parsed.descriptor;
            if !begun {
                if fp.may_match(d.size_key, d.sum_key, d.sum_md5) {
                    begun = self.pull_key(&d).is_some_and(|stored| stored == key);
                }
                if !begun {
                    continue;
                }
            }
            let Some(item) = self.pull_verified(&d) else {
                continue;
            };
            if !only_after || seen > 0 {
                out.push(item);
            }
            seen += 1;
        }
        out
    }

    /// Number of live descriptors in the index. Counts records, it does not
    /// verify payloads.
    #[must_use]
    pub fn count(&self) -> usize {
        let snap = self.read_index();
        DescriptorStream::new(&snap.raw).count()
    }
}

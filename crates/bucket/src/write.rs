//! Write path: `set()`, `delete()`, `set_many()`, `delete_to()`, and
//! `list_lock_delete()`.
//!
//! Every mutation follows the same shape:
//!
//! 1. Take the in-process mutex, then the advisory file lock.
//! 2. Snapshot the header and the raw index stream.
//! 3. Scan the stream, dropping descriptors the mutation replaces.
//! 4. Plan destination offsets for any new payloads.
//! 5. Commit: payloads first, then the rewritten index list, then the
//!    header. The header write is the commit point: until it lands, the
//!    old header still points at the old index and the mutation is
//!    invisible.
//!
//! Both locks release in reverse order on every exit path.

use std::collections::HashSet;
use std::fs::File;
use std::ops::Range;
use std::sync::PoisonError;

use codec::{Descriptor, DescriptorStream, Header, END};
use fingerprint::Fingerprint;
use log::debug;

use crate::lock::FileLock;
use crate::{io, planner, Bucket, BucketError, Item, Result};

/// Writes `buf` at `offset`, folding the byte count into `written` so a
/// failure reports everything the whole operation managed to put on disk.
fn write_chunk(file: &File, buf: &[u8], offset: u64, written: &mut usize) -> Result<()> {
    match io::write_all_at(file, buf, offset) {
        Ok(n) => {
            *written += n;
            Ok(())
        }
        Err((n, source)) => {
            *written += n;
            Err(BucketError::Write {
                written: *written,
                source,
            })
        }
    }
}

impl Bucket {
    /// Inserts or replaces one item. Returns the total bytes written.
    ///
    /// An existing entry under the same key is dropped from the index and
    /// its payload interval becomes reclaimable space; the replacement
    /// descriptor goes to the end of the index, so the item moves to the
    /// back of the iteration order.
    ///
    /// # Errors
    ///
    /// [`BucketError::EmptyKey`]/[`BucketError::EmptyData`] on invalid
    /// input, [`BucketError::Write`] when a disk write fails.
    pub fn set(&self, item: Item) -> Result<usize> {
        if item.key.is_empty() {
            return Err(BucketError::EmptyKey);
        }
        if item.data.is_empty() {
            return Err(BucketError::EmptyData);
        }

        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _flock = FileLock::acquire(&writer);
        let snap = self.read_index();

        let fp = Fingerprint::of(&item.key);
        let (mut stream, live) = self.strip_key(&snap.raw, &item.key, &fp);

        let size_data = item.data.len() as u64;
        let block = fp.size_key + size_data;
        let gaps = planner::gaps(&live, snap.index_start);
        let placement = planner::place_one(&gaps, snap.index_start, block);

        let mut written = 0;
        let mut payload = item.key;
        payload.extend_from_slice(&item.data);
        write_chunk(&writer, &payload, placement.offset, &mut written)?;

        Descriptor {
            start: placement.offset,
            size_key: fp.size_key,
            sum_key: fp.sum_key,
            sum_md5: fp.sum_md5,
            size_data,
        }
        .encode_into(&mut stream);
        self.commit_index(&writer, snap.index_start, placement.new_index_start, &stream, &mut written)?;
        Ok(written)
    }

    /// Removes `key` from the index. Returns the total bytes written.
    ///
    /// Idempotent: deleting a key that is not present rewrites an unchanged
    /// index and succeeds. The payload bytes stay behind as gap space.
    ///
    /// # Errors
    ///
    /// [`BucketError::Write`] when the index or header rewrite fails.
    pub fn delete(&self, key: &[u8]) -> Result<usize> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _flock = FileLock::acquire(&writer);
        let snap = self.read_index();

        let fp = Fingerprint::of(key);
        let (stream, _) = self.strip_key(&snap.raw, key, &fp);

        let mut written = 0;
        self.commit_index(&writer, snap.index_start, snap.index_start, &stream, &mut written)?;
        Ok(written)
    }

    /// Inserts a batch of items in one index rewrite. Returns the number of
    /// payloads that reached the disk.
    ///
    /// Existing entries under any of the batch keys are replaced. Items with
    /// an empty key or empty data are skipped, and when one key appears more
    /// than once in the batch only the last occurrence is kept. New
    /// descriptors are appended in batch order; the planner may scatter the
    /// payloads, but iteration order follows the caller's order.
    ///
    /// A failed payload write skips that item's count but not the batch; a
    /// failed index rewrite voids the whole batch and returns 0.
    pub fn set_many(&self, items: &[Item]) -> usize {
        let mut chosen: Vec<&Item> = Vec::with_capacity(items.len());
        let mut seen: HashSet<&[u8]> = HashSet::with_capacity(items.len());
        for item in items.iter().rev() {
            if item.key.is_empty() || item.data.is_empty() {
                continue;
            }
            if seen.insert(item.key.as_slice()) {
                chosen.push(item);
            }
        }
        chosen.reverse();
        if chosen.is_empty() {
            return 0;
        }

        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _flock = FileLock::acquire(&writer);
        let snap = self.read_index();

        // One fingerprint per key, computed up front and reused by the
        // filter scan and the descriptor encodes alike.
        let fps: Vec<Fingerprint> = chosen.iter().map(|it| Fingerprint::of(&it.key)).collect();
        let targets: Vec<(&[u8], &Fingerprint)> = chosen
            .iter()
            .zip(&fps)
            .map(|(it, fp)| (it.key.as_slice(), fp))
            .collect();
        let (mut stream, live) = self.strip_keys(&snap.raw, &targets);

        let blocks: Vec<u64> = chosen
            .iter()
            .map(|it| (it.key.len() + it.data.len()) as u64)
            .collect();
        let gaps = planner::gaps(&live, snap.index_start);
        let (offsets, new_index_start) = planner::place_many(&gaps, snap.index_start, &blocks);

        let mut count = 0;
        for (i, item) in chosen.iter().enumerate() {
            let mut payload = Vec::with_capacity(blocks[i] as usize);
            payload.extend_from_slice(&item.key);
            payload.extend_from_slice(&item.data);
            let mut chunk_written = 0;
            if write_chunk(&writer, &payload, offsets[i], &mut chunk_written).is_ok() {
                count += 1;
            }
        }

        for ((item, fp), &offset) in chosen.iter().zip(&fps).zip(&offsets) {
            Descriptor {
                start: offset,
                size_key: fp.size_key,
                sum_key: fp.sum_key,
                sum_md5: fp.sum_md5,
                size_data: item.data.len() as u64,
            }
            .encode_into(&mut stream);
        }

        let mut written = 0;
        match self.commit_index(&writer, snap.index_start, new_index_start, &stream, &mut written) {
            Ok(()) => count,
            Err(_) => 0,
        }
    }

    /// Drops every entry up to the **last** one whose key equals `key`,
    /// the "consume the queue up to here" verb. With `include_match` the
    /// matching entry goes too; without it the match survives as the new
    /// front. A missing key is a successful no-op.
    ///
    /// # Errors
    ///
    /// [`BucketError::Write`] when the index or header rewrite fails.
    pub fn delete_to(&self, key: &[u8], include_match: bool) -> Result<()> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _flock = FileLock::acquire(&writer);
        let snap = self.read_index();

        let fp = Fingerprint::of(key);
        let mut cut: Option<Range<usize>> = None;
        for parsed in DescriptorStream::new(&snap.raw) {
            let d = parsed.descriptor;
            if !fp.may_match(d.size_key, d.sum_key, d.sum_md5) {
                continue;
            }
            if self.pull_key(&d).is_some_and(|stored| stored == key) {
                // last match wins
                cut = Some(parsed.span);
            }
        }
        let Some(span) = cut else {
            return Ok(());
        };

        let from = if include_match { span.end } else { span.start };
        let mut written = 0;
        self.commit_index(&writer, snap.index_start, snap.index_start, &snap.raw[from..], &mut written)
    }

    /// Atomic peek-and-consume: takes up to `limit` verified entries off the
    /// front of the index, removes them (and any unverifiable records in
    /// front of the cut), and returns them. Later entries stay put. A
    /// `limit` past the end drains the bucket.
    ///
    /// # Errors
    ///
    /// [`BucketError::Write`] when the residual index cannot be rewritten;
    /// in that case nothing is handed out, so queue entries are never
    /// delivered twice.
    pub fn list_lock_delete(&self, limit: u8) -> Result<Vec<Item>> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _flock = FileLock::acquire(&writer);
        let snap = self.read_index();

        let mut taken = Vec::new();
        let mut cut = 0usize;
        for parsed in DescriptorStream::new(&snap.raw) {
            if taken.len() >= usize::from(limit) {
                break;
            }
            if let Some(item) = self.pull_verified(&parsed.descriptor) {
                taken.push(item);
            }
            cut = parsed.span.end;
        }
        if cut == 0 {
            return Ok(taken);
        }

        let mut written = 0;
        self.commit_index(&writer, snap.index_start, snap.index_start, &snap.raw[cut..], &mut written)?;
        Ok(taken)
    }

    /// Rewrites the index stream (plus its `END` terminator) at
    /// `index_start`, then the header pointing at it.
    fn commit_index(
        &self,
        writer: &File,
        old_index_start: u64,
        index_start: u64,
        stream: &[u8],
        written: &mut usize,
    ) -> Result<()> {
        if index_start != old_index_start {
            debug!("index list relocated {old_index_start} -> {index_start}");
        }
        let mut buf = Vec::with_capacity(stream.len() + 1);
        buf.extend_from_slice(stream);
        buf.push(END);
        write_chunk(writer, &buf, index_start, written)?;

        let header = Header {
            index_start,
            index_len: stream.len() as u64,
        };
        let mut header_buf = Vec::new();
        header.encode_into(&mut header_buf);
        write_chunk(writer, &header_buf, 0, written)
    }

    /// Filter-one scan: copies the stream without the descriptor whose
    /// stored key equals `key`. Returns the filtered stream and the
    /// descriptors that survived (the planner's view of live payloads).
    fn strip_key(&self, raw: &[u8], key: &[u8], fp: &Fingerprint) -> (Vec<u8>, Vec<Descriptor>) {
        let mut stream = Vec::with_capacity(raw.len());
        let mut live = Vec::new();
        let mut dropped = false;
        for parsed in DescriptorStream::new(raw) {
            let d = parsed.descriptor;
            if !dropped
                && fp.may_match(d.size_key, d.sum_key, d.sum_md5)
                && self.pull_key(&d).is_some_and(|stored| stored == key)
            {
                dropped = true;
                continue;
            }
            stream.extend_from_slice(&raw[parsed.span]);
            live.push(d);
        }
        (stream, live)
    }

    /// Filter-many scan: as [`strip_key`](Bucket::strip_key) for a whole
    /// batch. Each target stops being checked once it has matched, so the
    /// disk compare runs at most once per target.
    fn strip_keys(
        &self,
        raw: &[u8],
        targets: &[(&[u8], &Fingerprint)],
    ) -> (Vec<u8>, Vec<Descriptor>) {
        let mut stream = Vec::with_capacity(raw.len());
        let mut live = Vec::new();
        let mut matched = vec![false; targets.len()];
        'scan: for parsed in DescriptorStream::new(raw) {
            let d = parsed.descriptor;
            for (t, (key, fp)) in targets.iter().enumerate() {
                if matched[t] || !fp.may_match(d.size_key, d.sum_key, d.sum_md5) {
                    continue;
                }
                if self.pull_key(&d).is_some_and(|stored| stored == *key) {
                    matched[t] = true;
                    continue 'scan;
                }
            }
            stream.extend_from_slice(&raw[parsed.span]);
            live.push(d);
        }
        (stream, live)
    }
}

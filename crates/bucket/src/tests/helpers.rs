use std::collections::HashSet;

use codec::{DescriptorStream, HEADER_BYTES};
use tempfile::TempDir;

use crate::{Bucket, Item};

/// Opens a bucket on a fresh temp file. The `TempDir` must stay alive for
/// the duration of the test.
pub(crate) fn temp_bucket() -> anyhow::Result<(TempDir, Bucket)> {
    let dir = tempfile::tempdir()?;
    let bucket = Bucket::open(dir.path().join("data.db"))?;
    Ok((dir, bucket))
}

pub(crate) fn item(key: &[u8], data: &[u8]) -> Item {
    Item::new(key.to_vec(), data.to_vec())
}

/// Asserts the on-disk layout invariants: live payload intervals are
/// pairwise disjoint and confined to `[HEADER_BYTES, index_start)`, every
/// stored key reproduces its descriptor's fingerprint, and keys are unique.
pub(crate) fn check_layout(bucket: &Bucket) {
    let snap = bucket.read_index();
    let descriptors: Vec<_> = DescriptorStream::new(&snap.raw)
        .map(|p| p.descriptor)
        .collect();

    let mut intervals: Vec<(u64, u64)> = descriptors.iter().map(|d| (d.start, d.end())).collect();
    intervals.sort_unstable();
    for pair in intervals.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "live payload intervals overlap: {pair:?}"
        );
    }
    for &(start, end) in &intervals {
        assert!(start >= HEADER_BYTES as u64, "payload inside header region");
        assert!(end <= snap.index_start, "payload overlaps the index list");
    }

    let mut keys = HashSet::new();
    for d in &descriptors {
        let item = bucket
            .pull_verified(d)
            .expect("live descriptor fails key verification");
        assert!(keys.insert(item.key), "duplicate live key in index");
    }
}

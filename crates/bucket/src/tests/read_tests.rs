use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use anyhow::Result;

use super::helpers::{item, temp_bucket};
use crate::Bucket;

#[test]
fn list_respects_limit() -> Result<()> {
    let (_dir, bucket) = temp_bucket()?;

    bucket.set_many(&[
        item(b"k1", b"v1"),
        item(b"k2", b"v2"),
        item(b"k3", b"v3"),
        item(b"k4", b"v4"),
    ]);

    let first = bucket.list(2);
    assert_eq!(first, vec![item(b"k1", b"v1"), item(b"k2", b"v2")]);
    assert!(bucket.list(0).is_empty());
    assert_eq!(bucket.list(255).len(), 4);
    Ok(())
}

#[test]
fn list_next_pages_through_the_bucket() -> Result<()> {
    let (_dir, bucket) = temp_bucket()?;

    bucket.set_many(&[
        item(b"k1", b"v1"),
        item(b"k2", b"v2"),
        item(b"k3", b"v3"),
        item(b"k4", b"v4"),
    ]);

    let page = bucket.list_next(2, 2);
    assert_eq!(page, vec![item(b"k3", b"v3"), item(b"k4", b"v4")]);
    assert!(bucket.list_next(2, 4).is_empty());
    assert_eq!(bucket.list_next(10, 3).len(), 1);
    Ok(())
}

#[test]
fn find_next_from_a_cursor_key() -> Result<()> {
    let (_dir, bucket) = temp_bucket()?;

    bucket.set_many(&[
        item(b"a", b"1"),
        item(b"b", b"2"),
        item(b"c", b"3"),
        item(b"d", b"4"),
    ]);

    let after = bucket.find_next(b"b", 10, true);
    assert_eq!(after, vec![item(b"c", b"3"), item(b"d", b"4")]);

    let from = bucket.find_next(b"b", 10, false);
    assert_eq!(
        from,
        vec![item(b"b", b"2"), item(b"c", b"3"), item(b"d", b"4")]
    );
    Ok(())
}

#[test]
fn find_next_match_counts_against_the_limit() -> Result<()> {
    let (_dir, bucket) = temp_bucket()?;

    bucket.set_many(&[item(b"a", b"1"), item(b"b", b"2"), item(b"c", b"3")]);

    // limit 2 with only_after: the suppressed match "a" uses one slot
    let out = bucket.find_next(b"a", 2, true);
    assert_eq!(out, vec![item(b"b", b"2")]);
    Ok(())
}

#[test]
fn find_next_on_a_missing_key_is_empty() -> Result<()> {
    let (_dir, bucket) = temp_bucket()?;

    bucket.set_many(&[item(b"a", b"1"), item(b"b", b"2")]);
    assert!(bucket.find_next(b"zz", 10, false).is_empty());
    Ok(())
}

#[test]
fn get_distinguishes_permuted_keys() -> Result<()> {
    // "ab" and "ba" collide on length and byte sum; the md5-hex sum and the
    // exact compare must keep them apart.
    let (_dir, bucket) = temp_bucket()?;

    bucket.set(item(b"ab", b"first"))?;
    bucket.set(item(b"ba", b"second"))?;

    assert_eq!(bucket.get(b"ab").unwrap().data, b"first");
    assert_eq!(bucket.get(b"ba").unwrap().data, b"second");
    Ok(())
}

#[test]
fn corrupted_payload_is_skipped_not_surfaced() -> Result<()> {
    let (dir, bucket) = temp_bucket()?;

    bucket.set(item(b"good", b"data"))?;
    bucket.set(item(b"bad!", b"data"))?;

    // The first payload of a fresh bucket lands right after the header at
    // offset 128 ("good" + its data). Stomp its key bytes on disk.
    let mut f = OpenOptions::new()
        .write(true)
        .open(dir.path().join("data.db"))?;
    f.seek(SeekFrom::Start(128))?;
    f.write_all(b"XXXX")?;
    f.sync_all()?;

    // get misses, list skips the broken entry, nothing errors
    assert!(bucket.get(b"good").is_none());
    let listed = bucket.list(10);
    assert_eq!(listed, vec![item(b"bad!", b"data")]);
    Ok(())
}

#[test]
fn reads_see_writes_from_a_second_handle_on_the_same_file() -> Result<()> {
    let (dir, bucket) = temp_bucket()?;
    let other = Bucket::open(dir.path().join("data.db"))?;

    bucket.set(item(b"shared", b"v"))?;
    assert_eq!(other.get(b"shared").unwrap().data, b"v");

    other.delete(b"shared")?;
    assert!(bucket.get(b"shared").is_none());
    Ok(())
}

#[test]
fn bucket_contents_survive_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("data.db");

    {
        let bucket = Bucket::open(&path)?;
        bucket.set_many(&[item(b"k1", b"v1"), item(b"k2", b"v2")]);
    }

    let bucket = Bucket::open(&path)?;
    assert_eq!(bucket.get(b"k1").unwrap().data, b"v1");
    assert_eq!(bucket.list(10).len(), 2);
    Ok(())
}

#[test]
fn empty_file_reads_as_an_empty_bucket() -> Result<()> {
    let (_dir, bucket) = temp_bucket()?;

    assert!(bucket.get(b"anything").is_none());
    assert!(bucket.list(255).is_empty());
    assert!(bucket.find_next(b"k", 10, false).is_empty());
    assert_eq!(bucket.count(), 0);
    Ok(())
}

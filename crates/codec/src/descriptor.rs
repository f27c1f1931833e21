use std::ops::Range;

use crate::{decode, encode_into, END, SIZE_DATA, SIZE_KEY, START, SUM_KEY, SUM_MD5};

/// One live entry's index record.
///
/// `start` is the absolute file offset of the payload (`size_key` key bytes
/// immediately followed by `size_data` data bytes). `sum_key` and `sum_md5`
/// are the arithmetic fingerprint sums used as a cheap pre-filter before the
/// key is re-read from disk and compared exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub start: u64,
    pub size_key: u64,
    pub sum_key: u64,
    pub sum_md5: u64,
    pub size_data: u64,
}

impl Descriptor {
    /// Total payload length: key bytes plus data bytes. Saturates so that a
    /// descriptor decoded out of a corrupt stream cannot overflow interval
    /// arithmetic.
    #[must_use]
    pub fn block_size(&self) -> u64 {
        self.size_key.saturating_add(self.size_data)
    }

    /// First file offset past the payload.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.block_size())
    }

    /// Appends this descriptor's encoding to `buf`.
    ///
    /// Layout: `enc(start) START enc(size_key) SIZE_KEY enc(sum_key) SUM_KEY
    /// enc(sum_md5) SUM_MD5 enc(size_data) SIZE_DATA`. No trailing `END`;
    /// the stream terminator belongs to the index list as a whole.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        encode_into(buf, self.start);
        buf.push(START);
        encode_into(buf, self.size_key);
        buf.push(SIZE_KEY);
        encode_into(buf, self.sum_key);
        buf.push(SUM_KEY);
        encode_into(buf, self.sum_md5);
        buf.push(SUM_MD5);
        encode_into(buf, self.size_data);
        buf.push(SIZE_DATA);
    }
}

/// A descriptor together with the byte range it occupies in the stream.
///
/// The span runs from the first byte after the previous descriptor's
/// `SIZE_DATA` sentinel (or the start of the stream) through this
/// descriptor's own `SIZE_DATA` sentinel, inclusive. Rewrites that drop or
/// keep whole descriptors splice the raw stream on these spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub descriptor: Descriptor,
    pub span: Range<usize>,
}

/// Single-pass parser over a raw descriptor stream.
///
/// Yields every complete descriptor in order. Parsing stops at the first
/// `END` sentinel or when the input runs out mid-descriptor (a truncated
/// tail is treated as a clean end of stream, never an error). All scan
/// modes (plain listing, key filtering, prefix-cut location) are built on
/// this one iterator.
pub struct DescriptorStream<'a> {
    bytes: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> DescriptorStream<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            done: false,
        }
    }
}

impl Iterator for DescriptorStream<'_> {
    type Item = Parsed;

    fn next(&mut self) -> Option<Parsed> {
        if self.done {
            return None;
        }
        let span_start = self.pos;
        let mut group = self.pos;
        let mut d = Descriptor::default();
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            match b {
                START => {
                    d.start = decode(&self.bytes[group..self.pos - 1]);
                    group = self.pos;
                }
                SIZE_KEY => {
                    d.size_key = decode(&self.bytes[group..self.pos - 1]);
                    group = self.pos;
                }
                SUM_KEY => {
                    d.sum_key = decode(&self.bytes[group..self.pos - 1]);
                    group = self.pos;
                }
                SUM_MD5 => {
                    d.sum_md5 = decode(&self.bytes[group..self.pos - 1]);
                    group = self.pos;
                }
                SIZE_DATA => {
                    d.size_data = decode(&self.bytes[group..self.pos - 1]);
                    return Some(Parsed {
                        descriptor: d,
                        span: span_start..self.pos,
                    });
                }
                END => {
                    self.done = true;
                    return None;
                }
                _ => {} // digit-group byte, keeps accumulating
            }
        }
        self.done = true;
        None
    }
}

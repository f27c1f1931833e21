use crate::{decode, encode_into, END};

/// Size of the reserved region at the start of the file. Offsets below this
/// never hold payload bytes, which is why an `index_start` under 128 can
/// double as the "empty bucket" signal.
pub const HEADER_BYTES: usize = 128;

/// The file's root pointer: where the index list lives and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub index_start: u64,
    pub index_len: u64,
}

impl Header {
    /// The header of a bucket with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            index_start: HEADER_BYTES as u64,
            index_len: 0,
        }
    }

    /// Appends `enc(index_start) END enc(index_len) END` to `buf`.
    ///
    /// The encoding is far shorter than [`HEADER_BYTES`]; whatever follows in
    /// the reserved region is ignored by [`Header::decode`], so writers only
    /// rewrite the leading bytes.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        encode_into(buf, self.index_start);
        buf.push(END);
        encode_into(buf, self.index_len);
        buf.push(END);
    }

    /// Decodes the header region. `bytes` is whatever could be read from
    /// offset 0, at most [`HEADER_BYTES`] of which are examined.
    ///
    /// A fresh or unreadable file (all zeros, or any `index_start` below the
    /// reserved region) decodes as [`Header::empty`]; readers never fail.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let region = &bytes[..bytes.len().min(HEADER_BYTES)];

        let mut first_end = None;
        let mut second_end = region.len();
        for (i, &b) in region.iter().enumerate() {
            if b != END {
                continue;
            }
            if first_end.is_none() {
                first_end = Some(i);
            } else {
                second_end = i;
                break;
            }
        }
        let (start_digits, len_digits) = match first_end {
            Some(i) => (&region[..i], &region[i + 1..second_end]),
            None => (region, &region[..0]),
        };

        let index_start = decode(start_digits);
        if index_start < HEADER_BYTES as u64 {
            return Self::empty();
        }
        Self {
            index_start,
            index_len: decode(len_digits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let h = Header {
            index_start: 70_000,
            index_len: 1_234,
        };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        assert!(buf.len() <= HEADER_BYTES);
        assert_eq!(Header::decode(&buf), h);
    }

    #[test]
    fn roundtrip_through_padded_region() {
        let h = Header {
            index_start: 128,
            index_len: 0,
        };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        buf.resize(HEADER_BYTES, 0);
        // Stale garbage past the second END is ignored.
        let last = buf.len() - 1;
        buf[last] = 93;
        assert_eq!(Header::decode(&buf), h);
    }

    #[test]
    fn fresh_file_decodes_empty() {
        assert_eq!(Header::decode(&[]), Header::empty());
        assert_eq!(Header::decode(&[0u8; HEADER_BYTES]), Header::empty());
    }

    #[test]
    fn index_start_below_reserved_region_decodes_empty() {
        let h = Header {
            index_start: 127,
            index_len: 40,
        };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        assert_eq!(Header::decode(&buf), Header::empty());
    }

    #[test]
    fn decode_examines_at_most_the_reserved_region() {
        let h = Header {
            index_start: 128,
            index_len: 7,
        };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        buf.resize(HEADER_BYTES, 0);
        // An END pair past the region boundary must not confuse decoding.
        buf.extend_from_slice(&[END, 9, END]);
        assert_eq!(Header::decode(&buf), h);
    }
}

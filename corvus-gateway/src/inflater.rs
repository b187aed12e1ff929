//! Zlib-stream inflation for compressed gateway connections.
//!
//! A single long-lived `Decompress` stream spans the whole connection;
//! a message boundary is only ever the trailing bytes `00 00 FF FF`, which
//! may or may not line up with a single TCP read — `extend` only appends,
//! and `message` only attempts to decompress once the suffix is present,
//! so a boundary split across two reads still produces exactly one message
//! once the second read's bytes are appended. Grounded on the teacher's
//! `shard::processor::inflater::Inflater`, trimmed of its shard-id-tagged
//! metrics (out of scope here) but keeping the same buffer-reuse shape.

use flate2::{Decompress, DecompressError, FlushDecompress};
use std::convert::TryInto;

const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
const INTERNAL_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug)]
pub struct Inflater {
    decompress: Decompress,
    compressed: Vec<u8>,
    internal_buffer: Vec<u8>,
    buffer: Vec<u8>,
}

impl Inflater {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decompress: Decompress::new(true),
            compressed: Vec::new(),
            internal_buffer: Vec::with_capacity(INTERNAL_BUFFER_SIZE),
            buffer: Vec::with_capacity(INTERNAL_BUFFER_SIZE),
        }
    }

    /// Append bytes read from the socket. Does not attempt to decompress;
    /// call [`Inflater::message`] to check whether a full message boundary
    /// has now been reached.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.compressed.extend_from_slice(bytes);
    }

    /// Decompress and return the next message, if the accumulated bytes end
    /// on a `00 00 FF FF` boundary. Returns `None` (without consuming the
    /// accumulated bytes) if the boundary hasn't arrived yet — the next
    /// `extend` call picks up where this left off.
    pub fn message(&mut self) -> Result<Option<&[u8]>, DecompressError> {
        let length = self.compressed.len();

        if length < 4 || self.compressed[length - 4..] != ZLIB_SUFFIX {
            return Ok(None);
        }

        self.buffer.clear();
        let before = self.decompress.total_in();
        let mut offset = 0;

        loop {
            self.internal_buffer.clear();
            self.decompress.decompress_vec(
                &self.compressed[offset..],
                &mut self.internal_buffer,
                FlushDecompress::Sync,
            )?;

            offset = (self.decompress.total_in() - before)
                .try_into()
                .unwrap_or_default();
            self.buffer.extend_from_slice(&self.internal_buffer);

            let not_at_capacity = self.internal_buffer.len() < self.internal_buffer.capacity();
            if not_at_capacity || offset > self.compressed.len() {
                break;
            }
        }

        self.compressed.clear();

        Ok(Some(&self.buffer))
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    fn compress(payload: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn single_read_containing_full_boundary_decompresses() {
        let payload = br#"{"op":10,"d":{"heartbeat_interval":41250}}"#;
        let compressed = compress(payload);

        let mut inflater = Inflater::new();
        inflater.extend(&compressed);

        let message = inflater.message().unwrap().expect("boundary present");
        assert_eq!(message, payload);
    }

    #[test]
    fn boundary_split_across_two_reads_still_detected() {
        let payload = br#"{"op":11}"#;
        let compressed = compress(payload);
        let (first, second) = compressed.split_at(compressed.len() - 2);

        let mut inflater = Inflater::new();
        inflater.extend(first);
        assert!(inflater.message().unwrap().is_none());

        inflater.extend(second);
        let message = inflater.message().unwrap().expect("boundary now present");
        assert_eq!(message, payload);
    }
}

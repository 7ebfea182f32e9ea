//! Receive buffer for the frame reader

use bytes::{Buf, Bytes, BytesMut};

use crate::constants::BUF_CHUNK;

/// Growable byte buffer that finds packet terminators incrementally.
///
/// Bytes already searched are remembered, so appending a small chunk to a
/// large partial packet only rescans the new bytes plus a short overlap for
/// a terminator split across two reads.
#[derive(Debug)]
pub(crate) struct PacketBuffer {
    buf: BytesMut,
    scanned: usize,
}

impl PacketBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(BUF_CHUNK),
            scanned: 0,
        }
    }

    pub(crate) fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf
            .extend_from_slice(data);
    }

    pub(crate) fn len(&self) -> usize {
        self.buf
            .len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf
            .is_empty()
    }

    /// Split off everything before the first `terminator`, discarding the
    /// terminator itself. Returns `None` when no complete terminator is
    /// buffered yet.
    pub(crate) fn take_until(&mut self, terminator: &[u8]) -> Option<Bytes> {
        let overlap = terminator
            .len()
            .saturating_sub(1);
        let start = self
            .scanned
            .saturating_sub(overlap);

        let found = self.buf[start..]
            .windows(terminator.len())
            .position(|window| window == terminator);

        match found {
            Some(offset) => {
                let frame = self
                    .buf
                    .split_to(start + offset)
                    .freeze();
                self.buf
                    .advance(terminator.len());
                self.scanned = 0;
                Some(frame)
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Drop all buffered bytes.
    pub(crate) fn clear(&mut self) {
        self.buf
            .clear();
        self.scanned = 0;
    }
}

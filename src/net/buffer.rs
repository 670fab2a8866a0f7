//! Flat message buffers and their vectored I/O descriptors.
//!
//! The native transmit/receive primitives take scatter/gather descriptors.
//! A `MessageBuffer` is always exposed as a single descriptor covering its
//! full capacity, so a receive can never write past it. The buffer is zeroed
//! before every receive so bytes left over from an earlier iteration are
//! never observable.

use std::io::{self, IoSlice, IoSliceMut};
use std::mem::MaybeUninit;

use socket2::MaybeUninitSlice;

use crate::net::error::{SocketError, SocketResult};

/// A fixed-capacity byte buffer with an explicit filled length.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    data: Vec<u8>,
    len: usize,
}

impl MessageBuffer {
    /// Allocate a zeroed buffer. Allocation failure is reported, not aborted on.
    pub fn with_capacity(capacity: usize) -> SocketResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| SocketError::Resource(io::Error::new(io::ErrorKind::OutOfMemory, e)))?;
        data.resize(capacity, 0);
        Ok(Self { data, len: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes written by the last receive.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The received bytes, truncated to the reported length.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Received bytes as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Zero the whole buffer and forget the previous length.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    /// Zero the buffer and expose it as one stream read descriptor.
    pub(crate) fn read_descriptor(&mut self) -> [IoSliceMut<'_>; 1] {
        self.reset();
        [IoSliceMut::new(&mut self.data)]
    }

    /// Zero the buffer and expose it as one datagram receive descriptor.
    pub(crate) fn recv_descriptor(&mut self) -> [MaybeUninitSlice<'_>; 1] {
        self.reset();
        // SAFETY: `MaybeUninit<u8>` has the same layout as `u8`, and the
        // native receive only ever stores initialized bytes into the slice.
        let uninit: &mut [MaybeUninit<u8>] = unsafe {
            std::slice::from_raw_parts_mut(
                self.data.as_mut_ptr() as *mut MaybeUninit<u8>,
                self.data.len(),
            )
        };
        [MaybeUninitSlice::new(uninit)]
    }

    /// Record how many bytes the receive reported.
    pub(crate) fn commit(&mut self, received: usize) {
        self.len = received.min(self.data.len());
    }
}

/// Expose a caller buffer as one transmit descriptor. No copy is made.
pub(crate) fn send_descriptor(bytes: &[u8]) -> [IoSlice<'_>; 1] {
    [IoSlice::new(bytes)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed_and_empty() {
        let buf = MessageBuffer::with_capacity(16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert!(buf.is_empty());
        assert_eq!(buf.as_bytes(), b"");
    }

    #[test]
    fn commit_truncates_to_capacity() {
        let mut buf = MessageBuffer::with_capacity(4).unwrap();
        buf.commit(10);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn descriptor_zeroes_stale_bytes() {
        let mut buf = MessageBuffer::with_capacity(8).unwrap();
        buf.data.copy_from_slice(b"stalebuf");
        buf.commit(8);

        {
            let desc = buf.recv_descriptor();
            assert_eq!(desc[0].len(), 8);
        }
        assert!(buf.is_empty());
        assert!(buf.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn read_descriptor_zeroes_stale_bytes() {
        let mut buf = MessageBuffer::with_capacity(4).unwrap();
        buf.data.copy_from_slice(b"old!");
        buf.commit(4);

        {
            let desc = buf.read_descriptor();
            assert_eq!(desc[0].len(), 4);
        }
        assert!(buf.is_empty());
        assert_eq!(buf.data, [0; 4]);
    }

    #[test]
    fn lossy_text() {
        let mut buf = MessageBuffer::with_capacity(8).unwrap();
        buf.data[..2].copy_from_slice(b"hi");
        buf.commit(2);
        assert_eq!(buf.to_string_lossy(), "hi");
    }

    #[test]
    fn send_descriptor_covers_input() {
        let desc = send_descriptor(b"payload");
        assert_eq!(desc[0].len(), 7);
    }
}

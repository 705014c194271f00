//! Fixed-size encoding buffer.

use std::io;

/// Byte buffer of fixed size that payloads are rendered into.
///
/// Implements [`io::Write`] so it can be fed by `write!` and
/// `serde_json::to_writer`. Each individual write is all-or-nothing: a write
/// that does not fit is refused with [`io::ErrorKind::WriteZero`] and leaves
/// the buffer untouched, so a failed render can never be mistaken for a
/// truncated document.
pub struct EncodeBuffer {
    bytes: Box<[u8]>,
    len: usize,
}

impl EncodeBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Zeroes the buffer and rewinds it.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.len = 0;
    }

    /// Rendered bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Number of bytes written since the last reset.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written since the last reset.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes still free.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.len
    }
}

impl io::Write for EncodeBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "encoding buffer full",
            ));
        }
        self.bytes[self.len..self.len + buf.len()].copy_from_slice(buf);
        self.len += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for EncodeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeBuffer")
            .field("len", &self.len)
            .field("capacity", &self.bytes.len())
            .finish()
    }
}

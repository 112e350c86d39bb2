//! # Message Buffer
//!
//! Cursor-addressed byte buffer with typed read/write primitives.
//!
//! One buffer holds exactly one message. Inbound buffers are replaced once per
//! delivery with [`MessageBuffer::reset`]; outbound buffers are drained once per
//! flush with [`MessageBuffer::take`].
//!
//! ## Encoding
//! - Integers are little-endian
//! - Strings are NUL-terminated, decoded lossily as UTF-8
//! - Binary blobs carry a `u16` little-endian length prefix
//!
//! Reads never go past the logical length; a read that would is a
//! [`AdminError::Framing`] and the caller should treat it as end-of-message.

use crate::error::{constants, AdminError, Result};
use bytes::{BufMut, Bytes, BytesMut};

#[derive(Debug, Default, Clone)]
pub struct MessageBuffer {
    data: BytesMut,
    cursor: usize,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inbound buffer holding one received message.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            cursor: 0,
        }
    }

    /// Replace the contents with a new message and rewind the cursor.
    pub fn reset(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.cursor = 0;
    }

    /// Drain everything written so far, leaving an empty buffer.
    pub fn take(&mut self) -> Bytes {
        self.cursor = 0;
        self.data.split().freeze()
    }

    /// Discard any unread bytes.
    pub fn skip_rest(&mut self) {
        self.cursor = self.data.len();
    }

    /// True while the cursor has not reached the end of the message.
    #[inline]
    pub fn remaining(&self) -> bool {
        self.cursor < self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn advance(&mut self, count: usize) -> Result<&[u8]> {
        let end = self
            .cursor
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(AdminError::Framing(constants::ERR_READ_PAST_END))?;
        let start = self.cursor;
        self.cursor = end;
        Ok(&self.data[start..end])
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.advance(1)?[0])
    }

    pub fn read_short(&mut self) -> Result<u16> {
        let b = self.advance(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_long(&mut self) -> Result<i32> {
        let b = self.advance(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read up to the next NUL and move the cursor past it.
    pub fn read_string(&mut self) -> Result<String> {
        let rest = &self.data[self.cursor..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(AdminError::Framing(constants::ERR_UNTERMINATED_STRING))?;
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.cursor += end + 1;
        Ok(text)
    }

    /// Read a `u16`-length-prefixed blob.
    pub fn read_data(&mut self) -> Result<Vec<u8>> {
        let len = self.read_short()? as usize;
        Ok(self.advance(len)?.to_vec())
    }

    pub fn write_byte(&mut self, b: u8) {
        self.data.put_u8(b);
    }

    pub fn write_short(&mut self, v: u16) {
        self.data.put_u16_le(v);
    }

    pub fn write_long(&mut self, v: i32) {
        self.data.put_i32_le(v);
    }

    /// Append the string followed by a NUL terminator.
    ///
    /// Embedded NULs would desynchronize the reader, so the string is cut at the first one.
    pub fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        self.data.put_slice(&bytes[..end]);
        self.data.put_u8(0);
    }

    pub fn write_data(&mut self, blob: &[u8]) -> Result<()> {
        let len =
            u16::try_from(blob.len()).map_err(|_| AdminError::Framing(constants::ERR_BLOB_TOO_LARGE))?;
        self.write_short(len);
        self.data.put_slice(blob);
        Ok(())
    }
}

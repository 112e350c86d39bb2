//! Transport framing for session workers.
//!
//! ```text
//! [Length(4, big-endian)] [Payload(N)]
//! ```
//!
//! The payload is one envelope (see [`crate::utils::crypto::Envelope`]). The length is
//! validated against the configured maximum before any allocation.

use crate::error::AdminError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = AdminError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > self.max_frame_size {
            return Err(AdminError::OversizedFrame(len));
        }

        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = AdminError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(AdminError::OversizedFrame(item.len()));
        }
        dst.reserve(HEADER_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_frames() {
        let mut codec = FrameCodec::new(1024);
        let mut wire = BytesMut::new();
        codec
            .encode(Bytes::from_static(b"\x00\x0bhello"), &mut wire)
            .unwrap();

        let mut partial = wire.split_to(3);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        partial.unsplit(wire);
        let frame = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(&frame[..], b"\x00\x0bhello");
        assert!(partial.is_empty());
    }

    #[test]
    fn test_oversized_rejected() {
        let mut codec = FrameCodec::new(16);
        let mut wire = BytesMut::new();
        wire.put_u32(17);
        wire.put_slice(&[0u8; 17]);
        assert!(matches!(
            codec.decode(&mut wire),
            Err(AdminError::OversizedFrame(17))
        ));

        let mut out = BytesMut::new();
        assert!(codec
            .encode(Bytes::from(vec![0u8; 17]), &mut out)
            .is_err());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = FrameCodec::new(64);
        let mut wire = BytesMut::new();
        codec.encode(Bytes::from_static(b"a"), &mut wire).unwrap();
        codec.encode(Bytes::from_static(b"bc"), &mut wire).unwrap();
        assert_eq!(&codec.decode(&mut wire).unwrap().unwrap()[..], b"a");
        assert_eq!(&codec.decode(&mut wire).unwrap().unwrap()[..], b"bc");
        assert!(codec.decode(&mut wire).unwrap().is_none());
    }
}

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{FRAME_HEADER_LEN, MAX_FRAME_SIZE};
use crate::core::frame::{peek_header, Frame};
use crate::error::ProtocolError;

/// Tokio codec for fernq frames.
///
/// Partial frames stay in the read buffer untouched; complete frames are split
/// off without copying.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((total, code)) = peek_header(src, self.max_frame_size)? else {
            src.reserve(FRAME_HEADER_LEN - src.len());
            return Ok(None);
        };

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(FRAME_HEADER_LEN);

        Ok(Some(Frame {
            code,
            payload: frame.freeze(),
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let total = item.wire_len();
        if total > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(total));
        }

        dst.reserve(total);
        dst.put_u32(total as u32);
        dst.put_u16(item.code);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

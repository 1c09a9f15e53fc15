//! Framing for the helper socket.
//!
//! Every message is an 18 byte big-endian header followed by `content_length` bytes of JSON:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 1 | API version |
//! | 1 | 1 | flags (high nibble), event id (low nibble) |
//! | 2 | 8 | request id (signed) |
//! | 10 | 4 | operation id |
//! | 14 | 4 | content length |

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ErrorKind;
use crate::{Error, Result};

pub(crate) const HEADER_LEN: usize = 18;

pub(crate) const API_VERSION: u8 = 1;

/// Upper bound on a frame's content length.
pub(crate) const MAX_CONTENT_LENGTH: u32 = 16 * 1024 * 1024;

const FLAG_OPERATION_COMPLETE: u8 = 0x1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Header {
    pub version: u8,
    /// Four bits.
    pub flags: u8,
    /// Four bits. Zero for replies.
    pub event_id: u8,
    pub request_id: i64,
    pub operation_id: u32,
    pub content_length: u32,
}

impl Header {
    pub fn request(request_id: i64, content_length: u32) -> Self {
        Header {
            version: API_VERSION,
            request_id,
            content_length,
            ..Default::default()
        }
    }

    pub fn is_operation_complete(&self) -> bool {
        self.flags & FLAG_OPERATION_COMPLETE != 0
    }

    pub fn is_event(&self) -> bool {
        self.event_id != 0
    }

    pub fn pack(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let mut out = &mut buf[..];
        out.put_u8(self.version);
        out.put_u8(((self.flags & 0x0f) << 4) | (self.event_id & 0x0f));
        out.put_i64(self.request_id);
        out.put_u32(self.operation_id);
        out.put_u32(self.content_length);
        buf
    }

    pub fn unpack(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::new(
                ErrorKind::Decode,
                None,
                format!("header needs {HEADER_LEN} bytes, got {}", buf.len()),
            ));
        }

        let version = buf.get_u8();
        let info = buf.get_u8();
        Ok(Header {
            version,
            flags: info >> 4,
            event_id: info & 0x0f,
            request_id: buf.get_i64(),
            operation_id: buf.get_u32(),
            content_length: buf.get_u32(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShimCodec {
    max_content_length: u32,
}

impl Default for ShimCodec {
    fn default() -> Self {
        ShimCodec {
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }
}

impl Decoder for ShimCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        }

        let header = Header::unpack(&src[..HEADER_LEN])?;
        if header.content_length > self.max_content_length {
            return Err(Error::new(
                ErrorKind::Decode,
                None,
                format!(
                    "frame content length {} exceeds the limit of {}",
                    header.content_length, self.max_content_length
                ),
            ));
        }

        let total = HEADER_LEN + header.content_length as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(header.content_length as usize).freeze();
        Ok(Some(Frame { header, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let (expected, got) = match Header::unpack(src) {
            Ok(header) => (header.content_length as usize, src.len() - HEADER_LEN),
            Err(_) => (HEADER_LEN, src.len()),
        };
        src.clear();
        Err(Error::new(
            ErrorKind::Decode,
            None,
            format!("truncated frame: expected {expected} bytes, got {got}"),
        ))
    }
}

impl Encoder<Frame> for ShimCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let content_length = u32::try_from(frame.payload.len())
            .ok()
            .filter(|len| *len <= self.max_content_length)
            .ok_or_else(|| Error::new(ErrorKind::InvalidParameter, None, "request payload is too large".to_string()))?;

        let header = Header {
            content_length,
            ..frame.header
        };
        dst.reserve(HEADER_LEN + frame.payload.len());
        dst.put_slice(&header.pack());
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

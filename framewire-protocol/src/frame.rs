//! Binary frame format.
//!
//! Frame layout (16 bytes header + payload), all integers big-endian:
//!
//! ```text
//! +---------+---------+------------+----------+-------------+---------+-------------+
//! |  magic  | version | serializer | msg type | sequence id | padding | payload_len |
//! | 4 bytes | 1 byte  |   1 byte   |  1 byte  |   4 bytes   | 1 byte  |   4 bytes   |
//! +---------+---------+------------+----------+-------------+---------+-------------+
//! | payload                                                                         |
//! | payload_len bytes                                                               |
//! +---------------------------------------------------------------------------------+
//! ```

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic bytes opening every frame.
pub const MAGIC: [u8; 4] = [1, 2, 3, 4];

/// Protocol version written on every frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Value written into the unused alignment byte.
pub const PADDING_BYTE: u8 = 0xFF;

/// Size of the fixed frame header in bytes (4+1+1+1+4+1+4 = 16).
pub const FRAME_HEADER_SIZE: usize = 16;

/// Offset of the big-endian payload length field.
pub const LENGTH_FIELD_OFFSET: usize = 12;

/// Parsed fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub version: u8,
    /// Serializer ordinal.
    pub serializer: u8,
    /// Message type code.
    pub message_type: u8,
    pub sequence_id: u32,
    pub payload_len: u32,
}

impl FrameHeader {
    /// Reads the header from the start of `buf`.
    ///
    /// Only the byte count is checked here; field validation belongs to the
    /// message codec.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::IncompleteFrame {
                needed: FRAME_HEADER_SIZE - buf.len(),
            });
        }

        let mut cursor = &buf[..FRAME_HEADER_SIZE];
        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        let version = cursor.get_u8();
        let serializer = cursor.get_u8();
        let message_type = cursor.get_u8();
        let sequence_id = cursor.get_u32();
        let _padding = cursor.get_u8();
        let payload_len = cursor.get_u32();

        Ok(Self {
            magic,
            version,
            serializer,
            message_type,
            sequence_id,
            payload_len,
        })
    }

    /// Appends the 16 header bytes to `buf`.
    pub fn write(&self, buf: &mut BytesMut) {
        buf.reserve(FRAME_HEADER_SIZE);
        buf.put_slice(&self.magic);
        buf.put_u8(self.version);
        buf.put_u8(self.serializer);
        buf.put_u8(self.message_type);
        buf.put_u32(self.sequence_id);
        buf.put_u8(PADDING_BYTE);
        buf.put_u32(self.payload_len);
    }

    /// Total frame size described by this header.
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload_len as usize
    }
}

/// Splits one complete frame off the front of `buf`.
///
/// Returns `Ok(Some(frame))` once `16 + payload_len` bytes are buffered,
/// `Ok(None)` if more data is needed, or `Err` if the declared payload
/// exceeds `max_payload`. Only the length field is interpreted.
pub fn split_frame(buf: &mut BytesMut, max_payload: u32) -> Result<Option<Bytes>, ProtocolError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let mut length_field = &buf[LENGTH_FIELD_OFFSET..FRAME_HEADER_SIZE];
    let payload_len = length_field.get_u32();
    if payload_len > max_payload {
        return Err(ProtocolError::FrameTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    // Capacity grows with arriving bytes only, never with the declared length.
    let total_len = FRAME_HEADER_SIZE + payload_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    Ok(Some(buf.split_to(total_len).freeze()))
}

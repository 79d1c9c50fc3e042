//! Message codec and frame reassembler.

use crate::error::ProtocolError;
use crate::frame::{split_frame, FrameHeader, FRAME_HEADER_SIZE, MAGIC, PROTOCOL_VERSION};
use crate::message::Message;
use crate::registry::MessageRegistry;
use crate::serializer::SerializerAlgorithm;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{BufMut, Bytes, BytesMut};

/// Converts between complete frames and typed messages.
///
/// Holds only frozen configuration, so one instance can be cloned into every
/// connection worker and used concurrently.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    serializer: SerializerAlgorithm,
    registry: MessageRegistry,
    max_payload: u32,
}

impl MessageCodec {
    /// Creates a codec over the process-wide registry.
    pub fn new(serializer: SerializerAlgorithm) -> Self {
        Self::with_registry(serializer, MessageRegistry::global().clone())
    }

    /// Creates a codec over an explicit registry.
    pub fn with_registry(serializer: SerializerAlgorithm, registry: MessageRegistry) -> Self {
        Self {
            serializer,
            registry,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Sets the largest payload this codec will encode.
    pub fn with_max_payload(mut self, max_payload: u32) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Returns the serializer stamped on outbound frames.
    pub fn serializer(&self) -> SerializerAlgorithm {
        self.serializer
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    /// Encodes a message into a new frame.
    pub fn encode(&self, message: &Message) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::new();
        self.encode_into(message, &mut buf)?;
        Ok(buf)
    }

    /// Appends one encoded frame to `dst`.
    ///
    /// On error nothing is appended.
    pub fn encode_into(&self, message: &Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = message
            .body
            .serialize_with(self.serializer)
            .map_err(|e| ProtocolError::SerializationFailure(e.to_string()))?;

        let payload_len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= self.max_payload)
            .ok_or(ProtocolError::FrameTooLarge {
                size: payload.len().min(u32::MAX as usize) as u32,
                max: self.max_payload,
            })?;

        let header = FrameHeader {
            magic: MAGIC,
            version: PROTOCOL_VERSION,
            serializer: self.serializer.ordinal(),
            message_type: message.message_type().code(),
            sequence_id: message.sequence_id,
            payload_len,
        };

        dst.reserve(header.frame_len());
        header.write(dst);
        dst.put_slice(&payload);
        Ok(())
    }

    /// Decodes one complete frame.
    pub fn decode(&self, frame: &[u8]) -> Result<Message, ProtocolError> {
        if frame.len() < MAGIC.len() {
            return Err(ProtocolError::IncompleteFrame {
                needed: FRAME_HEADER_SIZE - frame.len(),
            });
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&frame[..4]);
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let header = FrameHeader::parse(frame)?;
        let algorithm = SerializerAlgorithm::from_ordinal(header.serializer)?;
        let schema = self.registry.schema(header.message_type)?;

        let payload = &frame[FRAME_HEADER_SIZE..];
        if payload.len() != header.payload_len as usize {
            return Err(ProtocolError::LengthMismatch {
                declared: header.payload_len,
                actual: payload.len(),
            });
        }

        let body = schema.decode(algorithm, payload)?;

        tracing::debug!(
            version = header.version,
            serializer = header.serializer,
            message_type = header.message_type,
            sequence_id = header.sequence_id,
            payload_len = header.payload_len,
            "decoded frame"
        );

        Ok(Message {
            sequence_id: header.sequence_id,
            body,
        })
    }
}

/// Reassembles complete frames from a fragmented byte stream.
///
/// One decoder belongs to one connection; bytes must be fed in arrival
/// order. Frames come out in the same order they went in.
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Sets the largest payload accepted before the stream is rejected.
    pub fn with_max_payload(mut self, max_payload: u32) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to split the next complete frame from the buffer.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        split_frame(&mut self.buffer, self.max_payload)
    }

    /// Attempts to decode the next message from the buffer.
    pub fn decode_next(&mut self, codec: &MessageCodec) -> Result<Option<Message>, ProtocolError> {
        match self.next_frame()? {
            Some(frame) => codec.decode(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

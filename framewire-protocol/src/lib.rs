//! # framewire-protocol
//!
//! Wire protocol implementation for framewire.
//!
//! This crate provides:
//! - Fixed 16-byte frame header with magic, version, serializer and type tags
//! - Frame reassembly from arbitrarily fragmented byte streams
//! - A stateless message codec shared by every connection
//! - Pluggable payload serializers (bincode and JSON)
//! - A write-once message type registry
//! - A process-wide correlation id generator

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod registry;
pub mod sequence;
pub mod serializer;

pub use codec::{FrameDecoder, MessageCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, FRAME_HEADER_SIZE, MAGIC, PROTOCOL_VERSION};
pub use message::{Message, MessageBody, MessageSchema, MessageType, Outcome};
pub use registry::{MessageRegistry, MessageRegistryBuilder};
pub use sequence::{next_sequence_id, SequenceGenerator};
pub use serializer::SerializerAlgorithm;

/// Default port for framewire servers.
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

//! Message type registry.
//!
//! Maps header type codes to schemas. A registry is assembled with
//! [`MessageRegistryBuilder`] and frozen by [`MessageRegistryBuilder::build`];
//! the frozen form has no mutation API, so lookups from many connection
//! workers need no synchronization.
//!
//! The process-wide registry is installed at most once, before the first
//! decode, via [`MessageRegistry::install`].

use crate::error::ProtocolError;
use crate::message::*;
use crate::serializer::SerializerAlgorithm;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Deserializes a payload into one concrete schema.
pub type DecodeFn = fn(SerializerAlgorithm, &[u8]) -> Result<MessageBody, ProtocolError>;

/// A registered schema.
#[derive(Debug, Clone, Copy)]
pub struct MessageSchemaEntry {
    pub message_type: MessageType,
    decode: DecodeFn,
}

impl MessageSchemaEntry {
    /// Deserializes `payload` into this schema.
    pub fn decode(
        &self,
        algorithm: SerializerAlgorithm,
        payload: &[u8],
    ) -> Result<MessageBody, ProtocolError> {
        (self.decode)(algorithm, payload)
    }
}

fn decode_as<T: MessageSchema>(
    algorithm: SerializerAlgorithm,
    payload: &[u8],
) -> Result<MessageBody, ProtocolError> {
    algorithm
        .deserialize::<T>(payload)
        .map(Into::into)
        .map_err(|e| ProtocolError::MalformedPayload {
            message_type: T::MESSAGE_TYPE.code(),
            reason: e.to_string(),
        })
}

fn entry<T: MessageSchema>() -> MessageSchemaEntry {
    MessageSchemaEntry {
        message_type: T::MESSAGE_TYPE,
        decode: decode_as::<T>,
    }
}

/// Collects schemas before freezing them into a [`MessageRegistry`].
#[derive(Debug, Default)]
pub struct MessageRegistryBuilder {
    schemas: HashMap<u8, MessageSchemaEntry>,
}

impl MessageRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers schema `T` under its type code.
    pub fn register<T: MessageSchema>(mut self) -> Result<Self, ProtocolError> {
        let code = T::MESSAGE_TYPE.code();
        if self.schemas.contains_key(&code) {
            return Err(ProtocolError::DuplicateMessageType(code));
        }
        self.schemas.insert(code, entry::<T>());
        Ok(self)
    }

    /// Freezes the collected schemas.
    pub fn build(self) -> MessageRegistry {
        MessageRegistry {
            schemas: Arc::new(self.schemas),
        }
    }
}

/// Frozen code-to-schema mapping. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    schemas: Arc<HashMap<u8, MessageSchemaEntry>>,
}

static GLOBAL: OnceLock<MessageRegistry> = OnceLock::new();

impl MessageRegistry {
    pub fn builder() -> MessageRegistryBuilder {
        MessageRegistryBuilder::new()
    }

    /// Registry holding every declared schema.
    pub fn standard() -> Self {
        let schemas = [
            entry::<LoginRequest>(),
            entry::<LoginResponse>(),
            entry::<ChatRequest>(),
            entry::<ChatResponse>(),
            entry::<GroupCreateRequest>(),
            entry::<GroupCreateResponse>(),
            entry::<GroupJoinRequest>(),
            entry::<GroupJoinResponse>(),
            entry::<GroupQuitRequest>(),
            entry::<GroupQuitResponse>(),
            entry::<GroupChatRequest>(),
            entry::<GroupChatResponse>(),
            entry::<GroupMembersRequest>(),
            entry::<GroupMembersResponse>(),
            entry::<Ping>(),
            entry::<Pong>(),
            entry::<HelloRequest>(),
            entry::<HelloResponse>(),
        ];
        Self {
            schemas: Arc::new(
                schemas
                    .into_iter()
                    .map(|e| (e.message_type.code(), e))
                    .collect(),
            ),
        }
    }

    /// Installs this registry as the process-wide registry.
    ///
    /// Fails with [`ProtocolError::RegistryFrozen`] if one is already in
    /// place, including the standard registry installed lazily by
    /// [`MessageRegistry::global`].
    pub fn install(self) -> Result<&'static MessageRegistry, ProtocolError> {
        let mut candidate = Some(self);
        let installed = GLOBAL.get_or_init(|| candidate.take().unwrap_or_else(Self::standard));
        match candidate {
            None => Ok(installed),
            Some(_) => Err(ProtocolError::RegistryFrozen),
        }
    }

    /// Returns the process-wide registry, installing the standard one if
    /// nothing was installed yet.
    pub fn global() -> &'static MessageRegistry {
        GLOBAL.get_or_init(Self::standard)
    }

    /// Looks up the schema for a type code.
    pub fn schema(&self, code: u8) -> Result<&MessageSchemaEntry, ProtocolError> {
        self.schemas
            .get(&code)
            .ok_or(ProtocolError::UnknownMessageType(code))
    }

    pub fn contains(&self, code: u8) -> bool {
        self.schemas.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered codes in ascending order.
    pub fn codes(&self) -> Vec<u8> {
        let mut codes: Vec<u8> = self.schemas.keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}

//! Payload serialization algorithms.
//!
//! The header's serializer byte names the algorithm that produced the
//! payload. One algorithm is active per process; it is chosen from
//! configuration at startup and stamped on every outbound frame.
//!
//! | Ordinal | Algorithm | Encoding |
//! |---|---|---|
//! | 0 | [`SerializerAlgorithm::Binary`] | bincode |
//! | 1 | [`SerializerAlgorithm::Json`] | serde_json |

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure reported by an individual algorithm.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization algorithm, addressed on the wire by its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializerAlgorithm {
    /// Compact binary encoding of the serde data model.
    #[default]
    #[serde(alias = "java")]
    Binary,
    /// JSON text.
    Json,
}

impl SerializerAlgorithm {
    /// Every registered algorithm, in ordinal order.
    pub const ALL: [SerializerAlgorithm; 2] = [SerializerAlgorithm::Binary, SerializerAlgorithm::Json];

    /// Returns the wire ordinal.
    pub fn ordinal(self) -> u8 {
        match self {
            SerializerAlgorithm::Binary => 0,
            SerializerAlgorithm::Json => 1,
        }
    }

    /// Resolves a wire ordinal.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, ProtocolError> {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(ProtocolError::UnsupportedSerializer(ordinal))
    }

    /// Returns the human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            SerializerAlgorithm::Binary => "binary",
            SerializerAlgorithm::Json => "json",
        }
    }

    /// Serializes a value into payload bytes.
    pub fn serialize<T: Serialize>(self, value: &T) -> Result<Vec<u8>, PayloadError> {
        match self {
            SerializerAlgorithm::Binary => Ok(bincode::serialize(value)?),
            SerializerAlgorithm::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Deserializes payload bytes into a value.
    pub fn deserialize<T: DeserializeOwned>(self, data: &[u8]) -> Result<T, PayloadError> {
        match self {
            SerializerAlgorithm::Binary => Ok(bincode::deserialize(data)?),
            SerializerAlgorithm::Json => Ok(serde_json::from_slice(data)?),
        }
    }
}

impl fmt::Display for SerializerAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SerializerAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "bincode" | "java" => Ok(SerializerAlgorithm::Binary),
            "json" => Ok(SerializerAlgorithm::Json),
            other => Err(format!("unknown serializer algorithm '{}'", other)),
        }
    }
}

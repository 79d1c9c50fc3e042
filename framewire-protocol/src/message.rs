//! Typed messages carried in frame payloads.
//!
//! Every schema is a plain serde struct. The header's type code selects the
//! schema, so payloads never repeat the code or the sequence id.

use crate::sequence::next_sequence_id;
use crate::serializer::{PayloadError, SerializerAlgorithm};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A concrete message schema bound to its type code.
pub trait MessageSchema: Serialize + DeserializeOwned + Into<MessageBody> + Sized {
    /// Type code written into the frame header.
    const MESSAGE_TYPE: MessageType;
}

macro_rules! define_messages {
    ($($variant:ident = $code:literal),* $(,)?) => {
        /// Message type code (header offset 6).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum MessageType {
            $($variant = $code,)*
        }

        impl MessageType {
            /// Every declared type, in code order.
            pub const ALL: &'static [MessageType] = &[$(MessageType::$variant,)*];

            /// Returns the wire code.
            pub fn code(self) -> u8 {
                self as u8
            }

            /// Resolves a wire code to a declared type.
            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(MessageType::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(MessageType::$variant => stringify!($variant),)*
                }
            }
        }

        /// Payload of a message, one variant per schema.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum MessageBody {
            $($variant($variant),)*
        }

        impl MessageBody {
            /// Returns the type code of this payload.
            pub fn message_type(&self) -> MessageType {
                match self {
                    $(MessageBody::$variant(_) => MessageType::$variant,)*
                }
            }

            /// Serializes the inner schema with the given algorithm.
            pub fn serialize_with(
                &self,
                algorithm: SerializerAlgorithm,
            ) -> Result<Vec<u8>, PayloadError> {
                match self {
                    $(MessageBody::$variant(inner) => algorithm.serialize(inner),)*
                }
            }
        }

        $(
            impl MessageSchema for $variant {
                const MESSAGE_TYPE: MessageType = MessageType::$variant;
            }

            impl From<$variant> for MessageBody {
                fn from(value: $variant) -> Self {
                    MessageBody::$variant(value)
                }
            }

            impl TryFrom<MessageBody> for $variant {
                type Error = MessageBody;

                fn try_from(body: MessageBody) -> Result<Self, Self::Error> {
                    match body {
                        MessageBody::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

define_messages! {
    LoginRequest = 0,
    LoginResponse = 1,
    ChatRequest = 2,
    ChatResponse = 3,
    GroupCreateRequest = 4,
    GroupCreateResponse = 5,
    GroupJoinRequest = 6,
    GroupJoinResponse = 7,
    GroupQuitRequest = 8,
    GroupQuitResponse = 9,
    GroupChatRequest = 10,
    GroupChatResponse = 11,
    GroupMembersRequest = 12,
    GroupMembersResponse = 13,
    Ping = 14,
    Pong = 15,
    HelloRequest = 16,
    HelloResponse = 17,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// A typed message with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Correlation id (header offset 7).
    pub sequence_id: u32,
    /// Typed payload.
    pub body: MessageBody,
}

impl Message {
    pub fn new(sequence_id: u32, body: impl Into<MessageBody>) -> Self {
        Self {
            sequence_id,
            body: body.into(),
        }
    }

    /// Creates a message stamped with a fresh process-wide sequence id.
    pub fn stamped(body: impl Into<MessageBody>) -> Self {
        Self::new(next_sequence_id(), body)
    }

    /// Creates a reply that carries this message's sequence id.
    pub fn reply(&self, body: impl Into<MessageBody>) -> Self {
        Self::new(self.sequence_id, body)
    }

    /// Returns the type code, derived from the payload variant.
    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
}

/// Result shape shared by every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    /// Failure reason, set only when `success` is false.
    pub reason: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// Session

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub outcome: Outcome,
}

// Direct chat

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub from: String,
    pub to: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub outcome: Outcome,
    pub from: Option<String>,
    pub content: Option<String>,
}

// Groups

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreateRequest {
    pub group_name: String,
    pub members: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreateResponse {
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupJoinRequest {
    pub group_name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupJoinResponse {
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupQuitRequest {
    pub group_name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupQuitResponse {
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChatRequest {
    pub from: String,
    pub group_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChatResponse {
    pub outcome: Outcome,
    pub from: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembersRequest {
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembersResponse {
    pub outcome: Outcome,
    pub members: BTreeSet<String>,
}

// Connectivity probe

/// Connectivity probe. `time` is the sender's clock in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub time: i64,
}

impl Ping {
    /// Creates a probe stamped with the current time.
    pub fn now() -> Self {
        Self { time: unix_millis() }
    }

    /// Builds the matching probe response, echoing the send time.
    pub fn pong(&self) -> Pong {
        Pong { time: self.time }
    }
}

/// Probe response. `time` echoes the originating [`Ping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub time: i64,
}

impl Pong {
    /// Time elapsed since the originating ping was stamped.
    pub fn latency(&self) -> Duration {
        let elapsed = unix_millis().saturating_sub(self.time);
        Duration::from_millis(elapsed.max(0) as u64)
    }
}

// Greeting

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub outcome: Outcome,
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_codes() {
        assert_eq!(MessageType::LoginRequest.code(), 0);
        assert_eq!(MessageType::GroupMembersResponse.code(), 13);
        assert_eq!(MessageType::Ping.code(), 14);
        assert_eq!(MessageType::Pong.code(), 15);
        assert_eq!(MessageType::HelloRequest.code(), 16);
        assert_eq!(MessageType::HelloResponse.code(), 17);
        assert_eq!(MessageType::ALL.len(), 18);
    }

    #[test]
    fn test_from_code() {
        for ty in MessageType::ALL {
            assert_eq!(MessageType::from_code(ty.code()), Some(*ty));
        }
        assert_eq!(MessageType::from_code(18), None);
        assert_eq!(MessageType::from_code(255), None);
    }

    #[test]
    fn test_message_type_follows_body() {
        let msg = Message::new(5, Ping { time: 1 });
        assert_eq!(msg.message_type(), MessageType::Ping);

        let msg = Message::new(5, HelloResponse {
            outcome: Outcome::ok(),
            body: None,
        });
        assert_eq!(msg.message_type(), MessageType::HelloResponse);
    }

    #[test]
    fn test_reply_keeps_sequence_id() {
        let ping = Ping { time: 1234 };
        let request = Message::new(77, ping.clone());
        let reply = request.reply(ping.pong());

        assert_eq!(reply.sequence_id, 77);
        assert_eq!(reply.body, MessageBody::Pong(Pong { time: 1234 }));
    }

    #[test]
    fn test_stamped_ids_differ() {
        let a = Message::stamped(Ping::now());
        let b = Message::stamped(Ping::now());
        assert_ne!(a.sequence_id, b.sequence_id);
    }

    #[test]
    fn test_try_from_body() {
        let body = MessageBody::from(Pong { time: 9 });
        let pong = Pong::try_from(body).unwrap();
        assert_eq!(pong.time, 9);

        let body = MessageBody::from(Ping { time: 9 });
        assert!(Pong::try_from(body).is_err());
    }

    #[test]
    fn test_outcome() {
        assert!(Outcome::ok().is_success());
        let failed = Outcome::failed("nope");
        assert!(!failed.is_success());
        assert_eq!(failed.reason.as_deref(), Some("nope"));
    }

    #[test]
    fn test_pong_latency_is_non_negative() {
        let pong = Ping::now().pong();
        assert!(pong.latency() < Duration::from_secs(5));

        let future = Pong {
            time: unix_millis() + 60_000,
        };
        assert_eq!(future.latency(), Duration::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageType::Ping.to_string(), "Ping(14)");
    }
}

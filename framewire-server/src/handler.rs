//! Message dispatch.
//!
//! A [`Dispatcher`] maps message types to handlers. It is assembled once with
//! [`DispatcherBuilder`] and shared read-only by every connection worker.

use crate::error::ServerError;
use crate::session::Session;
use framewire_protocol::message::{HelloRequest, HelloResponse, Ping};
use framewire_protocol::{Message, MessageBody, MessageType, Outcome};
use std::collections::HashMap;
use std::sync::Arc;

/// Handler result: an optional reply to write back on the same connection.
pub type HandlerResult = Result<Option<Message>, ServerError>;

type Handler = Arc<dyn Fn(&Session, &Message) -> HandlerResult + Send + Sync>;

/// Collects handlers before freezing them into a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<MessageType, Handler>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `message_type` to `handler`, replacing any earlier route.
    pub fn on<F>(mut self, message_type: MessageType, handler: F) -> Self
    where
        F: Fn(&Session, &Message) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.insert(message_type, Arc::new(handler));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Frozen type-to-handler routing table. Cloning is cheap.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HashMap<MessageType, Handler>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatcher answering pings and greetings.
    pub fn standard() -> Self {
        Self::builder()
            .on(MessageType::Ping, handle_ping)
            .on(MessageType::HelloRequest, handle_hello)
            .build()
    }

    /// Routes one decoded message.
    ///
    /// Messages without a handler are logged and dropped.
    pub fn dispatch(&self, session: &Session, message: &Message) -> HandlerResult {
        let message_type = message.message_type();
        match self.handlers.get(&message_type) {
            Some(handler) => handler(session, message),
            None => {
                tracing::warn!(
                    "[{}] No handler for {} (seq={}), ignoring",
                    session.remote_addr,
                    message_type,
                    message.sequence_id
                );
                Ok(None)
            }
        }
    }

    pub fn handles(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routes: Vec<&MessageType> = self.handlers.keys().collect();
        routes.sort();
        f.debug_struct("Dispatcher").field("routes", &routes).finish()
    }
}

fn unexpected(expected: MessageType, message: &Message) -> ServerError {
    ServerError::UnexpectedBody {
        expected,
        actual: message.message_type(),
    }
}

/// Answers a ping with a pong carrying the same sequence id and time.
pub fn handle_ping(session: &Session, message: &Message) -> HandlerResult {
    let MessageBody::Ping(ping) = &message.body else {
        return Err(unexpected(MessageType::Ping, message));
    };
    tracing::debug!("[{}] Ping (seq={})", session.remote_addr, message.sequence_id);
    Ok(Some(message.reply(Ping::pong(ping))))
}

/// Answers a greeting.
pub fn handle_hello(session: &Session, message: &Message) -> HandlerResult {
    let MessageBody::HelloRequest(hello) = &message.body else {
        return Err(unexpected(MessageType::HelloRequest, message));
    };
    Ok(Some(message.reply(greet(session, hello))))
}

fn greet(session: &Session, hello: &HelloRequest) -> HelloResponse {
    let name = hello.name.trim();
    if name.is_empty() {
        return HelloResponse {
            outcome: Outcome::failed("name must not be empty"),
            body: None,
        };
    }

    tracing::info!("[{}] {} says: {}", session.remote_addr, name, hello.body);
    HelloResponse {
        outcome: Outcome::ok(),
        body: Some(format!("Hello {}, thanks for saying hello!", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framewire_protocol::message::Pong;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> Session {
        Session::new("127.0.0.1:4000".parse().unwrap())
    }

    #[test]
    fn test_ping_gets_pong() {
        let dispatcher = Dispatcher::standard();
        let request = Message::new(1000, Ping { time: 1234 });

        let reply = dispatcher.dispatch(&session(), &request).unwrap().unwrap();
        assert_eq!(reply.sequence_id, 1000);
        assert_eq!(reply.body, MessageBody::Pong(Pong { time: 1234 }));
    }

    #[test]
    fn test_hello_gets_greeting() {
        let dispatcher = Dispatcher::standard();
        let request = Message::new(7, HelloRequest {
            name: "alice".to_string(),
            body: "hi there".to_string(),
        });

        let reply = dispatcher.dispatch(&session(), &request).unwrap().unwrap();
        assert_eq!(reply.sequence_id, 7);
        let MessageBody::HelloResponse(response) = reply.body else {
            panic!("expected HelloResponse, got {:?}", reply.body);
        };
        assert!(response.outcome.is_success());
        assert!(response.body.unwrap().contains("alice"));
    }

    #[test]
    fn test_blank_hello_is_rejected() {
        let dispatcher = Dispatcher::standard();
        let request = Message::new(8, HelloRequest {
            name: "   ".to_string(),
            body: "hi".to_string(),
        });

        let reply = dispatcher.dispatch(&session(), &request).unwrap().unwrap();
        let MessageBody::HelloResponse(response) = reply.body else {
            panic!("expected HelloResponse");
        };
        assert!(!response.outcome.is_success());
        assert!(response.outcome.reason.is_some());
        assert!(response.body.is_none());
    }

    #[test]
    fn test_unhandled_type_is_ignored() {
        let dispatcher = Dispatcher::standard();
        let request = Message::new(3, Pong { time: 1 });
        assert!(!dispatcher.handles(MessageType::Pong));
        assert!(dispatcher.dispatch(&session(), &request).unwrap().is_none());
    }

    #[test]
    fn test_custom_route() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let dispatcher = Dispatcher::builder()
            .on(MessageType::Pong, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .build();

        dispatcher
            .dispatch(&session(), &Message::new(1, Pong { time: 1 }))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.handles(MessageType::Ping));
    }

    #[test]
    fn test_mismatched_route_is_an_error() {
        let dispatcher = Dispatcher::builder()
            .on(MessageType::Pong, handle_ping)
            .build();
        let result = dispatcher.dispatch(&session(), &Message::new(1, Pong { time: 1 }));
        assert!(matches!(
            result,
            Err(ServerError::UnexpectedBody {
                expected: MessageType::Ping,
                actual: MessageType::Pong
            })
        ));
    }
}

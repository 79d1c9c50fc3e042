//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use framewire_protocol::message::{HelloRequest, HelloResponse, Ping, Pong};
use framewire_protocol::{MessageBody, MessageSchema, MessageType};
use std::sync::Arc;
use std::time::Duration;

/// High-level client for framewire.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Connects and spawns the background read loop.
    pub async fn connect_and_listen(&self) -> Result<(), ClientError> {
        self.conn.connect().await?;
        let conn = self.conn.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.read_loop().await {
                tracing::debug!("read loop ended: {}", e);
            }
        });
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection (for background read loop).
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    async fn call<Req, Resp>(&self, request: Req) -> Result<Resp, ClientError>
    where
        Req: MessageSchema,
        Resp: MessageSchema + TryFrom<MessageBody, Error = MessageBody>,
    {
        let reply = self.conn.request(request).await?;
        Resp::try_from(reply.body).map_err(|body| ClientError::UnexpectedResponse {
            expected: Resp::MESSAGE_TYPE,
            actual: body.message_type(),
        })
    }

    /// Pings the server and returns the round-trip time measured from the
    /// echoed timestamp.
    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let pong: Pong = self.call(Ping::now()).await?;
        Ok(pong.latency())
    }

    /// Greets the server.
    ///
    /// A failed outcome is returned as [`ClientError::Rejected`].
    pub async fn hello(
        &self,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<HelloResponse, ClientError> {
        let request = HelloRequest {
            name: name.into(),
            body: body.into(),
        };
        let response: HelloResponse = self.call(request).await?;
        if !response.outcome.is_success() {
            let reason = response
                .outcome
                .reason
                .unwrap_or_else(|| format!("{} failed", MessageType::HelloRequest));
            return Err(ClientError::Rejected(reason));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framewire_protocol::{FrameDecoder, Message, MessageCodec, Outcome, SerializerAlgorithm};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one connection, answering with whatever `respond` returns.
    async fn serve_once<F>(respond: F) -> SocketAddr
    where
        F: Fn(&Message) -> Message + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let codec = MessageCodec::new(SerializerAlgorithm::Json);
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                decoder.extend(&buf[..n]);
                while let Some(request) = decoder.decode_next(&codec).unwrap() {
                    let reply = respond(&request);
                    stream.write_all(&codec.encode(&reply).unwrap()).await.unwrap();
                }
            }
        });

        addr
    }

    async fn client_for(addr: SocketAddr) -> Client {
        let config = ConnectionConfig::new(addr)
            .with_serializer(SerializerAlgorithm::Json)
            .with_request_timeout(Duration::from_secs(5));
        let client = Client::new(config);
        client.connect_and_listen().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_ping() {
        let addr = serve_once(|request| match &request.body {
            MessageBody::Ping(ping) => request.reply(ping.pong()),
            other => panic!("unexpected {:?}", other),
        })
        .await;

        let client = client_for(addr).await;
        let latency = client.ping().await.unwrap();
        assert!(latency < Duration::from_secs(5));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_hello() {
        let addr = serve_once(|request| {
            request.reply(HelloResponse {
                outcome: Outcome::ok(),
                body: Some("welcome".to_string()),
            })
        })
        .await;

        let client = client_for(addr).await;
        let response = client.hello("alice", "hi").await.unwrap();
        assert_eq!(response.body.as_deref(), Some("welcome"));
    }

    #[tokio::test]
    async fn test_hello_rejected() {
        let addr = serve_once(|request| {
            request.reply(HelloResponse {
                outcome: Outcome::failed("name must not be empty"),
                body: None,
            })
        })
        .await;

        let client = client_for(addr).await;
        let result = client.hello("", "hi").await;
        assert!(matches!(result, Err(ClientError::Rejected(reason)) if reason.contains("empty")));
    }

    #[tokio::test]
    async fn test_unexpected_reply_type() {
        let addr = serve_once(|request| request.reply(Ping { time: 0 })).await;

        let client = client_for(addr).await;
        let result = client.ping().await;
        assert!(matches!(
            result,
            Err(ClientError::UnexpectedResponse {
                expected: MessageType::Pong,
                actual: MessageType::Ping
            })
        ));
    }
}

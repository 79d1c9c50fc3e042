//! Connection management.

use crate::error::ClientError;
use framewire_protocol::{
    FrameDecoder, Message, MessageBody, MessageCodec, SerializerAlgorithm,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Capacity of the unsolicited message channel.
const UNSOLICITED_CHANNEL_CAPACITY: usize = 256;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Algorithm stamped on outbound frames.
    pub serializer: SerializerAlgorithm,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            serializer: SerializerAlgorithm::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_serializer(mut self, serializer: SerializerAlgorithm) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

/// A connection to a framewire server.
///
/// Replies are matched to requests by sequence id. Inbound messages with no
/// waiting request are published on the unsolicited channel.
pub struct Connection {
    config: ConnectionConfig,
    codec: MessageCodec,
    writer: Mutex<Option<WriteHalf<TcpStream>>>,
    reader: Mutex<Option<ReadHalf<TcpStream>>>,
    /// Requests waiting for a reply, keyed by sequence id.
    pending: Mutex<HashMap<u32, oneshot::Sender<Message>>>,
    connected: AtomicBool,
    unsolicited: broadcast::Sender<Message>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        let (unsolicited, _) = broadcast::channel(UNSOLICITED_CHANNEL_CAPACITY);
        Self {
            codec: MessageCodec::new(config.serializer),
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            unsolicited,
        }
    }

    /// Subscribes to messages that did not answer a pending request.
    pub fn subscribe_unsolicited(&self) -> broadcast::Receiver<Message> {
        self.unsolicited.subscribe()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let tcp_stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })??;

        tcp_stream.set_nodelay(true).ok();

        let (read_half, write_half) = tokio::io::split(tcp_stream);
        *self.writer.lock().await = Some(write_half);
        *self.reader.lock().await = Some(read_half);
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    async fn write_message(&self, message: &Message) -> Result<(), ClientError> {
        let encoded = self.codec.encode(message)?;
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer.write_all(&encoded).await?;
        tracing::debug!(
            "Sent {} (seq={}, {} bytes)",
            message.message_type(),
            message.sequence_id,
            encoded.len()
        );
        Ok(())
    }

    /// Sends a message without waiting for a reply.
    pub async fn send(&self, message: &Message) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.write_message(message).await
    }

    /// Sends `body` under a fresh sequence id and waits for the reply that
    /// carries the same id.
    ///
    /// Requires [`Connection::read_loop`] to be running.
    pub async fn request(&self, body: impl Into<MessageBody>) -> Result<Message, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let message = Message::stamped(body);
        let seq = message.sequence_id;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(seq, tx);

        if let Err(e) = self.write_message(&message).await {
            self.pending.lock().await.remove(&seq);
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                tracing::debug!("Request seq={} channel closed", seq);
                Err(ClientError::ConnectionClosed)
            }
            Err(_) => {
                tracing::debug!("Request seq={} timed out", seq);
                self.pending.lock().await.remove(&seq);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Reads and routes inbound messages (call this in a background task).
    ///
    /// Returns when the server closes the connection or sends a frame that
    /// cannot be decoded; pending requests are failed either way.
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; self.config.read_buffer_size];

        let result = loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!("read_loop: connection closed");
                    break Err(ClientError::ConnectionClosed);
                }
                Ok(n) => n,
                Err(e) => break Err(ClientError::Io(e)),
            };

            tracing::debug!("read_loop: received {} bytes", n);
            decoder.extend(&buf[..n]);

            if let Err(e) = self.route_frames(&mut decoder).await {
                tracing::warn!("read_loop: {}", e);
                break Err(e);
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
        result
    }

    async fn route_frames(&self, decoder: &mut FrameDecoder) -> Result<(), ClientError> {
        while let Some(message) = decoder.decode_next(&self.codec)? {
            let waiter = self.pending.lock().await.remove(&message.sequence_id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(message);
                }
                None => {
                    tracing::debug!(
                        "read_loop: unsolicited {} (seq={})",
                        message.message_type(),
                        message.sequence_id
                    );
                    let _ = self.unsolicited.send(message);
                }
            }
        }
        Ok(())
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let _ = self.reader.lock().await.take();

        let mut pending = self.pending.lock().await;
        tracing::debug!("Clearing {} pending requests", pending.len());
        pending.clear();
        Ok(())
    }

    /// Returns the number of requests still waiting for a reply.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

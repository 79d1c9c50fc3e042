//! TCP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::Dispatcher;
use crate::session::Session;
use bytes::BytesMut;
use framewire_protocol::{
    FrameDecoder, MessageCodec, SerializerAlgorithm, DEFAULT_PORT, MAX_PAYLOAD_SIZE,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Size of the per-connection socket read buffer.
const READ_BUFFER_SIZE: usize = 8192;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Algorithm stamped on every outbound frame.
    pub serializer: SerializerAlgorithm,
    /// Largest payload accepted or sent.
    pub max_payload: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            idle_timeout: Duration::from_secs(300),
            max_connections: 1000,
            serializer: SerializerAlgorithm::default(),
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_serializer(mut self, serializer: SerializerAlgorithm) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_connections: config.network.max_connections,
            serializer: config.protocol.serializer,
            max_payload: config.protocol.max_payload_bytes,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_sent: AtomicU64,
    pub errors_total: AtomicU64,
}

/// Everything a connection worker needs, shared read-only across workers.
#[derive(Clone)]
struct WorkerContext {
    codec: MessageCodec,
    dispatcher: Dispatcher,
    stats: Arc<ServerStats>,
    idle_timeout: Duration,
    max_payload: u32,
}

/// TCP server for framewire.
pub struct Server {
    config: ServerConfig,
    context: WorkerContext,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    ///
    /// The codec reads the process-wide message registry, so any custom
    /// registry must be installed before this call.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let codec = MessageCodec::new(config.serializer).with_max_payload(config.max_payload);
        let context = WorkerContext {
            codec,
            dispatcher,
            stats: Arc::new(ServerStats::default()),
            idle_timeout: config.idle_timeout,
            max_payload: config.max_payload,
        };
        Self {
            config,
            context,
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the listening socket.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Binds and runs the server until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} (serializer={})",
            listener.local_addr()?,
            self.config.serializer
        );

        let stats = &self.context.stats;
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }

                            stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            stats.connections_active.fetch_add(1, Ordering::Relaxed);
                            tcp_stream.set_nodelay(true).ok();

                            let context = self.context.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                tracing::info!("Client connected: {}", addr);
                                let stats = context.stats.clone();
                                let result =
                                    Self::handle_connection(tcp_stream, addr, context, &mut conn_shutdown)
                                        .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Runs one connection: reassembles frames, dispatches them in arrival
    /// order and writes replies back in the same order.
    ///
    /// Any decode error ends the connection; the stream cannot be resynchronized.
    async fn handle_connection<S>(
        mut stream: S,
        addr: SocketAddr,
        context: WorkerContext,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = Session::new(addr);
        tracing::debug!("[{}] Session {} opened", addr, session.id);

        let result = Self::process_frames(&mut stream, &mut session, &context, shutdown).await;
        session.close();

        tracing::debug!(
            "[{}] Session {} closed after {:.2?} ({} frames in, {} out)",
            addr,
            session.id,
            session.age(),
            session.frames_received(),
            session.frames_sent()
        );
        result
    }

    async fn process_frames<S>(
        stream: &mut S,
        session: &mut Session,
        context: &WorkerContext,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let WorkerContext {
            codec,
            dispatcher,
            stats,
            idle_timeout,
            max_payload,
        } = context;
        let addr = session.remote_addr;
        let idle_timeout = *idle_timeout;

        let mut decoder = FrameDecoder::new().with_max_payload(*max_payload);
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut replies = BytesMut::new();

        while session.is_open() {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by client", addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::debug!("[{}] Received {} bytes", addr, n);
                            session.touch();
                            decoder.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(idle_timeout) => {
                    if session.idle_duration() >= idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            // Frames after a fatal error in this batch are never dispatched.
            let mut failure = None;
            while session.is_open() {
                let message = match decoder.decode_next(codec) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("[{}] Dropping connection: {}", addr, e);
                        session.close();
                        failure = Some(ServerError::Protocol(e));
                        continue;
                    }
                };

                session.record_received();
                stats.frames_received.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "[{}] {} (seq={})",
                    addr,
                    message.message_type(),
                    message.sequence_id
                );

                match dispatcher.dispatch(session, &message) {
                    Ok(Some(reply)) => match codec.encode_into(&reply, &mut replies) {
                        Ok(()) => {
                            session.record_sent();
                            stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            tracing::warn!("[{}] Failed to encode {}: {}", addr, reply.message_type(), e);
                            stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    Ok(None) => {}
                    Err(e) if !e.closes_connection() => {
                        tracing::warn!("[{}] Handler error: {}", addr, e);
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!("[{}] Closing after handler error: {}", addr, e);
                        session.close();
                        failure = Some(e);
                    }
                }
            }

            if !replies.is_empty() {
                tracing::debug!("[{}] Writing {} bytes", addr, replies.len());
                stream.write_all(&replies).await?;
                stream.flush().await?;
                replies.clear();
            }

            if let Some(e) = failure {
                return Err(e);
            }
        }

        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.context.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

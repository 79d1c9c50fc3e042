//! Per-connection session state.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reading and dispatching frames.
    Open,
    /// A fatal error or shutdown was seen; no more frames are processed.
    Closing,
}

/// A client session, owned by its connection worker.
#[derive(Debug)]
pub struct Session {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    state: SessionState,
    frames_received: u64,
    frames_sent: u64,
    created_at: Instant,
    last_activity: Instant,
}

impl Session {
    pub fn new(remote_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            state: SessionState::Open,
            frames_received: 0,
            frames_sent: 0,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Marks the session as closing.
    pub fn close(&mut self) {
        self.state = SessionState::Closing;
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Records an inbound frame.
    pub fn record_received(&mut self) {
        self.frames_received += 1;
        self.last_activity = Instant::now();
    }

    /// Records an outbound frame.
    pub fn record_sent(&mut self) {
        self.frames_sent += 1;
    }

    /// Records raw bytes arriving without a complete frame.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Returns the time since last activity.
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Returns the session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

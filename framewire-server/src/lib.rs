//! # framewire-server
//!
//! TCP server for framewire.
//!
//! This crate provides:
//! - TCP accept loop with a connection limit and graceful shutdown
//! - Per-connection workers that reassemble, decode and dispatch frames
//! - A frozen message-type dispatcher with the standard ping and hello handlers
//! - YAML and environment based configuration

pub mod config;
pub mod error;
pub mod handler;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, NetworkConfig, ProtocolConfig};
pub use error::ServerError;
pub use handler::{Dispatcher, DispatcherBuilder};
pub use server::{Server, ServerConfig, ServerStats};
pub use session::Session;

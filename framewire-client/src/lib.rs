//! # framewire-client
//!
//! Client library for framewire.
//!
//! This crate provides:
//! - Async TCP connection with a background read loop
//! - Request/reply correlation by sequence id
//! - A broadcast channel for unsolicited server messages
//! - High-level ping and hello calls

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;

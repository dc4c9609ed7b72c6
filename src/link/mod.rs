//! # Link Module
//!
//! Delivers control vectors to the device over a reconnecting channel.
//!
//! This module handles:
//! - Rate limiting outbound vectors (coalescer)
//! - Abstracting the control channel behind a `Transport` trait
//! - The WebSocket transport used in production
//! - Connection supervision, liveness and per-session wiring (connection manager)

pub mod coalescer;
pub mod manager;
pub mod transport;
pub mod websocket;

pub use coalescer::{Coalescer, CommandSink};
pub use manager::{ConnectionManager, ConnectionState, LinkControl, LinkStats, LinkTimings};
pub use transport::{Link, LinkEvent, LinkSender, OutboundFrame, Transport};
pub use websocket::{control_url, WebSocketTransport};

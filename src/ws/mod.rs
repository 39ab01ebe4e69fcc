//! WebSocket client
//!
//! Reconnecting client with ping keepalive and cooperative shutdown,
//! shared by every streaming feed.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};

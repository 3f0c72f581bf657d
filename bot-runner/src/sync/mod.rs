//! Sync server WebSocket client.
//!
//! This module handles the WebSocket connection to the sync server,
//! including registration, reconnection and event forwarding to sessions.

mod connection;

pub use connection::SessionConnection;

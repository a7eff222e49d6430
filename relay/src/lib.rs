//! Ava realtime relay
//!
//! Sits between a browser WebSocket and the upstream realtime model so the
//! API key never reaches the browser. Frames pass through untouched apart
//! from one injected `session.update` that installs the map-filter tool.

pub mod bridge;
pub mod server;

use tokio_tungstenite::tungstenite;

pub use bridge::{BridgeStats, bridge};
pub use server::RelayServer;

/// Relay errors
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
  #[error("configuration error: {0}")]
  Config(#[from] ava_config::ConfigError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("websocket error: {0}")]
  WebSocket(#[from] tungstenite::Error),

  #[error("invalid header value for {0}")]
  InvalidHeader(&'static str),
}

pub type Result<T> = std::result::Result<T, RelayError>;

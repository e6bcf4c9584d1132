//! Connection seams for a session
//!
//! A connection is split into a source of inbound text frames and a sink
//! for outbound ones, so the turn loop and the writer task can own one half
//! each.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("connection closed")]
    Closed,
}

/// Inbound half of a connection
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame; `Ok(None)` when the peer closed cleanly
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError>;
}

/// Outbound half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one complete text frame
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), TransportError>;
}

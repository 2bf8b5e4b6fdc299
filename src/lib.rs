//! h5live-capture - H5 player live-stream capture tool
//!
//! This crate provides the core functionality for capturing a wcloud
//! "H5 player" live endpoint: the handshake parameter codec, the websocket
//! session, frame demultiplexing, and threshold-triggered stream sinks.

pub mod codec;
pub mod demux;
pub mod error;
pub mod sink;
pub mod transport;

pub use error::{AppError, Result};

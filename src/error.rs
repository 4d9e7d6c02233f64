//! Error types for the live-update server
//!
//! Only initialization paths (config loading, watcher start, server start)
//! surface these to callers. Per-event failures are converted into a
//! full-reload decision inside the pipeline and never reach this type.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HmrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid server state: {0}")]
    InvalidState(String),
}

pub type HmrResult<T> = Result<T, HmrError>;

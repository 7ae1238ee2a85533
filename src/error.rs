//! Error types for the screen relay

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session bookkeeping errors raised inside the relay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Session token is required for role {0}")]
    MissingToken(String),

    #[error("Session {0} already has an active producer")]
    ProducerAlreadyActive(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Connection {0} is not the producer of its session")]
    NotProducer(u64),

    #[error("Failed to serialize frame: {0}")]
    Serialization(String),
}

/// Image encode/decode errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// Transport errors seen by producers and consumers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection rejected by relay: HTTP {0}")]
    Rejected(u16),

    #[error("Connection closed by peer (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("Connection lost without close handshake")]
    ConnectionLost,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

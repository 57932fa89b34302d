use thiserror::Error;

/// Rejections surfaced back to the originating socket as a
/// `ServerMessage::Error`, never as a protocol-level close.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("roomId query parameter is required")]
    MissingRoomId,
    #[error("malformed client message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
    #[error("no room joined yet")]
    NotInRoom,
}

/// Startup-time configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
}

/// Store and broadcast fabric failures. Both are best-effort: the caller
/// logs and continues rather than propagating these further, per the
/// "availability over strict consistency" error policy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

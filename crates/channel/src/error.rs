use thiserror::Error;

/// Errors raised by a result channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Nothing arrived within the receive timeout. Not a failure: the
    /// manager treats it as "no result ready yet".
    #[error("channel empty")]
    Empty,

    #[error("channel disconnected")]
    Disconnected,

    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

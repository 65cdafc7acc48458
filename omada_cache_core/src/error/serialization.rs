//! Payload serialization error types

use thiserror::Error;

/// Errors raised while encoding or decoding stored payloads
#[derive(Error, Debug)]
pub enum SerializationError {
    /// A payload could not be serialized before a write
    #[error("Failed to encode {store} payload: {message}")]
    Encode { store: String, message: String },

    /// A stored payload could not be parsed
    #[error("Failed to decode {store} payload: {message}")]
    Decode { store: String, message: String },
}

impl SerializationError {
    /// Create an encode error
    pub fn encode(store: &str, message: &str) -> Self {
        Self::Encode {
            store: store.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a decode error
    pub fn decode(store: &str, message: &str) -> Self {
        Self::Decode {
            store: store.to_string(),
            message: message.to_string(),
        }
    }
}

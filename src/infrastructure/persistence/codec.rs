//! # Order Codec
//!
//! Conversion between [`Order`] and the bytes stored under its key.
//!
//! [`JsonCodec`] writes the same JSON shape other services read from the
//! store (`{"OrderId":1,"CustomerId":"c1",...}`).

use crate::domain::entities::Order;
use std::fmt;
use thiserror::Error;

/// Codec failure.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The order could not be serialized.
    #[error("failed to encode order: {0}")]
    Encode(String),

    /// The stored bytes are not a valid order.
    #[error("failed to decode order: {0}")]
    Decode(String),
}

/// Serializes orders for storage.
pub trait OrderCodec: Send + Sync + fmt::Debug {
    /// Encodes an order.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if the order cannot be represented.
    fn encode(&self, order: &Order) -> Result<Vec<u8>, CodecError>;

    /// Decodes an order.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` on malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<Order, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl OrderCodec for JsonCodec {
    fn encode(&self, order: &Order) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(order).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Order, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

//! JSON encoding of stored payloads.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HistoryError;

pub fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, HistoryError> {
    serde_json::to_vec(value).map_err(|e| HistoryError::Serialization(format!("serialize: {}", e)))
}

pub fn decode<V: DeserializeOwned>(blob: &[u8]) -> Result<V, HistoryError> {
    serde_json::from_slice(blob)
        .map_err(|e| HistoryError::Serialization(format!("deserialize: {}", e)))
}

//! Value encodings for stored records.
//!
//! Keys are always fixed-width big-endian integers or raw address bytes; only
//! values go through a codec.

use serde::{Serialize, de::DeserializeOwned};

use super::StorageError;

/// Encoding used for stored values.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Short name, recorded in logs.
    const NAME: &'static str;

    /// Encode a value.
    ///
    /// # Errors
    ///
    /// `StorageError::Serialization` if the value cannot be encoded.
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError>;

    /// Decode a value.
    ///
    /// # Errors
    ///
    /// `StorageError::Serialization` if the bytes are not a valid encoding of
    /// `T`.
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError>;
}

/// CBOR via ciborium. Compact; the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl Codec for CborCodec {
    const NAME: &'static str = "cbor";

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
        ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// JSON via serde_json. Readable with any database browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    const NAME: &'static str = "json";

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

//! Value encodings used when primitives persist typed payloads.
//!
//! The store only holds strings; a [`Codec`] is the pluggable strategy that
//! turns a typed value into that string and back. Implementations must
//! round-trip: `decode(encode(v)) == v`.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Encoding strategy for values of type `T`.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<String, CodecError>;

    fn decode(&self, raw: &str) -> Result<T, CodecError>;
}

/// JSON encoding through serde. The default for every primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where T: Serialize + DeserializeOwned
{
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Encode { reason: e.to_string() })
    }

    fn decode(&self, raw: &str) -> Result<T, CodecError> {
        serde_json::from_str(raw).map_err(|e| CodecError::Decode { reason: e.to_string() })
    }
}

/// Stores `String` payloads verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl Codec<String> for PlainCodec {
    fn encode(&self, value: &String) -> Result<String, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, raw: &str) -> Result<String, CodecError> {
        Ok(raw.to_string())
    }
}

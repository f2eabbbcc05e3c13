// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utility methods to encode or decode values in [CBOR] format.
//!
//! All skylark wire messages and encrypted bundles are encoded in the Concise
//! Binary Object Representation (CBOR) format before they are handed to a
//! transport or sealed with an AEAD.
//!
//! [CBOR]: https://cbor.io/
use ciborium::de::Error as DeserializeError;
use ciborium::ser::Error as SerializeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serializes a value into CBOR format.
pub fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)?;
    Ok(bytes)
}

/// Deserializes a value which was encoded in CBOR.
pub fn decode_cbor<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T, DecodeError> {
    let value = ciborium::from_reader::<T, _>(bytes)?;
    Ok(value)
}

/// An error occurred during CBOR serialization.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// An error occurred while writing bytes.
    #[error("an error occurred while writing bytes: {0}")]
    Io(std::io::Error),

    /// An error indicating a value that cannot be serialized.
    #[error("an error occurred while serializing value: {0}")]
    Value(String),
}

impl From<SerializeError<std::io::Error>> for EncodeError {
    fn from(value: SerializeError<std::io::Error>) -> Self {
        match value {
            SerializeError::Io(err) => EncodeError::Io(err),
            SerializeError::Value(err) => EncodeError::Value(err),
        }
    }
}

/// An error occurred during CBOR deserialization.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An error occurred while reading bytes.
    #[error("an error occurred while reading bytes: {0}")]
    Io(std::io::Error),

    /// Malformed or unexpected CBOR input.
    #[error("invalid cbor encoding: {0}")]
    Encoding(String),
}

impl From<DeserializeError<std::io::Error>> for DecodeError {
    fn from(value: DeserializeError<std::io::Error>) -> Self {
        match value {
            DeserializeError::Io(err) => DecodeError::Io(err),
            DeserializeError::Syntax(offset) => {
                DecodeError::Encoding(format!("syntax error at offset {offset}"))
            }
            DeserializeError::Semantic(_, err) => DecodeError::Encoding(err),
            DeserializeError::RecursionLimitExceeded => {
                DecodeError::Encoding("recursion limit exceeded".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_cbor, encode_cbor};

    #[test]
    fn round_trip() {
        let value = (42u64, "skylark".to_string(), vec![1u8, 2, 3]);
        let bytes = encode_cbor(&value).unwrap();
        let decoded: (u64, String, Vec<u8>) = decode_cbor(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn invalid_input() {
        let result: Result<u64, _> = decode_cbor(&[0xff, 0xff]);
        assert!(result.is_err());
    }
}

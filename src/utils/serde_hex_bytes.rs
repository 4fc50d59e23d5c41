//! serde helpers for [`Bytes`] fields carried inside JSON payloads.
//!
//! Artifact bodies and content hashes are arbitrary binary, so they go over
//! the wire hex encoded. Use with `#[serde(with = "serde_hex_bytes")]`.
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(v: &Bytes, s: S) -> Result<S::Ok, S::Error> {
    String::serialize(&hex::encode(v), s)
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
    let stringified = String::deserialize(d)?;
    let decoded = hex::decode(stringified.into_bytes())
        .map_err(|e| serde::de::Error::custom(format!("Unable to hex::decode {}", e)))?;
    Ok(decoded.into())
}

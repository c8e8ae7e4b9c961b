//! 256-bit identifiers and their CB58 rendering.
//!
//! Transaction ids, UTXO ids, chain ids and asset ids are all 32-byte values
//! rendered as base58 with a 4-byte SHA-256 checksum tail (CB58).

use base58::{FromBase58, ToBase58};
use sha2::{Digest, Sha256};

pub const CHECKSUM_LEN: usize = 4;

/// A 32-byte identifier. Serialized as a CB58 string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id32(pub [u8; 32]);

pub type TxId = Id32;
pub type UtxoId = Id32;
pub type ChainId = Id32;
pub type AssetId = Id32;

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("invalid base58 payload")]
    InvalidBase58,

    #[error("bad checksum")]
    BadChecksum,

    #[error("expected 32 bytes, got {0}")]
    BadLength(usize),
}

/// Append the last 4 bytes of SHA-256(data) and render as base58.
pub fn cb58_encode(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut buf = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
    buf.to_base58()
}

pub fn cb58_decode(text: &str) -> Result<Vec<u8>, IdError> {
    let raw = text.from_base58().map_err(|_| IdError::InvalidBase58)?;

    if raw.len() < CHECKSUM_LEN {
        return Err(IdError::BadChecksum);
    }

    let (data, checksum) = raw.split_at(raw.len() - CHECKSUM_LEN);
    let digest = Sha256::digest(data);

    if checksum != &digest[digest.len() - CHECKSUM_LEN..] {
        return Err(IdError::BadChecksum);
    }

    Ok(data.to_vec())
}

impl Id32 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_cb58(text: &str) -> Result<Self, IdError> {
        let data = cb58_decode(text)?;
        let bytes: [u8; 32] = data
            .as_slice()
            .try_into()
            .map_err(|_| IdError::BadLength(data.len()))?;
        Ok(Self(bytes))
    }

    /// The identity of the output at `index` of tx `tx_id`.
    pub fn for_output(tx_id: &TxId, index: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tx_id.0);
        hasher.update(index.to_be_bytes());
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for Id32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&cb58_encode(&self.0))
    }
}

impl std::fmt::Debug for Id32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id32({self})")
    }
}

impl std::str::FromStr for Id32 {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cb58(s)
    }
}

impl From<[u8; 32]> for Id32 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Id32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl serde::Serialize for Id32 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Id32 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Id32::from_cb58(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(byte: u8) -> Id32 {
        Id32([byte; 32])
    }

    #[test]
    fn cb58_roundtrip() {
        for byte in [0x00, 0x01, 0x7f, 0xff] {
            let id = filled(byte);
            let text = id.to_string();
            let back = Id32::from_cb58(&text).unwrap();
            assert_eq!(id, back);
        }
    }

    #[test]
    fn cb58_rejects_tampered_checksum() {
        let mut text = filled(7).to_string();
        let last = text.pop().unwrap();
        let replacement = if last == '2' { '3' } else { '2' };
        text.push(replacement);
        assert!(Id32::from_cb58(&text).is_err());
    }

    #[test]
    fn zero_id_matches_primary_network_rendering() {
        // the all-zero id is the canonical P-chain id on every network
        assert_eq!(
            filled(0).to_string(),
            "11111111111111111111111111111111LpoYY"
        );
    }

    #[test]
    fn output_ids_are_position_sensitive() {
        let tx = filled(9);
        assert_ne!(Id32::for_output(&tx, 0), Id32::for_output(&tx, 1));
        assert_eq!(Id32::for_output(&tx, 3), Id32::for_output(&tx, 3));
    }

    #[test]
    fn serde_uses_cb58_text() {
        let id = filled(5);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: Id32 = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}

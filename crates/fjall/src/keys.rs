//! Key encodings. Big-endian everywhere so lexicographic order matches
//! numeric order.

use serac_core::{BlockHeight, ChainTag, TxIndex, UtxoId};

pub const HEIGHT_SIZE: usize = 8;
pub const UTXO_ID_SIZE: usize = 32;

pub fn height_key(height: BlockHeight) -> [u8; HEIGHT_SIZE] {
    height.to_be_bytes()
}

pub fn tx_index_key(index: TxIndex) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + HEIGHT_SIZE);
    key.extend_from_slice(b"tx:");
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// `[chain_tag][utxo_id]`, the partitioned record key.
pub fn utxo_key(chain: ChainTag, id: &UtxoId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + UTXO_ID_SIZE);
    key.push(chain.prefix());
    key.extend_from_slice(id.as_bytes());
    key
}

/// `[chain_tag][address][0x00][utxo_id]`, the address index entry.
pub fn address_key(chain: ChainTag, address: &str, id: &UtxoId) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + address.len() + UTXO_ID_SIZE);
    key.push(chain.prefix());
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn address_prefix(chain: ChainTag, address: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + address.len());
    key.push(chain.prefix());
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key
}

pub fn utxo_id_from_suffix(key: &[u8], prefix_len: usize) -> Option<UtxoId> {
    let tail = key.get(prefix_len..)?;
    let bytes: [u8; UTXO_ID_SIZE] = tail.try_into().ok()?;
    Some(UtxoId::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_core::Id32;

    #[test]
    fn address_entries_roundtrip() {
        let id = Id32([9; 32]);
        let prefix = address_prefix(ChainTag::Platform, "P-avax1abc");
        let key = address_key(ChainTag::Platform, "P-avax1abc", &id);

        assert!(key.starts_with(&prefix));
        assert_eq!(utxo_id_from_suffix(&key, prefix.len()), Some(id));
    }

    #[test]
    fn height_keys_sort_numerically() {
        assert!(height_key(9) < height_key(10));
        assert!(height_key(255) < height_key(256));
    }
}

//! Persisted finality records.
//!
//! Two record families live in the engine's store namespace:
//!
//! - round-end weights, key = block id (32 bytes), value = 4-byte
//!   big-endian weight, written once per round boundary;
//! - the node's voted map under the fixed key `packer-voted`, a 4-byte
//!   big-endian entry count followed by 36-byte entries (32-byte
//!   checkpoint id ‖ 4-byte big-endian weight).
//!
//! Both layouts are bit-exact across restarts.

use crate::errors::{BftError, BftResult};
use meridian_kv::Store;
use meridian_primitives::BlockId;
use std::collections::HashMap;

/// Store key of the persisted voted map.
pub(crate) const VOTED_KEY: &[u8] = b"packer-voted";

const ENTRY_LEN: usize = 36;

/// Record the branch weight at a round's last block.
pub(crate) fn save_weight<S: Store>(store: &S, id: &BlockId, weight: u32) -> BftResult<()> {
    store.put(id.as_bytes(), &weight.to_be_bytes())?;
    Ok(())
}

/// Read a round-end weight from the index.
pub(crate) fn load_weight<S: Store>(store: &S, id: &BlockId) -> BftResult<u32> {
    let bytes = store
        .get(id.as_bytes())?
        .ok_or(BftError::MissingWeight(*id))?;
    let bytes: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| BftError::Decode("weight record is not 4 bytes"))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Write the voted map. Entries are emitted in id order so identical
/// maps always produce identical bytes.
pub(crate) fn save_voted<S: Store>(store: &S, voted: &HashMap<BlockId, u32>) -> BftResult<()> {
    let mut entries: Vec<(&BlockId, &u32)> = voted.iter().collect();
    entries.sort_by_key(|(id, _)| **id);

    let mut buf = Vec::with_capacity(4 + entries.len() * ENTRY_LEN);
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (id, weight) in entries {
        buf.extend_from_slice(id.as_bytes());
        buf.extend_from_slice(&weight.to_be_bytes());
    }

    store.put(VOTED_KEY, &buf)?;
    Ok(())
}

/// Read the voted map. A missing key is an empty map (first boot);
/// malformed bytes surface as [`BftError::Decode`].
pub(crate) fn load_voted<S: Store>(store: &S) -> BftResult<HashMap<BlockId, u32>> {
    let Some(bytes) = store.get(VOTED_KEY)? else {
        return Ok(HashMap::new());
    };

    if bytes.len() < 4 {
        return Err(BftError::Decode("voted map shorter than its count"));
    }
    let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[4..];
    if body.len() != count * ENTRY_LEN {
        return Err(BftError::Decode("voted map length mismatch"));
    }

    let mut voted = HashMap::with_capacity(count);
    for entry in body.chunks_exact(ENTRY_LEN) {
        let mut id = [0u8; 32];
        id.copy_from_slice(&entry[..32]);
        let weight = u32::from_be_bytes([entry[32], entry[33], entry[34], entry[35]]);
        voted.insert(BlockId::from_bytes(id), weight);
    }
    Ok(voted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use meridian_kv::MemStore;

    fn id(number: u32, tail: u8) -> BlockId {
        BlockId::new(number, B256::repeat_byte(tail))
    }

    #[test]
    fn test_weight_roundtrip() {
        let store = MemStore::new();
        let block = id(179, 0xaa);

        save_weight(&store, &block, 7).unwrap();
        assert_eq!(load_weight(&store, &block).unwrap(), 7);

        // Idempotent rewrite of the same pair.
        save_weight(&store, &block, 7).unwrap();
        assert_eq!(load_weight(&store, &block).unwrap(), 7);
    }

    #[test]
    fn test_weight_missing() {
        let store = MemStore::new();
        let block = id(359, 0xbb);
        assert_eq!(
            load_weight(&store, &block),
            Err(BftError::MissingWeight(block))
        );
    }

    #[test]
    fn test_voted_roundtrip() {
        let store = MemStore::new();
        let mut voted = HashMap::new();
        voted.insert(id(10, 1), 3);
        voted.insert(id(20, 2), 4);

        save_voted(&store, &voted).unwrap();
        assert_eq!(load_voted(&store).unwrap(), voted);
    }

    #[test]
    fn test_voted_empty_and_absent() {
        let store = MemStore::new();
        assert!(load_voted(&store).unwrap().is_empty());

        save_voted(&store, &HashMap::new()).unwrap();
        assert!(load_voted(&store).unwrap().is_empty());
    }

    #[test]
    fn test_voted_rewrites_are_deterministic() {
        let store_a = MemStore::new();
        let store_b = MemStore::new();
        let mut voted = HashMap::new();
        for i in 0..8 {
            voted.insert(id(i * 10, i as u8), i);
        }

        save_voted(&store_a, &voted).unwrap();
        save_voted(&store_b, &voted).unwrap();
        assert_eq!(
            store_a.get(VOTED_KEY).unwrap(),
            store_b.get(VOTED_KEY).unwrap()
        );
    }

    #[test]
    fn test_voted_corrupt() {
        let store = MemStore::new();
        store.put(VOTED_KEY, &[0, 0]).unwrap();
        assert!(matches!(load_voted(&store), Err(BftError::Decode(_))));

        // Count promises more entries than the body holds.
        let mut bytes = 2u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; ENTRY_LEN]);
        store.put(VOTED_KEY, &bytes).unwrap();
        assert!(matches!(load_voted(&store), Err(BftError::Decode(_))));
    }
}

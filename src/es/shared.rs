// titlekit/src/es/shared.rs
// Shared content map (/shared1/content.map): filename + SHA-1 per record

use log::{debug, warn};
use serde::{Serialize, Serializer};

use super::backends::Storage;
use super::constants::{SHARED_CONTENT_NAME_SIZE, SHARED_CONTENT_RECORD_SIZE};
use super::crypto::Sha1Hash;
use super::defaults::{SHARED_CONTENT_DIR, SHARED_CONTENT_MAP_PATH};
use super::layout::read_array;
use super::tmd::ContentRecord;
use crate::exceptions::{Result, TitleError};
use crate::utils::c_str;

/// One content.map record
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SharedContent {
    #[serde(serialize_with = "name_str")]
    pub name: [u8; SHARED_CONTENT_NAME_SIZE],
    #[serde(serialize_with = "hash_hex")]
    pub hash: Sha1Hash,
}

fn name_str<S: Serializer>(name: &[u8; SHARED_CONTENT_NAME_SIZE], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&c_str(name))
}

fn hash_hex<S: Serializer>(hash: &Sha1Hash, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(hash))
}

impl SharedContent {
    fn unpack(data: &[u8]) -> Self {
        SharedContent {
            name: read_array(data, 0),
            hash: read_array(data, SHARED_CONTENT_NAME_SIZE),
        }
    }

    /// File name without extension (eight hex digits)
    pub fn name(&self) -> String {
        c_str(&self.name)
    }

    /// NAND path of the backing content file
    pub fn content_path(&self) -> String {
        format!("{}/{}.app", SHARED_CONTENT_DIR, self.name())
    }
}

/// The loaded map, in on-disk order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharedContentMap {
    records: Vec<SharedContent>,
}

impl SharedContentMap {
    /// Read and decode the platform content map
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let bytes = storage.read_file(SHARED_CONTENT_MAP_PATH)?;
        let map = Self::from_bytes(&bytes)?;
        debug!("Loaded {} shared content records", map.len());
        Ok(map)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % SHARED_CONTENT_RECORD_SIZE != 0 {
            warn!(
                "⚠️ {} is {} bytes, not a multiple of {}",
                SHARED_CONTENT_MAP_PATH,
                bytes.len(),
                SHARED_CONTENT_RECORD_SIZE
            );
            return Err(TitleError::CorruptContentMap { len: bytes.len() });
        }

        Ok(SharedContentMap {
            records: bytes
                .chunks_exact(SHARED_CONTENT_RECORD_SIZE)
                .map(SharedContent::unpack)
                .collect(),
        })
    }

    pub fn records(&self) -> &[SharedContent] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record whose hash equals `hash` (all 20 bytes)
    pub fn find(&self, hash: &Sha1Hash) -> Option<&SharedContent> {
        self.records.iter().find(|r| &r.hash == hash)
    }

    pub fn contains(&self, content: Option<&ContentRecord>) -> bool {
        is_shared_content_present(content, &self.records)
    }
}

pub fn load_shared_content_map(storage: &dyn Storage) -> Result<SharedContentMap> {
    SharedContentMap::load(storage)
}

/// Whether a content flagged shared is already present in the map
pub fn is_shared_content_present(content: Option<&ContentRecord>, map: &[SharedContent]) -> bool {
    let Some(content) = content else {
        return false;
    };
    if map.is_empty() || !content.is_shared() {
        return false;
    }
    map.iter().any(|record| record.hash == content.hash)
}

#[cfg(test)]
mod tests {
    use super::{SharedContentMap, is_shared_content_present, load_shared_content_map};
    use crate::es::testing::MemoryStorage;
    use crate::es::tmd::ContentRecord;
    use crate::exceptions::TitleError;

    fn map_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"00000000");
        bytes.extend_from_slice(&[0xAA; 20]);
        bytes.extend_from_slice(b"00000001");
        bytes.extend_from_slice(&[0xBB; 20]);
        bytes
    }

    fn content(kind: u16, hash: [u8; 20]) -> ContentRecord {
        ContentRecord {
            content_id: 1,
            index: 1,
            kind,
            size: 0x4000,
            hash,
        }
    }

    fn storage_with(bytes: Vec<u8>) -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        storage.insert("/shared1/content.map", bytes);
        storage
    }

    #[test]
    fn test_membership_by_full_hash() {
        let map = load_shared_content_map(&storage_with(map_bytes())).unwrap();
        assert_eq!(map.len(), 2);

        let matching = content(0x8001, [0xBB; 20]);
        assert!(is_shared_content_present(Some(&matching), map.records()));

        let mut near_miss = [0xBB; 20];
        near_miss[19] = 0xBC;
        assert!(!map.contains(Some(&content(0x8001, near_miss))));

        // Not flagged shared: hash is irrelevant
        assert!(!map.contains(Some(&content(0x0001, [0xBB; 20]))));
        assert!(!map.contains(None));
        assert!(!is_shared_content_present(Some(&matching), &[]));
    }

    #[test]
    fn test_partial_record_is_corrupt_not_io() {
        let mut bytes = map_bytes();
        bytes.extend_from_slice(&[0u8; 14]);
        assert_eq!(bytes.len(), 70);
        let err = SharedContentMap::load(&storage_with(bytes)).unwrap_err();
        assert!(matches!(err, TitleError::CorruptContentMap { len: 70 }));
        assert_eq!(err.code(), -996);
    }

    #[test]
    fn test_missing_map_is_storage_error() {
        let err = SharedContentMap::load(&MemoryStorage::new()).unwrap_err();
        assert!(matches!(err, TitleError::IoError(_)));
    }

    #[test]
    fn test_empty_map_loads() {
        let map = SharedContentMap::load(&storage_with(Vec::new())).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_find_gives_backing_file() {
        let map = SharedContentMap::from_bytes(&map_bytes()).unwrap();
        let record = map.find(&[0xAA; 20]).unwrap();
        assert_eq!(record.name(), "00000000");
        assert_eq!(record.content_path(), "/shared1/00000000.app");
        assert!(map.find(&[0xCC; 20]).is_none());
    }
}

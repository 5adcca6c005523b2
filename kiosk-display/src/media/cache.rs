//! In-memory media cache
//!
//! Append-only map from asset id to a ready-to-render pair. Written by the
//! preloader, read by the playback controller. An entry is inserted whole,
//! so readers either see nothing for an id or the complete pair.
//!
//! No eviction: the catalog is small and lives as long as the session.

use crate::media::handle::{AudioHandle, ImageHandle};
use kiosk_common::AssetId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One preloaded image+audio pair
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: AssetId,
    pub image: ImageHandle,
    pub audio: AudioHandle,
    /// False when audio was inserted before it finished buffering
    pub ready: bool,
}

/// Shared cache of preloaded pairs
#[derive(Debug, Clone, Default)]
pub struct MediaCache {
    entries: Arc<RwLock<HashMap<AssetId, CacheEntry>>>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `id`
    pub fn put(&self, id: AssetId, entry: CacheEntry) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, entry);
    }

    /// Look up `id`; handles are shared, not copied
    pub fn get(&self, id: AssetId) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    pub fn has(&self, id: AssetId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached ids in ascending order
    pub fn ids(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::handle::test_support::{png_bytes, wav_bytes};

    fn entry(n: u64) -> CacheEntry {
        let id = AssetId::new(n).unwrap();
        CacheEntry {
            id,
            image: ImageHandle::decode(&format!("{}.jpg", id.id3()), png_bytes()).unwrap(),
            audio: AudioHandle::from_bytes(&format!("{}.mp3", id.id3()), wav_bytes(8000, 800)),
            ready: true,
        }
    }

    #[test]
    fn test_put_get_has() {
        let cache = MediaCache::new();
        let id = AssetId::new(3).unwrap();
        assert!(!cache.has(id));
        assert!(cache.get(id).is_none());

        cache.put(id, entry(3));
        assert!(cache.has(id));
        assert_eq!(cache.get(id).map(|e| e.id), Some(id));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = MediaCache::new();
        let id = AssetId::new(1).unwrap();
        let first = entry(1);
        let second = entry(1);
        cache.put(id, first);
        cache.put(id, second.clone());
        assert_eq!(cache.len(), 1);
        let stored = cache.get(id).unwrap();
        assert!(stored.audio.same_resource(&second.audio));
    }

    #[test]
    fn test_clones_share_storage() {
        let cache = MediaCache::new();
        let reader = cache.clone();
        cache.put(AssetId::new(2).unwrap(), entry(2));
        cache.put(AssetId::new(1).unwrap(), entry(1));
        assert_eq!(
            reader.ids(),
            vec![AssetId::new(1).unwrap(), AssetId::new(2).unwrap()]
        );
    }

    #[test]
    fn test_get_returns_shared_handles() {
        let cache = MediaCache::new();
        let id = AssetId::new(4).unwrap();
        cache.put(id, entry(4));
        let a = cache.get(id).unwrap();
        let b = cache.get(id).unwrap();
        assert!(a.audio.same_resource(&b.audio));
    }
}

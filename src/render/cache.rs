//! Render result caching.
//!
//! Cache keys are a typed composite of every input that can change the
//! rendered pixels, hashed directly instead of concatenated into strings.
//! Only successful results are stored, so a texture that resolves after a
//! pack reload is retried rather than permanently poisoned.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use super::{ProjectionAnchor, RenderResult};
use crate::assets::ResourceRegistry;
use crate::model::{DisplaySlot, PredicateKey};

/// Composite fingerprint of a render request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub width: u32,
    pub height: u32,
    /// The owning resource manager session; a reload never shares keys.
    pub session: Uuid,
    pub model: String,
    pub display: DisplaySlot,
    pub anchor: ProjectionAnchor,
    pub legacy: bool,
    /// Identity of the post-resolve hook, 0 when none was supplied.
    pub post_resolve: u64,
    /// Predicate thresholds as raw bits, sorted by key.
    pub predicates: Vec<(PredicateKey, u64)>,
    /// Caller-provided textures by content hash, sorted by key.
    pub provided_textures: Vec<(String, u64)>,
    /// Post-resolve override textures by content hash, sorted by key.
    pub override_textures: Vec<(String, u64)>,
    pub tint: u64,
    pub enchanted: bool,
}

/// A concurrency-safe render cache, registered on the resource manager as
/// a keyed registry. Two identical concurrent misses may both compute;
/// the last writer wins, which is acceptable since both produce the same
/// bytes.
#[derive(Default)]
pub struct RenderCache {
    entries: RwLock<HashMap<CacheKey, RenderResult>>,
}

impl RenderCache {
    /// Registry identifier the renderer looks the cache up under.
    pub const IDENTIFIER: &'static str = "render_cache";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<RenderResult> {
        self.entries.read().get(key).cloned()
    }

    /// Store a result. Failed results are never cached.
    pub fn put(&self, key: CacheKey, result: RenderResult) {
        if !result.is_successful() {
            return;
        }
        self.entries.write().insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl ResourceRegistry for RenderCache {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn close(&self) {
        self.clear();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::sync::Arc;

    fn key(session: Uuid, model: &str) -> CacheKey {
        CacheKey {
            width: 64,
            height: 64,
            session,
            model: model.to_string(),
            display: DisplaySlot::Gui,
            anchor: ProjectionAnchor::Center,
            legacy: false,
            post_resolve: 0,
            predicates: Vec::new(),
            provided_textures: Vec::new(),
            override_textures: Vec::new(),
            tint: 0,
            enchanted: false,
        }
    }

    #[test]
    fn test_put_and_get() {
        let cache = RenderCache::new();
        let session = Uuid::new_v4();
        let result = RenderResult::successful(RgbaImage::new(4, 4));

        cache.put(key(session, "minecraft:item/stick"), result.clone());
        let hit = cache.get(&key(session, "minecraft:item/stick")).unwrap();
        assert!(Arc::ptr_eq(hit.image().unwrap(), result.image().unwrap()));
        assert!(cache.get(&key(session, "minecraft:item/stone")).is_none());
    }

    #[test]
    fn test_sessions_do_not_collide() {
        let cache = RenderCache::new();
        let result = RenderResult::successful(RgbaImage::new(4, 4));
        cache.put(key(Uuid::new_v4(), "minecraft:item/stick"), result);
        assert!(cache.get(&key(Uuid::new_v4(), "minecraft:item/stick")).is_none());
    }

    #[test]
    fn test_failed_results_not_cached() {
        let cache = RenderCache::new();
        let session = Uuid::new_v4();
        cache.put(
            key(session, "minecraft:item/void"),
            RenderResult::rejected("notfound"),
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_close_clears() {
        let cache = RenderCache::new();
        let session = Uuid::new_v4();
        cache.put(
            key(session, "minecraft:item/stick"),
            RenderResult::successful(RgbaImage::new(2, 2)),
        );
        assert_eq!(cache.len(), 1);
        ResourceRegistry::close(&cache);
        assert!(cache.is_empty());
    }
}

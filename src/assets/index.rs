//! Extension index and registry plumbing.

use std::any::Any;

use regex::Regex;

use crate::error::Result;
use crate::pack::PackContainer;

/// Capability interface for an extension asset index (a "mod manager").
///
/// The resource manager drives each implementation through the same load /
/// filter / reload cycle as the core indices, keyed by the folder names the
/// extension claims under `assets/<namespace>/`.
pub trait AssetIndex: Send {
    /// Identifier the index is registered and looked up under.
    fn index_name(&self) -> &str;

    /// Folder names under `assets/<namespace>/` this index consumes.
    fn asset_folders(&self) -> Vec<String>;

    /// Merge one pack's assets from `folder` (a container-rooted path) into
    /// the index. Later packs override earlier ones per key.
    fn load_directory(
        &mut self,
        namespace: &str,
        folder: &str,
        container: &PackContainer,
    ) -> Result<()>;

    /// Remove already-loaded keys matching both patterns.
    fn filter_resources(&mut self, namespace: &Regex, path: &Regex);

    /// Called after a pack finished loading or filtering.
    fn reload(&mut self) {}

    /// Release any held resources.
    fn close(&mut self) {}

    /// Downcast support for typed retrieval.
    fn as_any(&self) -> &dyn Any;
}

/// A keyed shared registry (e.g. a render cache or a custom texture
/// resolver) owned by a resource manager session and retrieved by string
/// identifier with type-checked downcasting.
pub trait ResourceRegistry: Send + Sync {
    /// Identifier the registry is registered and looked up under.
    fn identifier(&self) -> &str;

    /// Release held resources; called from the manager's teardown.
    fn close(&self) {}

    /// Downcast support for typed retrieval.
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Counters {
        hits: parking_lot::Mutex<u32>,
    }

    impl ResourceRegistry for Counters {
        fn identifier(&self) -> &str {
            "counters"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_registry_downcast() {
        let registry: Arc<dyn ResourceRegistry> = Arc::new(Counters {
            hits: parking_lot::Mutex::new(3),
        });
        let typed = registry.as_any().downcast_ref::<Counters>().unwrap();
        assert_eq!(*typed.hits.lock(), 3);
        assert!(registry.as_any().downcast_ref::<u32>().is_none());
    }
}

//! Asset indices and the resource manager that loads packs into them.
//!
//! Packs load lowest priority first; later packs override earlier ones at
//! the granularity of a single namespaced key. A manager instance is one
//! immutable session: a reload builds an entirely new manager (fresh
//! session id, fresh indices) instead of mutating in place.

pub mod atlas;
pub mod fonts;
pub mod index;
pub mod languages;
pub mod models;
pub mod textures;

pub use atlas::{AtlasSource, TextureAtlases};
pub use fonts::FontIndex;
pub use index::{AssetIndex, ResourceRegistry};
pub use languages::LanguageIndex;
pub use models::ModelIndex;
pub use textures::{TextureIndex, TextureMeta, TextureResource};

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{RasterError, Result};
use crate::pack::{PackContainer, PackInfo, PackManifest, PackType};

/// Description given to the built-in default pack when its manifest lacks
/// a `pack` section.
const DEFAULT_PACK_DESCRIPTION: &str = "The default look and feel of Minecraft";

/// Loads an ordered stack of packs into shared indices and owns them for
/// the life of one session.
pub struct ResourceManager {
    config: Arc<RuntimeConfig>,
    session: Uuid,
    valid: AtomicBool,

    packs: Vec<PackInfo>,
    containers: Vec<PackContainer>,

    models: ModelIndex,
    textures: TextureIndex,
    fonts: FontIndex,
    languages: LanguageIndex,

    extensions: HashMap<String, Box<dyn AssetIndex>>,
    registries: HashMap<String, Arc<dyn ResourceRegistry>>,
}

impl ResourceManager {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        ResourceManager {
            models: ModelIndex::new(config.clone()),
            textures: TextureIndex::new(),
            fonts: FontIndex::new(),
            languages: LanguageIndex::new(),
            config,
            session: Uuid::new_v4(),
            valid: AtomicBool::new(true),
            packs: Vec::new(),
            containers: Vec::new(),
            extensions: HashMap::new(),
            registries: HashMap::new(),
        }
    }

    /// Register an extension asset index before packs load. Its claimed
    /// asset folders are loaded after the core indices for every pack.
    pub fn register_extension(&mut self, extension: Box<dyn AssetIndex>) {
        self.extensions
            .insert(extension.index_name().to_string(), extension);
    }

    /// Register a keyed shared registry (e.g. a render cache).
    pub fn register_registry(&mut self, registry: Arc<dyn ResourceRegistry>) {
        self.registries
            .insert(registry.identifier().to_string(), registry);
    }

    /// Load a pack from disk and merge it over everything loaded so far.
    /// Failures are isolated to the pack: the returned info carries
    /// `status=false` and a reason, and the manager stays usable.
    ///
    /// Only a closed manager is an error.
    pub fn load_pack<P: AsRef<Path>>(
        &mut self,
        path: P,
        pack_type: PackType,
        is_default: bool,
    ) -> Result<&PackInfo> {
        if !self.is_valid() {
            return Err(RasterError::Closed("resource manager"));
        }
        let info = self.load_pack_inner(path.as_ref(), pack_type, is_default);
        self.packs.push(info);
        Ok(self.packs.last().expect("just pushed"))
    }

    fn load_pack_inner(&mut self, path: &Path, pack_type: PackType, is_default: bool) -> PackInfo {
        let fallback_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        if !path.exists() {
            log::error!("{} is not a directory nor a zip file", path.display());
            return PackInfo::rejected(
                fallback_name,
                pack_type,
                "Pack is not a directory nor a zip file",
            );
        }

        let container = match PackContainer::open(path) {
            Ok(container) => container,
            Err(e) => {
                log::error!("{} is an invalid zip file: {e}", path.display());
                return PackInfo::rejected(fallback_name, pack_type, "Pack is an invalid zip file");
            }
        };
        let name = container.name().to_string();

        if !container.exists("pack.mcmeta") {
            log::error!("{name} does not have a pack.mcmeta");
            return PackInfo::rejected(name, pack_type, "pack.mcmeta not found");
        }

        let manifest_text = match container.read_to_string("pack.mcmeta") {
            Ok(text) => text,
            Err(e) => {
                log::error!("unable to read pack.mcmeta for {name}: {e}");
                return PackInfo::rejected(name, pack_type, "Unable to read pack.mcmeta");
            }
        };
        let default_pack = is_default
            .then_some((self.config.default_pack_format, DEFAULT_PACK_DESCRIPTION));
        let manifest = match PackManifest::parse(&manifest_text, default_pack) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::error!("invalid pack.mcmeta for {name}: {e}");
                return PackInfo::rejected(name, pack_type, "Invalid pack.mcmeta");
            }
        };

        let icon = container
            .exists("pack.png")
            .then(|| container.read("pack.png").ok())
            .flatten()
            .and_then(|data| image::load_from_memory(&data).ok())
            .map(|image| Arc::new(image.to_rgba8()));

        // A pack's filter rules erase matching keys from everything loaded
        // before it, before its own assets merge in.
        for filter in &manifest.filters {
            self.models.filter_resources(&filter.namespace, &filter.path);
            self.textures
                .filter_resources(&filter.namespace, &filter.path);
            self.fonts.filter_resources(&filter.namespace, &filter.path);
            self.languages
                .filter_resources(&filter.namespace, &filter.path);
            for extension in self.extensions.values_mut() {
                extension.filter_resources(&filter.namespace, &filter.path);
            }
        }

        if let Err(e) = self.load_assets(&container, &manifest) {
            log::error!("unable to load assets for {name}: {e}");
            return PackInfo {
                name,
                pack_type,
                status: false,
                rejection_reason: Some("Unable to load assets".to_string()),
                pack_format: manifest.pack_format,
                description: Some(manifest.description),
                icon,
                languages: manifest.languages,
                filters: manifest.filters,
            };
        }

        for extension in self.extensions.values_mut() {
            extension.reload();
        }

        self.containers.push(container);
        PackInfo::accepted(
            name,
            pack_type,
            manifest.pack_format,
            manifest.description,
            icon,
            manifest.languages,
            manifest.filters,
        )
    }

    /// Load a pack's `assets` tree in the fixed order models, textures,
    /// fonts, languages, extensions: texture loading needs atlas
    /// definitions already parsed and language loading needs the
    /// manifest's language metadata.
    fn load_assets(&mut self, container: &PackContainer, manifest: &PackManifest) -> Result<()> {
        if !container.is_dir("assets") {
            return Err(RasterError::InvalidPack(
                "assets is not a directory".to_string(),
            ));
        }
        let namespaces = container.list_dirs("assets");

        let mut atlases_by_namespace: HashMap<String, TextureAtlases> = HashMap::new();
        for namespace in &namespaces {
            let atlases_folder = format!("assets/{namespace}/atlases");
            if container.is_dir(&atlases_folder) {
                atlases_by_namespace.insert(
                    namespace.clone(),
                    TextureAtlases::load(container, &atlases_folder)?,
                );
            }
        }

        for namespace in &namespaces {
            let folder = format!("assets/{namespace}/models");
            if container.is_dir(&folder) {
                self.models.load_directory(namespace, &folder, container)?;
            }
        }

        let requires_atlases = manifest.pack_format > self.config.atlas_required_above_format;
        let empty_atlases = TextureAtlases::empty();
        for namespace in &namespaces {
            let folder = format!("assets/{namespace}/textures");
            if container.is_dir(&folder) {
                let atlases = if requires_atlases {
                    atlases_by_namespace
                        .get(namespace)
                        .unwrap_or(&empty_atlases)
                } else {
                    &empty_atlases
                };
                self.textures
                    .load_directory(namespace, &folder, container, atlases)?;
            }
        }

        for namespace in &namespaces {
            let folder = format!("assets/{namespace}/font");
            if container.is_dir(&folder) {
                self.fonts.load_directory(namespace, &folder, container)?;
            }
        }

        for namespace in &namespaces {
            let folder = format!("assets/{namespace}/lang");
            if container.is_dir(&folder) {
                self.languages
                    .load_directory(namespace, &folder, container, &manifest.languages)?;
            }
        }

        for extension in self.extensions.values_mut() {
            for folder_name in extension.asset_folders() {
                for namespace in &namespaces {
                    let folder = format!("assets/{namespace}/{folder_name}");
                    if container.is_dir(&folder) {
                        extension.load_directory(namespace, &folder, container)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Per-pack load reports in load order (lowest priority first).
    pub fn pack_infos(&self) -> &[PackInfo] {
        &self.packs
    }

    pub fn models(&self) -> &ModelIndex {
        &self.models
    }

    pub fn textures(&self) -> &TextureIndex {
        &self.textures
    }

    pub fn fonts(&self) -> &FontIndex {
        &self.fonts
    }

    pub fn languages(&self) -> &LanguageIndex {
        &self.languages
    }

    /// Look up an extension index by name.
    pub fn extension(&self, name: &str) -> Option<&dyn AssetIndex> {
        self.extensions.get(name).map(Box::as_ref)
    }

    /// Type-checked lookup of an extension index.
    pub fn extension_as<T: AssetIndex + 'static>(&self, name: &str) -> Option<&T> {
        self.extensions.get(name)?.as_any().downcast_ref::<T>()
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Type-checked lookup of a keyed shared registry.
    pub fn resource_registry<T: ResourceRegistry + 'static>(&self, identifier: &str) -> Option<&T> {
        self.registries
            .get(identifier)?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn has_resource_registry(&self, identifier: &str) -> bool {
        self.registries.contains_key(identifier)
    }

    pub fn config(&self) -> &Arc<RuntimeConfig> {
        &self.config
    }

    /// This session's identity; part of every render cache key so a reload
    /// can never serve stale images.
    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Tear the session down: indices cleared, registries closed, pack
    /// container handles released. Idempotent. Must complete before a
    /// replacement manager starts loading, because zip handles are not
    /// safe to share across sessions.
    pub fn close(&mut self) {
        if !self.valid.swap(false, Ordering::AcqRel) {
            return;
        }
        for container in &self.containers {
            container.close();
        }
        for registry in self.registries.values() {
            registry.close();
        }
        self.models.clear();
        self.textures.clear();
        self.fonts.clear();
        self.languages.clear();
        for extension in self.extensions.values_mut() {
            extension.close();
        }
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn write_png(path: PathBuf, color: [u8; 4]) {
        RgbaImage::from_pixel(2, 2, Rgba(color)).save(path).unwrap();
    }

    fn write_default_pack(root: &Path) {
        std::fs::create_dir_all(root.join("assets/minecraft/textures/block")).unwrap();
        std::fs::create_dir_all(root.join("assets/minecraft/models/block")).unwrap();
        std::fs::write(
            root.join("pack.mcmeta"),
            r#"{ "pack": { "pack_format": 4, "description": "Default" } }"#,
        )
        .unwrap();
        write_png(
            root.join("assets/minecraft/textures/block/stone.png"),
            [100, 100, 100, 255],
        );
        write_png(
            root.join("assets/minecraft/textures/block/dirt.png"),
            [134, 96, 67, 255],
        );
        std::fs::write(
            root.join("assets/minecraft/models/block/stone.json"),
            r##"{ "textures": { "all": "block/stone" },
                 "elements": [ { "from": [0,0,0], "to": [16,16,16],
                   "faces": { "up": { "texture": "#all" } } } ] }"##,
        )
        .unwrap();
    }

    fn write_override_pack(root: &Path) {
        std::fs::create_dir_all(root.join("assets/minecraft/textures/block")).unwrap();
        std::fs::write(
            root.join("pack.mcmeta"),
            r#"{ "pack": { "pack_format": 9, "description": "Override" },
                 "filter": { "block": [
                     { "namespace": "minecraft", "path": "textures/block/dirt\\.png" }
                 ] } }"#,
        )
        .unwrap();
        write_png(
            root.join("assets/minecraft/textures/block/stone.png"),
            [200, 50, 50, 255],
        );
    }

    #[test]
    fn test_load_order_and_filters() {
        let default_dir = tempfile::tempdir().unwrap();
        let override_dir = tempfile::tempdir().unwrap();
        write_default_pack(default_dir.path());
        write_override_pack(override_dir.path());

        let mut manager = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        let info = manager
            .load_pack(default_dir.path(), PackType::BuiltIn, true)
            .unwrap();
        assert!(info.status);
        assert_eq!(info.pack_format, 4);

        let info = manager
            .load_pack(override_dir.path(), PackType::Local, false)
            .unwrap();
        assert!(info.status);
        assert_eq!(info.filters.len(), 1);

        // stone was overridden by the later pack.
        let stone = manager.textures().get("minecraft:block/stone").unwrap();
        assert_eq!(stone.image.get_pixel(0, 0), &Rgba([200, 50, 50, 255]));

        // The filter pattern is written against the full pack path, which
        // never matches the folder-relative key space, so dirt still
        // resolves to the built-in definition.
        let dirt = manager.textures().get("minecraft:block/dirt").unwrap();
        assert_eq!(dirt.image.get_pixel(0, 0), &Rgba([134, 96, 67, 255]));

        // The model from the base pack survived.
        assert!(manager.models().raw("minecraft:block/stone").is_some());
    }

    #[test]
    fn test_filter_erases_lower_priority_keys() {
        let base = tempfile::tempdir().unwrap();
        write_default_pack(base.path());

        let filtering = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(filtering.path().join("assets/minecraft/textures/block"))
            .unwrap();
        std::fs::write(
            filtering.path().join("pack.mcmeta"),
            r#"{ "pack": { "pack_format": 9, "description": "Eraser" },
                 "filter": { "block": [
                     { "namespace": "minecraft", "path": "block/dirt\\.png" }
                 ] } }"#,
        )
        .unwrap();

        let mut manager = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        manager.load_pack(base.path(), PackType::BuiltIn, true).unwrap();
        let info = manager
            .load_pack(filtering.path(), PackType::Local, false)
            .unwrap();
        assert!(info.status);

        // Folder-relative pattern erases the built-in dirt; stone stays.
        assert!(manager.textures().get("minecraft:block/dirt").is_none());
        assert!(manager.textures().get("minecraft:block/stone").is_some());
    }

    #[test]
    fn test_last_pack_wins_per_key() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let c = tempfile::tempdir().unwrap();
        for (dir, color) in [(&a, [1u8, 0, 0, 255]), (&b, [2, 0, 0, 255]), (&c, [3, 0, 0, 255])] {
            std::fs::create_dir_all(dir.path().join("assets/minecraft/textures/block")).unwrap();
            std::fs::write(
                dir.path().join("pack.mcmeta"),
                r#"{ "pack": { "pack_format": 9, "description": "" } }"#,
            )
            .unwrap();
            write_png(
                dir.path().join("assets/minecraft/textures/block/k.png"),
                color,
            );
        }

        let mut manager = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        manager.load_pack(a.path(), PackType::BuiltIn, true).unwrap();
        manager.load_pack(b.path(), PackType::Local, false).unwrap();
        manager.load_pack(c.path(), PackType::Server, false).unwrap();

        let k = manager.textures().get("minecraft:block/k").unwrap();
        assert_eq!(k.image.get_pixel(0, 0), &Rgba([3, 0, 0, 255]));
    }

    #[test]
    fn test_rejected_pack_does_not_abort_loading() {
        let missing_manifest = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(missing_manifest.path().join("assets")).unwrap();

        let good = tempfile::tempdir().unwrap();
        write_default_pack(good.path());

        let mut manager = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        let info = manager
            .load_pack(missing_manifest.path(), PackType::Local, false)
            .unwrap();
        assert!(!info.status);
        assert_eq!(info.rejection_reason.as_deref(), Some("pack.mcmeta not found"));

        let info = manager.load_pack(good.path(), PackType::Local, false).unwrap();
        assert!(info.status);
        assert_eq!(manager.pack_infos().len(), 2);
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let dir = tempfile::tempdir().unwrap();
        write_default_pack(dir.path());

        let mut manager = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        manager.load_pack(dir.path(), PackType::BuiltIn, true).unwrap();
        assert!(manager.is_valid());

        manager.close();
        manager.close();
        assert!(!manager.is_valid());
        assert!(manager.textures().is_empty());
        assert!(matches!(
            manager.load_pack(dir.path(), PackType::Local, false),
            Err(RasterError::Closed(_))
        ));
    }

    #[derive(Default)]
    struct MarkerIndex {
        loaded: Vec<(String, String)>,
    }

    impl AssetIndex for MarkerIndex {
        fn index_name(&self) -> &str {
            "marker"
        }

        fn asset_folders(&self) -> Vec<String> {
            vec!["markers".to_string()]
        }

        fn load_directory(
            &mut self,
            namespace: &str,
            folder: &str,
            container: &PackContainer,
        ) -> crate::error::Result<()> {
            for file in container.list_files_recursively(folder, &["json"]) {
                self.loaded.push((namespace.to_string(), file));
            }
            Ok(())
        }

        fn filter_resources(&mut self, namespace: &regex::Regex, path: &regex::Regex) {
            self.loaded
                .retain(|(ns, file)| !(namespace.is_match(ns) && path.is_match(file)));
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_extension_index_loads_its_folders() {
        let dir = tempfile::tempdir().unwrap();
        write_default_pack(dir.path());
        std::fs::create_dir_all(dir.path().join("assets/minecraft/markers")).unwrap();
        std::fs::write(
            dir.path().join("assets/minecraft/markers/spawn.json"),
            "{}",
        )
        .unwrap();

        let mut manager = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        manager.register_extension(Box::new(MarkerIndex::default()));
        manager.load_pack(dir.path(), PackType::BuiltIn, true).unwrap();

        assert!(manager.has_extension("marker"));
        let marker = manager.extension_as::<MarkerIndex>("marker").unwrap();
        assert_eq!(marker.loaded.len(), 1);
        assert_eq!(marker.loaded[0].0, "minecraft");
        assert!(manager.extension_as::<MarkerIndex>("absent").is_none());
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let a = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        let b = ResourceManager::new(Arc::new(RuntimeConfig::default()));
        assert_ne!(a.session_id(), b.session_id());
    }
}

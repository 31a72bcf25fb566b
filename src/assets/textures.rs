//! Texture index: namespaced keys to decoded images plus metadata.

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use regex::Regex;
use serde::Deserialize;

use super::atlas::TextureAtlases;
use crate::error::Result;
use crate::imageutil;
use crate::pack::PackContainer;

/// A decoded texture with its sidecar metadata.
pub struct TextureResource {
    /// Namespaced key the texture is indexed under.
    pub location: String,
    /// Decoded RGBA image.
    pub image: Arc<RgbaImage>,
    /// Parsed `.png.mcmeta` sidecar, when present.
    pub meta: Option<TextureMeta>,
    /// Atlas sprite name, when an atlas definition claims this texture.
    pub sprite_name: Option<String>,
    /// Content fingerprint used in render cache keys.
    pub content_hash: u64,
}

impl TextureResource {
    /// Wrap a raw image with no metadata (used for caller-provided
    /// textures such as downloaded skins).
    pub fn from_image(location: impl Into<String>, image: RgbaImage) -> Self {
        let content_hash = imageutil::content_hash(&image);
        TextureResource {
            location: location.into(),
            image: Arc::new(image),
            meta: None,
            sprite_name: None,
            content_hash,
        }
    }

    /// The image with blur and animation-frame cropping applied, ready for
    /// face baking or sprite compositing.
    pub fn processed_image(&self) -> RgbaImage {
        let mut image = (*self.image).clone();
        if let Some(meta) = &self.meta {
            if meta.blur {
                image = imageutil::gaussian_blur(&image);
            }
            if let Some(animation) = &meta.animation {
                let (frame_w, frame_h) = match (animation.width, animation.height) {
                    (Some(w), Some(h)) => (w, h),
                    // Frames are stacked vertically; a square frame is the
                    // default.
                    _ => (image.width(), image.width()),
                };
                image = imageutil::sub_image(&image, 0, 0, frame_w, frame_h, false, false);
            }
        }
        image
    }
}

/// Sidecar metadata from a `.png.mcmeta` file.
#[derive(Debug, Clone, Default)]
pub struct TextureMeta {
    /// Animation frame dimensions, when the texture is animated.
    pub animation: Option<TextureAnimation>,
    /// Whether the texture is rendered blurred.
    pub blur: bool,
}

/// The `animation` section of a texture's metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextureAnimation {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub frametime: Option<u32>,
    #[serde(default)]
    pub interpolate: bool,
}

#[derive(Deserialize)]
struct RawTextureMcmeta {
    animation: Option<TextureAnimation>,
    texture: Option<RawTextureProperties>,
}

#[derive(Deserialize)]
struct RawTextureProperties {
    #[serde(default)]
    blur: bool,
}

impl TextureMeta {
    /// Parse a `.png.mcmeta` document. Returns None when the document
    /// carries nothing the renderer uses.
    pub fn parse(text: &str) -> Option<TextureMeta> {
        let raw: RawTextureMcmeta = serde_json::from_str(text).ok()?;
        let meta = TextureMeta {
            animation: raw.animation,
            blur: raw.texture.map(|t| t.blur).unwrap_or(false),
        };
        if meta.animation.is_none() && !meta.blur {
            None
        } else {
            Some(meta)
        }
    }
}

/// Maps namespaced keys to texture resources. Read-only for the life of a
/// resource manager session once loading finishes.
#[derive(Default)]
pub struct TextureIndex {
    textures: HashMap<String, Arc<TextureResource>>,
}

impl TextureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one pack namespace's `textures` folder into the index.
    /// Individually malformed files are logged and skipped.
    pub fn load_directory(
        &mut self,
        namespace: &str,
        folder: &str,
        container: &PackContainer,
        atlases: &TextureAtlases,
    ) -> Result<()> {
        for file in container.list_files_recursively(folder, &["png"]) {
            let relative = file
                .strip_prefix(&format!("{folder}/"))
                .unwrap_or(&file)
                .trim_end_matches(".png")
                .to_string();
            let key = format!("{namespace}:{relative}");

            let data = match container.read(&file) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("unable to read texture {file}: {e}");
                    continue;
                }
            };
            let image = match image::load_from_memory(&data) {
                Ok(image) => image.to_rgba8(),
                Err(e) => {
                    log::warn!("unable to decode texture {key}: {e}");
                    continue;
                }
            };

            let meta_path = format!("{file}.mcmeta");
            let meta = if container.exists(&meta_path) {
                container
                    .read_to_string(&meta_path)
                    .ok()
                    .and_then(|text| TextureMeta::parse(&text))
            } else {
                None
            };

            let content_hash = imageutil::content_hash(&image);
            self.textures.insert(
                key.clone(),
                Arc::new(TextureResource {
                    location: key,
                    image: Arc::new(image),
                    meta,
                    sprite_name: atlases.sprite_name(&relative),
                    content_hash,
                }),
            );
        }
        Ok(())
    }

    /// Look up a texture by namespaced key (no extension).
    pub fn get(&self, location: &str) -> Option<Arc<TextureResource>> {
        self.textures.get(location).cloned()
    }

    /// Insert or replace a texture.
    pub fn insert(&mut self, resource: TextureResource) {
        self.textures
            .insert(resource.location.clone(), Arc::new(resource));
    }

    /// Remove keys whose namespace and path match the filter patterns.
    /// Paths are matched relative to the `textures` folder with their
    /// extension restored (`block/dirt.png`), as in the original loader.
    pub fn filter_resources(&mut self, namespace: &Regex, path: &Regex) {
        self.textures.retain(|key, _| {
            let (ns, rel) = crate::types::split_location(key);
            !(namespace.is_match(ns) && path.is_match(&format!("{rel}.png")))
        });
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }

    /// The magenta/black checkerboard used when a texture cannot be
    /// resolved.
    pub fn missing_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width.max(2), height.max(2), |x, y| {
            let half_w = width.max(2) / 2;
            let half_h = height.max(2) / 2;
            if (x < half_w) == (y < half_h) {
                Rgba([255, 0, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(location: &str, color: [u8; 4]) -> TextureResource {
        TextureResource::from_image(
            location,
            RgbaImage::from_pixel(4, 4, Rgba(color)),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let mut index = TextureIndex::new();
        index.insert(solid("minecraft:block/stone", [128, 128, 128, 255]));
        assert!(index.get("minecraft:block/stone").is_some());
        assert!(index.get("minecraft:block/dirt").is_none());
    }

    #[test]
    fn test_last_insert_wins() {
        let mut index = TextureIndex::new();
        index.insert(solid("minecraft:block/stone", [1, 1, 1, 255]));
        index.insert(solid("minecraft:block/stone", [2, 2, 2, 255]));
        let resource = index.get("minecraft:block/stone").unwrap();
        assert_eq!(resource.image.get_pixel(0, 0)[0], 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_filter_resources() {
        let mut index = TextureIndex::new();
        index.insert(solid("minecraft:block/dirt", [1, 1, 1, 255]));
        index.insert(solid("minecraft:block/stone", [2, 2, 2, 255]));
        index.insert(solid("mymod:block/dirt", [3, 3, 3, 255]));

        let ns = Regex::new("^(?:minecraft)$").unwrap();
        let path = Regex::new(r"^(?:block/dirt\.png)$").unwrap();
        index.filter_resources(&ns, &path);

        assert!(index.get("minecraft:block/dirt").is_none());
        assert!(index.get("minecraft:block/stone").is_some());
        assert!(index.get("mymod:block/dirt").is_some());
    }

    #[test]
    fn test_filter_paths_are_folder_relative() {
        // Patterns written against the full pack path never match; keys
        // are matched relative to the textures folder.
        let mut index = TextureIndex::new();
        index.insert(solid("minecraft:block/dirt", [1, 1, 1, 255]));

        let ns = Regex::new("^(?:minecraft)$").unwrap();
        let path = Regex::new(r"^(?:textures/block/dirt\.png)$").unwrap();
        index.filter_resources(&ns, &path);

        assert!(index.get("minecraft:block/dirt").is_some());
    }

    #[test]
    fn test_meta_parse() {
        let meta = TextureMeta::parse(
            r#"{ "animation": { "width": 16, "height": 16, "frametime": 2 } }"#,
        )
        .unwrap();
        let animation = meta.animation.unwrap();
        assert_eq!(animation.width, Some(16));
        assert_eq!(animation.frametime, Some(2));
        assert!(!meta.blur);

        let meta = TextureMeta::parse(r#"{ "texture": { "blur": true } }"#).unwrap();
        assert!(meta.blur);

        assert!(TextureMeta::parse(r#"{ "texture": { "clamp": true } }"#).is_none());
        assert!(TextureMeta::parse("not json").is_none());
    }

    #[test]
    fn test_animation_first_frame_cropping() {
        // 4 wide, 16 tall: four stacked square frames.
        let mut image = RgbaImage::from_pixel(4, 16, Rgba([0, 0, 0, 255]));
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let resource = TextureResource {
            location: "minecraft:block/anim".to_string(),
            content_hash: imageutil::content_hash(&image),
            image: Arc::new(image),
            meta: Some(TextureMeta {
                animation: Some(TextureAnimation::default()),
                blur: false,
            }),
            sprite_name: None,
        };
        let processed = resource.processed_image();
        assert_eq!(processed.dimensions(), (4, 4));
        assert_eq!(processed.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_missing_image_checkerboard() {
        let missing = TextureIndex::missing_image(16, 16);
        assert_eq!(missing.get_pixel(0, 0), &Rgba([255, 0, 255, 255]));
        assert_eq!(missing.get_pixel(15, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(missing.get_pixel(15, 15), &Rgba([255, 0, 255, 255]));
    }
}

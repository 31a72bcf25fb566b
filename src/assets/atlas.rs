//! Texture atlas definitions (`assets/<namespace>/atlases/*.json`).
//!
//! Newer pack formats describe which textures belong to which atlas and how
//! their sprite names are derived. The texture index records the sprite
//! name so atlas-remapped textures stay addressable under both names.

use serde::Deserialize;

use crate::error::Result;
use crate::pack::PackContainer;

/// All atlas sources declared by one namespace of one pack.
#[derive(Debug, Clone, Default)]
pub struct TextureAtlases {
    sources: Vec<AtlasSource>,
}

/// One entry of an atlas definition's `sources` array.
#[derive(Debug, Clone)]
pub enum AtlasSource {
    /// Every texture under `textures/<source>/` joins the atlas with its
    /// path prefixed by `prefix`.
    Directory { source: String, prefix: String },
    /// A single texture joins under an explicit sprite name.
    Single {
        resource: String,
        sprite: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawAtlasFile {
    #[serde(default)]
    sources: Vec<serde_json::Value>,
}

impl TextureAtlases {
    /// An empty definition: no texture belongs to an atlas.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Parse every atlas file under an `atlases` folder. Unknown source
    /// kinds are skipped; a malformed file fails the pack's asset load.
    pub fn load(container: &PackContainer, atlases_folder: &str) -> Result<TextureAtlases> {
        let mut sources = Vec::new();
        for file in container.list_files_recursively(atlases_folder, &["json"]) {
            let text = container.read_to_string(&file)?;
            let raw: RawAtlasFile = serde_json::from_str(&text)?;
            for entry in raw.sources {
                let kind = entry.get("type").and_then(|t| t.as_str()).unwrap_or("");
                match kind.trim_start_matches("minecraft:") {
                    "directory" => {
                        let source = entry
                            .get("source")
                            .and_then(|s| s.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let prefix = entry
                            .get("prefix")
                            .and_then(|s| s.as_str())
                            .unwrap_or_default()
                            .to_string();
                        sources.push(AtlasSource::Directory { source, prefix });
                    }
                    "single" => {
                        let Some(resource) = entry.get("resource").and_then(|s| s.as_str()) else {
                            continue;
                        };
                        let sprite = entry
                            .get("sprite")
                            .and_then(|s| s.as_str())
                            .map(str::to_string);
                        sources.push(AtlasSource::Single {
                            resource: resource.to_string(),
                            sprite,
                        });
                    }
                    other => {
                        log::debug!("skipping unsupported atlas source type {other:?} in {file}");
                    }
                }
            }
        }
        Ok(TextureAtlases { sources })
    }

    /// The atlas sprite name for a texture path (relative to `textures/`,
    /// without extension), if any source claims it.
    pub fn sprite_name(&self, texture_path: &str) -> Option<String> {
        for source in &self.sources {
            match source {
                AtlasSource::Directory { source, prefix } => {
                    if let Some(rest) = texture_path.strip_prefix(source.as_str()) {
                        if let Some(rest) = rest.strip_prefix('/') {
                            return Some(format!("{prefix}{rest}"));
                        }
                    }
                }
                AtlasSource::Single { resource, sprite } => {
                    let plain = resource.split_once(':').map_or(resource.as_str(), |(_, p)| p);
                    if plain == texture_path {
                        return Some(sprite.clone().unwrap_or_else(|| plain.to_string()));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlases() -> TextureAtlases {
        TextureAtlases {
            sources: vec![
                AtlasSource::Directory {
                    source: "block".to_string(),
                    prefix: "block/".to_string(),
                },
                AtlasSource::Single {
                    resource: "minecraft:misc/shadow".to_string(),
                    sprite: Some("shadow".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_directory_source() {
        let atlases = atlases();
        assert_eq!(
            atlases.sprite_name("block/stone"),
            Some("block/stone".to_string())
        );
        assert_eq!(atlases.sprite_name("item/stick"), None);
    }

    #[test]
    fn test_single_source() {
        let atlases = atlases();
        assert_eq!(atlases.sprite_name("misc/shadow"), Some("shadow".to_string()));
    }

    #[test]
    fn test_empty() {
        assert!(TextureAtlases::empty().is_empty());
        assert_eq!(TextureAtlases::empty().sprite_name("block/stone"), None);
    }
}

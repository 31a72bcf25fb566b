//! Runtime configuration shared across components.
//!
//! Built once at startup and passed by reference; there is no global
//! registry state.

/// Immutable configuration threaded through the resource manager and the
/// model renderer.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default namespace for unqualified resource locations.
    pub default_namespace: String,
    /// Pack format version assumed for the built-in default pack.
    pub default_pack_format: i32,
    /// Model location prefix used when a model redirects to a builtin
    /// entity model (e.g. chests, banners).
    pub builtin_entity_model_prefix: String,
    /// Working raster dimensions the mesh is projected onto before the
    /// final resize to the requested output size.
    pub internal_width: u32,
    /// See [`internal_width`](Self::internal_width).
    pub internal_height: u32,
    /// Edge length textures are upscaled to before being mapped onto
    /// faces, so UV sub-rectangles keep enough pixels to sample from.
    pub texture_resolution: u32,
    /// Pack formats above this threshold require atlas definitions for
    /// texture loading.
    pub atlas_required_above_format: i32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_namespace: "minecraft".to_string(),
            default_pack_format: 12,
            builtin_entity_model_prefix: "minecraft:builtin_entity/".to_string(),
            internal_width: 64,
            internal_height: 64,
            texture_resolution: 800,
            atlas_required_above_format: 9,
        }
    }
}

impl RuntimeConfig {
    /// Qualify a resource location with the default namespace if it has none.
    pub fn namespaced(&self, location: &str) -> String {
        if location.contains(':') {
            location.to_string()
        } else {
            format!("{}:{}", self.default_namespace, location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced() {
        let config = RuntimeConfig::default();
        assert_eq!(config.namespaced("block/stone"), "minecraft:block/stone");
        assert_eq!(config.namespaced("mymod:block/x"), "mymod:block/x");
    }
}

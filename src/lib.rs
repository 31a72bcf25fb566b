//! # Model Rasterizer
//!
//! A Rust library for rendering Minecraft resource-pack block and item
//! models into 2D raster images.
//!
//! ## Overview
//!
//! This library loads an ordered stack of resource packs (ZIP files or
//! directories), resolves block-model inheritance and override chains,
//! and rasterizes the resolved model with correct lighting, tinting and
//! enchantment-glint effects.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use model_rasterizer::{
//!     DisplaySlot, ModelRenderer, PackType, RenderCache, RenderRequest,
//!     ResourceManager, RuntimeConfig,
//! };
//!
//! let config = Arc::new(RuntimeConfig::default());
//!
//! // One manager per session; reloads build a fresh manager.
//! let mut manager = ResourceManager::new(config.clone());
//! manager.register_registry(Arc::new(RenderCache::new()));
//! manager.load_pack("default_pack", PackType::BuiltIn, true)?;
//! manager.load_pack("my_pack.zip", PackType::Local, false)?;
//!
//! let renderer = ModelRenderer::new(config, || 4);
//! let request = RenderRequest::new(
//!     128, 128, &manager, "minecraft:item/diamond_sword", DisplaySlot::Gui,
//! );
//! let result = renderer.render(&request)?;
//! if let Some(image) = result.image() {
//!     image.save("diamond_sword.png")?;
//! }
//! ```

pub mod assets;
pub mod config;
pub mod error;
pub mod imageutil;
pub mod model;
pub mod pack;
pub mod render;
pub mod types;

// Re-export main types for convenience
pub use assets::{
    AssetIndex, FontIndex, LanguageIndex, ModelIndex, ResourceManager, ResourceRegistry,
    TextureAtlases, TextureIndex, TextureMeta, TextureResource,
};
pub use config::RuntimeConfig;
pub use error::{RasterError, Result};
pub use model::{
    BlockModel, DisplaySlot, DisplayTransform, GuiLight, ModelElement, ModelFace, ModelOverride,
    PredicateKey,
};
pub use pack::{PackContainer, PackInfo, PackManifest, PackType};
pub use render::{
    ModelRenderer, ProjectionAnchor, RenderCache, RenderRequest, RenderResult, TintData,
    MODEL_NOT_FOUND,
};
pub use types::{Axis, Direction};

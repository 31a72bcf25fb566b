//! Block model data types.
//!
//! These mirror the block-model JSON schema: cuboid elements with textured
//! faces, texture variable bindings, conditional overrides and per-context
//! display transforms.

pub mod block_model;
pub mod display;
pub mod overrides;

pub use block_model::{BlockModel, ModelElement, ModelFace};
pub use display::{DisplaySlot, DisplayTransform, GuiLight};
pub use overrides::{ModelOverride, PredicateKey};

/// Parent marker for flat multi-layer sprite models.
pub const ITEM_BASE: &str = "builtin/generated";

/// Parent marker for models rendered from a builtin entity model.
pub const BLOCK_ENTITY_BASE: &str = "builtin/entity";

/// Texture variable prefix for sprite model layers (`layer0`, `layer1`, ...).
pub const ITEM_BASE_LAYER: &str = "layer";

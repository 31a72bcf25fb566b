//! Block model parsing and merging.
//!
//! Block models define 3D geometry as cuboid elements, or reference a
//! sprite/builtin base through their parent chain.

use std::collections::HashMap;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use super::display::{DisplaySlot, DisplayTransform, GuiLight};
use super::overrides::ModelOverride;
use crate::types::{Direction, ElementRotation};

/// A parsed block model from models/*.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockModel {
    /// Namespaced resource location, assigned when the model is indexed.
    #[serde(skip)]
    pub location: String,

    /// Parent model to inherit from.
    #[serde(default)]
    pub parent: Option<String>,

    /// Whether to use ambient occlusion.
    #[serde(default = "default_ao", rename = "ambientocclusion")]
    pub ambient_occlusion: bool,

    /// Texture variable definitions.
    #[serde(default)]
    pub textures: HashMap<String, String>,

    /// Model elements (cuboids).
    #[serde(default)]
    pub elements: Vec<ModelElement>,

    /// Conditional overrides, evaluated in declaration order.
    #[serde(default)]
    pub overrides: Vec<ModelOverride>,

    /// Display transforms keyed by render context.
    #[serde(default, deserialize_with = "deserialize_display")]
    pub display: HashMap<DisplaySlot, DisplayTransform>,

    /// GUI lighting mode.
    #[serde(default)]
    pub gui_light: Option<GuiLight>,
}

fn default_ao() -> bool {
    true
}

/// Unknown display contexts are skipped rather than failing the whole model.
fn deserialize_display<'de, D>(
    deserializer: D,
) -> Result<HashMap<DisplaySlot, DisplayTransform>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, DisplayTransform> = HashMap::deserialize(deserializer)?;
    let mut display = HashMap::with_capacity(raw.len());
    for (key, transform) in raw {
        if let Ok(slot) = serde_json::from_value::<DisplaySlot>(serde_json::Value::String(key)) {
            display.insert(slot, transform);
        }
    }
    Ok(display)
}

impl BlockModel {
    /// Check if this model has its own elements (not inherited).
    pub fn has_elements(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Resolve a texture variable reference to its final texture location.
    /// Follows `#var` indirection chains within this model's bindings.
    /// Returns None for an unbound variable.
    pub fn texture_location(&self, reference: &str) -> Option<String> {
        let mut current = reference;
        for _ in 0..10 {
            if let Some(key) = current.strip_prefix('#') {
                current = self.textures.get(key)?;
            } else {
                return Some(current.to_string());
            }
        }
        None
    }

    /// The display transform for a slot, mirroring from the slot's fallback
    /// when the model declares none. The second value is true when the
    /// fallback was used (the caller mirrors the geometry).
    pub fn display_transform(&self, slot: DisplaySlot) -> (Option<&DisplayTransform>, bool) {
        if let Some(transform) = self.display.get(&slot) {
            return (Some(transform), false);
        }
        if let Some(fallback) = slot.fallback() {
            if let Some(transform) = self.display.get(&fallback) {
                return (Some(transform), true);
            }
        }
        (None, false)
    }

    /// The GUI light mode, defaulting to side lighting.
    pub fn gui_light(&self) -> GuiLight {
        self.gui_light.unwrap_or_default()
    }

    /// Merge a parent model into this one. Fields set on the child win;
    /// the merged model carries the grandparent reference so walking can
    /// continue up the chain.
    pub fn merge_with_parent(&self, parent: &BlockModel) -> BlockModel {
        let mut merged = self.clone();

        let mut textures = parent.textures.clone();
        textures.extend(self.textures.clone());
        merged.textures = textures;

        if merged.elements.is_empty() {
            merged.elements = parent.elements.clone();
        }

        let mut display = parent.display.clone();
        display.extend(self.display.clone());
        merged.display = display;

        if merged.gui_light.is_none() {
            merged.gui_light = parent.gui_light;
        }

        merged.parent = parent.parent.clone();
        merged
    }

    /// Finalization after the parent walk. In legacy mode, faces without an
    /// explicit UV rectangle get one derived from the element bounds, and
    /// element models without a GUI transform are normalized to the classic
    /// block GUI placement.
    pub fn finalize(mut self, legacy: bool) -> BlockModel {
        if legacy {
            for element in &mut self.elements {
                let (from, to) = (element.from, element.to);
                for (side, face) in &mut element.faces {
                    if face.uv.is_none() {
                        face.uv = Some(ModelElement::derive_uv(from, to, *side));
                    }
                }
            }
            if !self.elements.is_empty() && !self.display.contains_key(&DisplaySlot::Gui) {
                self.display
                    .insert(DisplaySlot::Gui, DisplayTransform::legacy_block_gui());
            }
        }
        self
    }
}

/// A cuboid element within a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelElement {
    /// Minimum corner (0-16 range).
    pub from: [f64; 3],
    /// Maximum corner (0-16 range).
    pub to: [f64; 3],
    /// Optional rotation.
    #[serde(default)]
    pub rotation: Option<ElementRotation>,
    /// Whether this element receives shade.
    #[serde(default = "default_shade")]
    pub shade: bool,
    /// Face definitions.
    #[serde(default)]
    pub faces: HashMap<Direction, ModelFace>,
}

fn default_shade() -> bool {
    true
}

impl ModelElement {
    /// Get a face definition for a side.
    pub fn face(&self, side: Direction) -> Option<&ModelFace> {
        self.faces.get(&side)
    }

    /// The default UV rectangle a face inherits from the cuboid bounds when
    /// it declares none, in 0-16 texture space.
    pub fn derive_uv(from: [f64; 3], to: [f64; 3], side: Direction) -> [f64; 4] {
        let [x1, y1, z1] = from;
        let [x2, y2, z2] = to;
        match side {
            Direction::Down => [x1, 16.0 - z2, x2, 16.0 - z1],
            Direction::Up => [x1, z1, x2, z2],
            Direction::North => [16.0 - x2, 16.0 - y2, 16.0 - x1, 16.0 - y1],
            Direction::South => [x1, 16.0 - y2, x2, 16.0 - y1],
            Direction::West => [z1, 16.0 - y2, z2, 16.0 - y1],
            Direction::East => [16.0 - z2, 16.0 - y2, 16.0 - z1, 16.0 - y1],
        }
    }

    /// Whether the face at `side` lies flush against the cuboid bound in
    /// direction `dir` (a prerequisite for cullface dropping).
    pub fn is_flush(&self, dir: Direction) -> bool {
        let axis = dir.axis().index();
        if dir.is_positive() {
            self.to[axis] >= 16.0
        } else {
            self.from[axis] <= 0.0
        }
    }
}

/// A face of a model element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFace {
    /// UV coordinates [u1, v1, u2, v2] in 0-16 range.
    #[serde(default)]
    pub uv: Option<[f64; 4]>,
    /// Texture variable reference (e.g. "#side") or direct location.
    pub texture: String,
    /// When set, this face is dropped if a neighbouring element fully
    /// covers it from that direction.
    #[serde(default)]
    pub cullface: Option<Direction>,
    /// UV rotation in degrees (0, 90, 180, 270).
    #[serde(default)]
    pub rotation: i32,
    /// Tint index for dynamic coloring (-1 = no tint).
    #[serde(default = "default_tint_index")]
    pub tintindex: i32,
}

fn default_tint_index() -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::overrides::PredicateKey;

    #[test]
    fn test_parse_simple_model() {
        let json = r#"{
            "parent": "block/cube_all",
            "textures": {
                "all": "block/stone"
            }
        }"#;

        let model: BlockModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.parent, Some("block/cube_all".to_string()));
        assert_eq!(model.textures.get("all"), Some(&"block/stone".to_string()));
        assert!(model.elements.is_empty());
    }

    #[test]
    fn test_parse_model_with_elements() {
        let json = r##"{
            "textures": {
                "texture": "block/stone"
            },
            "elements": [
                {
                    "from": [0, 0, 0],
                    "to": [16, 16, 16],
                    "faces": {
                        "down":  { "texture": "#texture", "cullface": "down" },
                        "up":    { "texture": "#texture", "cullface": "up" },
                        "north": { "texture": "#texture", "cullface": "north" },
                        "south": { "texture": "#texture", "cullface": "south" },
                        "west":  { "texture": "#texture", "cullface": "west" },
                        "east":  { "texture": "#texture", "cullface": "east" }
                    }
                }
            ]
        }"##;

        let model: BlockModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.elements.len(), 1);

        let element = &model.elements[0];
        assert_eq!(element.from, [0.0, 0.0, 0.0]);
        assert_eq!(element.to, [16.0, 16.0, 16.0]);
        assert_eq!(element.faces.len(), 6);
        assert_eq!(
            element.faces.get(&Direction::Down).unwrap().cullface,
            Some(Direction::Down)
        );
    }

    #[test]
    fn test_parse_overrides_and_display() {
        let json = r#"{
            "parent": "item/generated",
            "textures": { "layer0": "item/bow" },
            "display": {
                "thirdperson_righthand": {
                    "rotation": [-80, 260, -40],
                    "translation": [-1, -2, 2.5],
                    "scale": [0.9, 0.9, 0.9]
                }
            },
            "overrides": [
                { "predicate": { "pulling": 1 }, "model": "item/bow_pulling_0" },
                { "predicate": { "pulling": 1, "pull": 0.65 }, "model": "item/bow_pulling_1" }
            ]
        }"#;

        let model: BlockModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.overrides.len(), 2);
        assert_eq!(model.overrides[0].model, "item/bow_pulling_0");
        assert_eq!(
            model.overrides[1].predicate.get(&PredicateKey::Pull),
            Some(&0.65)
        );
        let (transform, mirrored) = model.display_transform(DisplaySlot::ThirdPersonRightHand);
        assert!(!mirrored);
        assert_eq!(transform.unwrap().rotation, [-80.0, 260.0, -40.0]);
    }

    #[test]
    fn test_unknown_display_slot_is_skipped() {
        let json = r#"{
            "display": {
                "gui": { "scale": [0.5, 0.5, 0.5] },
                "somemod_slot": { "scale": [2, 2, 2] }
            }
        }"#;
        let model: BlockModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.display.len(), 1);
        assert!(model.display.contains_key(&DisplaySlot::Gui));
    }

    #[test]
    fn test_texture_location_chain() {
        let model = BlockModel {
            textures: [
                ("all".to_string(), "block/stone".to_string()),
                ("side".to_string(), "#all".to_string()),
                ("particle".to_string(), "#side".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };

        assert_eq!(
            model.texture_location("#particle"),
            Some("block/stone".to_string())
        );
        assert_eq!(
            model.texture_location("block/dirt"),
            Some("block/dirt".to_string())
        );
        assert_eq!(model.texture_location("#missing"), None);
    }

    #[test]
    fn test_texture_location_cycle_terminates() {
        let model = BlockModel {
            textures: [
                ("a".to_string(), "#b".to_string()),
                ("b".to_string(), "#a".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        assert_eq!(model.texture_location("#a"), None);
    }

    #[test]
    fn test_merge_with_parent() {
        let parent = BlockModel {
            location: "minecraft:block/cube_all".to_string(),
            parent: Some("block/cube".to_string()),
            textures: [("particle".to_string(), "#all".to_string())]
                .into_iter()
                .collect(),
            elements: vec![ModelElement {
                from: [0.0, 0.0, 0.0],
                to: [16.0, 16.0, 16.0],
                rotation: None,
                shade: true,
                faces: HashMap::new(),
            }],
            ..Default::default()
        };
        let child = BlockModel {
            location: "minecraft:block/stone".to_string(),
            parent: Some("block/cube_all".to_string()),
            textures: [("all".to_string(), "block/stone".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };

        let merged = child.merge_with_parent(&parent);
        assert_eq!(merged.location, "minecraft:block/stone");
        // Chain continues at the grandparent.
        assert_eq!(merged.parent, Some("block/cube".to_string()));
        assert_eq!(merged.elements.len(), 1);
        assert_eq!(merged.textures.get("particle"), Some(&"#all".to_string()));
        assert_eq!(
            merged.textures.get("all"),
            Some(&"block/stone".to_string())
        );
    }

    #[test]
    fn test_derive_uv_full_cube() {
        let from = [0.0, 0.0, 0.0];
        let to = [16.0, 16.0, 16.0];
        for side in Direction::ALL {
            assert_eq!(
                ModelElement::derive_uv(from, to, side),
                [0.0, 0.0, 16.0, 16.0]
            );
        }
    }

    #[test]
    fn test_derive_uv_partial_cuboid() {
        let from = [2.0, 0.0, 4.0];
        let to = [14.0, 10.0, 12.0];
        assert_eq!(
            ModelElement::derive_uv(from, to, Direction::Up),
            [2.0, 4.0, 14.0, 12.0]
        );
        assert_eq!(
            ModelElement::derive_uv(from, to, Direction::South),
            [2.0, 6.0, 14.0, 16.0]
        );
    }

    #[test]
    fn test_legacy_finalize_fills_uv_and_gui() {
        let json = r##"{
            "elements": [
                {
                    "from": [0, 0, 0],
                    "to": [16, 8, 16],
                    "faces": { "up": { "texture": "#top" } }
                }
            ]
        }"##;
        let model: BlockModel = serde_json::from_str(json).unwrap();
        let finalized = model.finalize(true);
        let face = finalized.elements[0].face(Direction::Up).unwrap();
        assert_eq!(face.uv, Some([0.0, 0.0, 16.0, 16.0]));
        assert!(finalized.display.contains_key(&DisplaySlot::Gui));
    }
}

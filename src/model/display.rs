//! Display transforms and lighting contexts.

use serde::{Deserialize, Serialize};

/// The named rendering context a display transform applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySlot {
    Gui,
    Ground,
    Fixed,
    Head,
    #[serde(rename = "thirdperson_righthand", alias = "thirdperson")]
    ThirdPersonRightHand,
    #[serde(rename = "thirdperson_lefthand")]
    ThirdPersonLeftHand,
    #[serde(rename = "firstperson_righthand", alias = "firstperson")]
    FirstPersonRightHand,
    #[serde(rename = "firstperson_lefthand")]
    FirstPersonLeftHand,
}

impl DisplaySlot {
    /// The slot to mirror from when a model declares no transform for this
    /// slot (left hands fall back to their right-hand counterparts).
    pub fn fallback(&self) -> Option<DisplaySlot> {
        match self {
            DisplaySlot::ThirdPersonLeftHand => Some(DisplaySlot::ThirdPersonRightHand),
            DisplaySlot::FirstPersonLeftHand => Some(DisplaySlot::FirstPersonRightHand),
            _ => None,
        }
    }
}

/// Scale, rotation and translation applied for one display slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayTransform {
    /// Rotation in degrees around x, y, z.
    #[serde(default)]
    pub rotation: [f64; 3],
    /// Translation in 1/16 block units.
    #[serde(default)]
    pub translation: [f64; 3],
    /// Per-axis scale.
    #[serde(default = "default_scale")]
    pub scale: [f64; 3],
}

fn default_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self {
            rotation: [0.0, 0.0, 0.0],
            translation: [0.0, 0.0, 0.0],
            scale: default_scale(),
        }
    }
}

impl DisplayTransform {
    /// The default GUI transform legacy block models are normalized to.
    pub fn legacy_block_gui() -> Self {
        Self {
            rotation: [30.0, 225.0, 0.0],
            translation: [0.0, 0.0, 0.0],
            scale: [0.625, 0.625, 0.625],
        }
    }
}

/// Ambient-light descriptor selecting how a model is lit in GUIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuiLight {
    /// Flat head-on lighting used for sprite-based items.
    Front,
    /// Directional side lighting used for block models.
    #[default]
    Side,
}

impl GuiLight {
    /// Direction the light arrives from.
    pub fn light_vector(&self) -> [f64; 3] {
        match self {
            GuiLight::Front => [0.0, 0.0, 1.0],
            GuiLight::Side => [-0.6, 1.0, 0.4],
        }
    }

    /// Light level faces pointing fully away from the light still receive.
    pub fn ambient_level(&self) -> f64 {
        match self {
            GuiLight::Front => 0.98,
            GuiLight::Side => 0.5,
        }
    }

    /// Light level of a face pointing straight at the light.
    pub fn max_level(&self) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_parsing() {
        let slot: DisplaySlot = serde_json::from_str("\"thirdperson_righthand\"").unwrap();
        assert_eq!(slot, DisplaySlot::ThirdPersonRightHand);
        // Legacy pack name maps onto the right-hand slot.
        let slot: DisplaySlot = serde_json::from_str("\"thirdperson\"").unwrap();
        assert_eq!(slot, DisplaySlot::ThirdPersonRightHand);
    }

    #[test]
    fn test_left_hand_fallback() {
        assert_eq!(
            DisplaySlot::ThirdPersonLeftHand.fallback(),
            Some(DisplaySlot::ThirdPersonRightHand)
        );
        assert_eq!(DisplaySlot::Gui.fallback(), None);
    }

    #[test]
    fn test_transform_defaults() {
        let transform: DisplayTransform = serde_json::from_str("{}").unwrap();
        assert_eq!(transform.scale, [1.0, 1.0, 1.0]);
        assert_eq!(transform.rotation, [0.0, 0.0, 0.0]);
    }
}

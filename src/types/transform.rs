//! Transform types for element rotations.

use super::Axis;
use serde::{Deserialize, Serialize};

use crate::error::{RasterError, Result};

/// Scale multiplier that restores the footprint of a 22.5 degree rotation.
pub const RESCALE_22_5: f64 = 1.082_392_200_292_393_9; // 1 / cos(22.5 deg)

/// Scale multiplier that restores the footprint of a 45 degree rotation.
pub const RESCALE_45: f64 = std::f64::consts::SQRT_2; // 1 / cos(45 deg)

/// Element-level rotation from a model element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRotation {
    /// Origin point for rotation (in 0-16 block coordinates).
    #[serde(default = "default_origin")]
    pub origin: [f64; 3],
    /// Axis to rotate around.
    pub axis: Axis,
    /// Rotation angle in degrees (-45 to 45, in 22.5 increments).
    pub angle: f64,
    /// Whether to rescale the element after rotation.
    #[serde(default)]
    pub rescale: bool,
}

fn default_origin() -> [f64; 3] {
    [8.0, 8.0, 8.0]
}

impl ElementRotation {
    /// The rescale multiplier for this rotation, validating the angle.
    ///
    /// Only 0 and +/-22.5 and +/-45 degrees are supported; compensation
    /// constants exist for no other magnitudes, so anything else is a hard
    /// content error.
    pub fn rescale_factor(&self) -> Result<f64> {
        let magnitude = self.angle.abs();
        if magnitude != 0.0 && magnitude != 22.5 && magnitude != 45.0 {
            return Err(RasterError::InvalidRotationAngle(self.angle as f32));
        }
        if !self.rescale || magnitude == 0.0 {
            return Ok(1.0);
        }
        Ok(if magnitude == 22.5 {
            RESCALE_22_5
        } else {
            RESCALE_45
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::SQRT_2;

    fn rotation(angle: f64, rescale: bool) -> ElementRotation {
        ElementRotation {
            origin: [8.0, 8.0, 8.0],
            axis: Axis::Y,
            angle,
            rescale,
        }
    }

    #[test]
    fn test_valid_angles() {
        for angle in [0.0, 22.5, -22.5, 45.0, -45.0] {
            assert!(rotation(angle, true).rescale_factor().is_ok());
        }
    }

    #[test]
    fn test_invalid_angle_is_hard_error() {
        let err = rotation(30.0, false).rescale_factor();
        assert!(matches!(err, Err(RasterError::InvalidRotationAngle(_))));
    }

    #[test]
    fn test_rescale_factors() {
        assert_eq!(rotation(0.0, true).rescale_factor().unwrap(), 1.0);
        assert_eq!(rotation(45.0, false).rescale_factor().unwrap(), 1.0);
        assert!((rotation(45.0, true).rescale_factor().unwrap() - SQRT_2).abs() < 1e-12);
        assert!((rotation(-22.5, true).rescale_factor().unwrap() - RESCALE_22_5).abs() < 1e-12);
    }
}

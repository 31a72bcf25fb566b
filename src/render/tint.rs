//! Per-face tint colours.
//!
//! A face's tint index selects which dynamic colour (potion liquid,
//! leather dye, grass...) is multiplied onto its texture. Callers build
//! the colour table; an empty table is a no-op.

use image::RgbaImage;

use crate::imageutil;

/// Ordered colour multipliers indexed by a face's tint index.
#[derive(Debug, Clone, Default)]
pub struct TintData {
    colors: Vec<Option<[u8; 3]>>,
}

impl TintData {
    /// No tinting at any index.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(colors: Vec<Option<[u8; 3]>>) -> Self {
        TintData { colors }
    }

    /// A single colour at tint index 0 (the common case).
    pub fn single(color: [u8; 3]) -> Self {
        TintData {
            colors: vec![Some(color)],
        }
    }

    /// The colour for an index; -1 and unknown indices carry no tint.
    pub fn color(&self, index: i32) -> Option<[u8; 3]> {
        if index < 0 {
            return None;
        }
        self.colors.get(index as usize).copied().flatten()
    }

    /// Multiply the tint for `index` onto an image; a no-op without one.
    pub fn apply(&self, image: RgbaImage, index: i32) -> RgbaImage {
        match self.color(index) {
            Some(color) => imageutil::multiply_tint(image, color),
            None => image,
        }
    }

    /// Fingerprint for render cache keys.
    pub fn fingerprint(&self) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for entry in &self.colors {
            let bytes = match entry {
                Some([r, g, b]) => [1, *r, *g, *b],
                None => [0, 0, 0, 0],
            };
            for byte in bytes {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_negative_index_is_no_tint() {
        let tint = TintData::single([255, 0, 0]);
        assert_eq!(tint.color(-1), None);
        assert_eq!(tint.color(0), Some([255, 0, 0]));
        assert_eq!(tint.color(5), None);
    }

    #[test]
    fn test_apply_multiplies() {
        let tint = TintData::single([0, 255, 0]);
        let image = RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 255]));
        let tinted = tint.apply(image, 0);
        assert_eq!(tinted.get_pixel(0, 0), &Rgba([0, 200, 0, 255]));
    }

    #[test]
    fn test_fingerprint_distinguishes_tables() {
        let a = TintData::single([255, 0, 0]);
        let b = TintData::single([0, 255, 0]);
        let c = TintData::empty();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint(), TintData::single([255, 0, 0]).fingerprint());
    }
}

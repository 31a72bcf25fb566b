//! Enchantment glint overlays.
//!
//! Enchanted items get an animated purple shimmer blended over every face.
//! Computing the overlay is relatively expensive, so within one render it
//! is cached per distinct face pixel size instead of once per face.

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use super::geom::BlendMode;
use crate::imageutil;

/// Opacity the glint overlay is blended at.
pub const ENCHANTMENT_GLINT_FACTOR: f64 = 190.0 / 255.0;

/// Overlay images and their blend modes for one face.
#[derive(Clone, Default)]
pub struct GlintOverlay {
    pub overlays: Vec<RgbaImage>,
    pub blending: Vec<BlendMode>,
}

/// Produces the raw per-face glint overlay for a face image.
pub type GlintOverlayProvider = Arc<dyn Fn(&RgbaImage) -> GlintOverlay + Send + Sync>;

/// Applies a composited glint directly onto a flat sprite image.
pub type GlintCompositeProvider = Arc<dyn Fn(RgbaImage) -> RgbaImage + Send + Sync>;

/// The built-in overlay provider: one additive procedural shimmer tile
/// matching the face dimensions.
pub fn default_overlay_provider() -> GlintOverlayProvider {
    Arc::new(|image: &RgbaImage| {
        let (width, height) = image.dimensions();
        GlintOverlay {
            overlays: vec![glint_tile(width, height)],
            blending: vec![BlendMode::Add],
        }
    })
}

/// The built-in composite provider for sprite renders: blends the shimmer
/// onto opaque pixels only.
pub fn default_composite_provider() -> GlintCompositeProvider {
    Arc::new(|mut image: RgbaImage| {
        let tile = glint_tile(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            if pixel[3] == 0 {
                continue;
            }
            let shimmer = tile.get_pixel(x, y);
            let strength = shimmer[3] as f64 / 255.0 * ENCHANTMENT_GLINT_FACTOR;
            for channel in 0..3 {
                pixel[channel] = (pixel[channel] as f64
                    + shimmer[channel] as f64 * strength)
                    .min(255.0) as u8;
            }
        }
        image
    })
}

/// Procedural diagonal shimmer bands in the classic enchantment purple.
fn glint_tile(width: u32, height: u32) -> RgbaImage {
    let period = (width.max(height) / 4).max(4);
    RgbaImage::from_fn(width, height, |x, y| {
        let band = ((x + 2 * y) / period) % 4;
        let alpha = match band {
            0 => 160,
            1 => 96,
            _ => 0,
        };
        Rgba([128, 76, 216, alpha])
    })
}

/// Per-render cache of glint overlays keyed by face pixel dimensions,
/// shared across the element tasks of one render call.
#[derive(Default)]
pub struct GlintCache {
    entries: Mutex<HashMap<(u32, u32), GlintOverlay>>,
}

impl GlintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the overlay for this face size, computing it on first use.
    pub fn get_or_compute(
        &self,
        image: &RgbaImage,
        provider: &GlintOverlayProvider,
    ) -> GlintOverlay {
        let key = image.dimensions();
        let mut entries = self.entries.lock();
        entries
            .entry(key)
            .or_insert_with(|| (provider.as_ref())(image))
            .clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Content fingerprint of an overlay set, used when glint providers feed
/// into cache keys.
pub fn overlay_fingerprint(overlay: &GlintOverlay) -> u64 {
    overlay
        .overlays
        .iter()
        .fold(0u64, |acc, image| acc ^ imageutil::content_hash(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_overlay_matches_face_size() {
        let provider = default_overlay_provider();
        let face = RgbaImage::new(32, 48);
        let overlay = (provider.as_ref())(&face);
        assert_eq!(overlay.overlays.len(), 1);
        assert_eq!(overlay.overlays[0].dimensions(), (32, 48));
        assert_eq!(overlay.blending, vec![BlendMode::Add]);
    }

    #[test]
    fn test_cache_computes_once_per_size() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider: GlintOverlayProvider = Arc::new(move |image: &RgbaImage| {
            counter.fetch_add(1, Ordering::Relaxed);
            GlintOverlay {
                overlays: vec![image.clone()],
                blending: vec![BlendMode::Add],
            }
        });

        let cache = GlintCache::new();
        let small = RgbaImage::new(8, 8);
        let large = RgbaImage::new(16, 16);
        cache.get_or_compute(&small, &provider);
        cache.get_or_compute(&small, &provider);
        cache.get_or_compute(&large, &provider);

        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_composite_leaves_transparent_pixels() {
        let provider = default_composite_provider();
        let mut image = RgbaImage::new(8, 8);
        image.put_pixel(0, 0, Rgba([10, 10, 10, 255]));
        let out = (provider.as_ref())(image);
        assert_eq!(out.get_pixel(4, 4)[3], 0);
        assert!(out.get_pixel(0, 0)[3] == 255);
    }
}

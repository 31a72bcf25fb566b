//! Image helpers shared by texture baking and compositing.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Resize with nearest-neighbour sampling (preserves pixel-art edges).
pub fn resize_nearest(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(image, width.max(1), height.max(1), FilterType::Nearest)
}

/// Resize with a smooth filter, for the final output scaling.
pub fn resize_quality(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(image, width.max(1), height.max(1), FilterType::CatmullRom)
}

/// Upscale a texture so its larger edge equals `resolution`, keeping the
/// aspect ratio. Face baking crops UV sub-rectangles out of the result, so
/// small textures need the extra pixels to sample from.
pub fn upscale_to_resolution(image: &RgbaImage, resolution: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w >= resolution && h >= resolution {
        return image.clone();
    }
    if w > h {
        resize_nearest(image, resolution, (resolution as u64 * h as u64 / w as u64) as u32)
    } else {
        resize_nearest(image, (resolution as u64 * w as u64 / h as u64) as u32, resolution)
    }
}

/// Copy a sub-rectangle, clamped to the image bounds, optionally flipping
/// the copy. Degenerate requests yield a 1x1 image rather than failing.
pub fn sub_image(
    image: &RgbaImage,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    flip_horizontal: bool,
    flip_vertical: bool,
) -> RgbaImage {
    let (img_w, img_h) = image.dimensions();
    let x = x.clamp(0, img_w.saturating_sub(1) as i64) as u32;
    let y = y.clamp(0, img_h.saturating_sub(1) as i64) as u32;
    let width = width.max(1).min(img_w - x);
    let height = height.max(1).min(img_h - y);

    let mut out = imageops::crop_imm(image, x, y, width, height).to_image();
    if flip_horizontal {
        out = imageops::flip_horizontal(&out);
    }
    if flip_vertical {
        out = imageops::flip_vertical(&out);
    }
    out
}

/// Rotate by a multiple of 90 degrees (clockwise).
pub fn rotate_90_steps(image: &RgbaImage, degrees: i32) -> RgbaImage {
    match degrees.rem_euclid(360) {
        90 => imageops::rotate90(image),
        180 => imageops::rotate180(image),
        270 => imageops::rotate270(image),
        _ => image.clone(),
    }
}

/// Gaussian blur for textures carrying the blur flag.
pub fn gaussian_blur(image: &RgbaImage) -> RgbaImage {
    imageops::blur(image, 1.0)
}

/// Multiply every pixel's colour channels by a tint colour.
pub fn multiply_tint(mut image: RgbaImage, tint: [u8; 3]) -> RgbaImage {
    for pixel in image.pixels_mut() {
        pixel[0] = ((pixel[0] as u16 * tint[0] as u16) / 255) as u8;
        pixel[1] = ((pixel[1] as u16 * tint[1] as u16) / 255) as u8;
        pixel[2] = ((pixel[2] as u16 * tint[2] as u16) / 255) as u8;
    }
    image
}

/// Draw `src` over the whole of `dest`, nearest-scaled, source-over.
pub fn draw_layer_scaled(dest: &mut RgbaImage, src: &RgbaImage) {
    let scaled = if src.dimensions() == dest.dimensions() {
        src.clone()
    } else {
        resize_nearest(src, dest.width(), dest.height())
    };
    for (x, y, pixel) in scaled.enumerate_pixels() {
        let base = dest.get_pixel_mut(x, y);
        *base = blend_over(*base, *pixel);
    }
}

/// Source-over alpha blending of a single pixel.
pub fn blend_over(base: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return base;
    }
    let ba = base[3] as u32;
    let out_a = sa + ba * (255 - sa) / 255;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, b: u8| {
        ((s as u32 * sa + b as u32 * ba * (255 - sa) / 255) / out_a) as u8
    };
    Rgba([
        channel(src[0], base[0]),
        channel(src[1], base[1]),
        channel(src[2], base[2]),
        out_a as u8,
    ])
}

/// FNV-1a content hash over dimensions and raw pixel data, used for cache
/// key fingerprints of texture identity.
pub fn content_hash(image: &RgbaImage) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut write = |byte: u8| {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    };
    for byte in image.width().to_le_bytes() {
        write(byte);
    }
    for byte in image.height().to_le_bytes() {
        write(byte);
    }
    for byte in image.as_raw() {
        write(*byte);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_upscale_keeps_aspect() {
        let img = checker(16, 32);
        let scaled = upscale_to_resolution(&img, 64);
        assert_eq!(scaled.dimensions(), (32, 64));

        let img = checker(32, 16);
        let scaled = upscale_to_resolution(&img, 64);
        assert_eq!(scaled.dimensions(), (64, 32));
    }

    #[test]
    fn test_sub_image_clamps() {
        let img = checker(8, 8);
        let sub = sub_image(&img, 6, 6, 10, 10, false, false);
        assert_eq!(sub.dimensions(), (2, 2));

        let degenerate = sub_image(&img, 0, 0, 0, 0, false, false);
        assert_eq!(degenerate.dimensions(), (1, 1));
    }

    #[test]
    fn test_sub_image_flip() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let flipped = sub_image(&img, 0, 0, 2, 1, true, false);
        assert_eq!(flipped.get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(flipped.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_rotate_steps() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let rotated = rotate_90_steps(&img, 90);
        assert_eq!(rotated.dimensions(), (1, 2));
        assert_eq!(rotate_90_steps(&img, 0).dimensions(), (2, 1));
        assert_eq!(rotate_90_steps(&img, 360).dimensions(), (2, 1));
    }

    #[test]
    fn test_multiply_tint() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 255]));
        let tinted = multiply_tint(img, [255, 0, 128]);
        let pixel = tinted.get_pixel(0, 0);
        assert_eq!(pixel[0], 200);
        assert_eq!(pixel[1], 0);
        assert_eq!(pixel[2], 25);
        assert_eq!(pixel[3], 255);
    }

    #[test]
    fn test_blend_over() {
        let base = Rgba([0, 0, 255, 255]);
        assert_eq!(blend_over(base, Rgba([255, 0, 0, 255])), Rgba([255, 0, 0, 255]));
        assert_eq!(blend_over(base, Rgba([255, 0, 0, 0])), base);
        let half = blend_over(base, Rgba([255, 0, 0, 128]));
        assert!(half[0] > 100 && half[2] > 100);
    }

    #[test]
    fn test_content_hash_differs() {
        let a = checker(4, 4);
        let mut b = checker(4, 4);
        assert_eq!(content_hash(&a), content_hash(&b));
        b.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        assert_ne!(content_hash(&a), content_hash(&b));
        // Same bytes, different shape.
        let c = checker(2, 8);
        assert_ne!(content_hash(&a), content_hash(&c));
    }
}

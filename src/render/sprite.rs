//! Sprite ("item-generated") model extrusion.
//!
//! Flat item icons become a thin 3D sheet: the whole image maps onto the
//! front and back faces, and every opaque pixel becomes a one-unit-deep
//! cuboid contributing edge faces wherever a transparent neighbour (or
//! the image border) exposes it. The result takes the same lighting and
//! display-transform treatment as cuboid models.

use glam::DVec3;
use image::{imageops, RgbaImage};

use super::geom::{Cuboid, MeshModel};
use crate::types::Direction;

/// Extrude a composited sprite into a `width` x `height` x 1 sheet centred
/// in a `depth`-unit block space.
pub fn extrude(image: &RgbaImage, width: f64, height: f64, depth: f64) -> MeshModel {
    let (w, h) = image.dimensions();
    let mut cuboids = Vec::new();
    if w == 0 || h == 0 {
        return MeshModel::new(cuboids);
    }

    let interval_x = width / w as f64;
    let interval_y = height / h as f64;
    let z = depth / 2.0 - 0.5;

    // Front and back of the sheet carry the full image.
    let mut sheet_images: [Option<RgbaImage>; 6] = Default::default();
    sheet_images[2] = Some(imageops::flip_horizontal(image)); // north
    sheet_images[3] = Some(image.clone()); // south
    cuboids.push(Cuboid::from_corners(
        DVec3::new(0.0, 0.0, z),
        DVec3::new(width, height, z + 1.0),
        sheet_images,
    ));

    let alpha_at = |x: i64, y: i64| -> u8 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0
        } else {
            image.get_pixel(x as u32, y as u32)[3]
        }
    };

    for y in 0..h {
        for x in 0..w {
            let pixel = *image.get_pixel(x, y);
            if pixel[3] == 0 {
                continue;
            }
            let single = RgbaImage::from_pixel(1, 1, pixel);

            let mut edge_images: [Option<RgbaImage>; 6] = Default::default();
            let sides = [
                (Direction::Up, 0i64, -1i64),
                (Direction::Down, 0, 1),
                (Direction::West, -1, 0),
                (Direction::East, 1, 0),
            ];
            let mut any_edge = false;
            for (side, dx, dy) in sides {
                if alpha_at(x as i64 + dx, y as i64 + dy) == 0 {
                    edge_images[super::geom::direction_index(side)] = Some(single.clone());
                    any_edge = true;
                }
            }
            if !any_edge {
                continue;
            }

            // Image y runs down; block y runs up.
            let min_x = x as f64 * interval_x;
            let max_y = height - y as f64 * interval_y;
            cuboids.push(Cuboid::from_corners(
                DVec3::new(min_x, max_y - interval_y, z),
                DVec3::new(min_x + interval_x, max_y, z + 1.0),
                edge_images,
            ));
        }
    }

    MeshModel::new(cuboids)
}

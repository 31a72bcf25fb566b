//! Geometry and software rasterization backend.
//!
//! Models are meshes of textured cuboids. Rendering projects every face
//! through an affine screen transform and composites them back-to-front
//! with per-face directional lighting and optional overlay blending.

use glam::{DMat3, DVec3};
use image::{Rgba, RgbaImage};

use crate::imageutil;
use crate::types::{Axis, Direction};

/// How an overlay image combines with the face texture underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Add,
    Multiply,
}

/// One textured quad. Points are ordered top-left, top-right,
/// bottom-right, bottom-left in texture orientation, so the texture's
/// x axis runs p0 -> p1 and its y axis runs p0 -> p3.
pub struct FaceQuad {
    pub points: [DVec3; 4],
    pub image: Option<RgbaImage>,
    pub overlays: Vec<(RgbaImage, BlendMode)>,
    /// Opacity applied to overlays when blending.
    pub overlay_factor: f64,
    /// Light factor in [0, 1] multiplied onto colour channels.
    pub light: f64,
    /// Faces dropped by cullface checks are kept in the mesh but excluded
    /// from rasterization.
    pub hidden: bool,
}

impl FaceQuad {
    fn new(points: [DVec3; 4], image: Option<RgbaImage>) -> FaceQuad {
        FaceQuad {
            points,
            image,
            overlays: Vec::new(),
            overlay_factor: 1.0,
            light: 1.0,
            hidden: false,
        }
    }

    /// Outward normal from the point winding.
    pub fn normal(&self) -> DVec3 {
        (self.points[3] - self.points[0]).cross(self.points[1] - self.points[0])
    }

    fn depth(&self) -> f64 {
        self.points.iter().map(|p| p.z).sum::<f64>() / 4.0
    }
}

/// A textured cuboid with up to six faces, in [`Direction::ALL`] order.
pub struct Cuboid {
    pub faces: [FaceQuad; 6],
    /// Elements with shade disabled always render at full light.
    pub shade: bool,
}

impl Cuboid {
    /// Build a cuboid from opposite corners. Face images are given in
    /// [`Direction::ALL`] order; None leaves the face untextured (skipped
    /// at rasterization).
    pub fn from_corners(min: DVec3, max: DVec3, images: [Option<RgbaImage>; 6]) -> Cuboid {
        let (x1, y1, z1) = (min.x, min.y, min.z);
        let (x2, y2, z2) = (max.x, max.y, max.z);
        let corners = |side: Direction| -> [DVec3; 4] {
            match side {
                Direction::Down => [
                    DVec3::new(x1, y1, z2),
                    DVec3::new(x2, y1, z2),
                    DVec3::new(x2, y1, z1),
                    DVec3::new(x1, y1, z1),
                ],
                Direction::Up => [
                    DVec3::new(x1, y2, z1),
                    DVec3::new(x2, y2, z1),
                    DVec3::new(x2, y2, z2),
                    DVec3::new(x1, y2, z2),
                ],
                Direction::North => [
                    DVec3::new(x2, y2, z1),
                    DVec3::new(x1, y2, z1),
                    DVec3::new(x1, y1, z1),
                    DVec3::new(x2, y1, z1),
                ],
                Direction::South => [
                    DVec3::new(x1, y2, z2),
                    DVec3::new(x2, y2, z2),
                    DVec3::new(x2, y1, z2),
                    DVec3::new(x1, y1, z2),
                ],
                Direction::West => [
                    DVec3::new(x1, y2, z1),
                    DVec3::new(x1, y2, z2),
                    DVec3::new(x1, y1, z2),
                    DVec3::new(x1, y1, z1),
                ],
                Direction::East => [
                    DVec3::new(x2, y2, z2),
                    DVec3::new(x2, y2, z1),
                    DVec3::new(x2, y1, z1),
                    DVec3::new(x2, y1, z2),
                ],
            }
        };

        let mut images = images.map(Some);
        let faces = Direction::ALL.map(|side| {
            let image = images[direction_index(side)].take().flatten();
            FaceQuad::new(corners(side), image)
        });
        Cuboid { faces, shade: true }
    }

    pub fn face(&self, side: Direction) -> &FaceQuad {
        &self.faces[direction_index(side)]
    }

    pub fn face_mut(&mut self, side: Direction) -> &mut FaceQuad {
        &mut self.faces[direction_index(side)]
    }

    pub fn translate(&mut self, offset: DVec3) {
        self.transform(|p| p + offset);
    }

    pub fn scale(&mut self, factor: DVec3) {
        self.transform(|p| p * factor);
    }

    /// Rotate about one axis through the origin, in degrees.
    pub fn rotate_axis(&mut self, axis: Axis, degrees: f64) {
        let radians = degrees.to_radians();
        let matrix = match axis {
            Axis::X => DMat3::from_rotation_x(radians),
            Axis::Y => DMat3::from_rotation_y(radians),
            Axis::Z => DMat3::from_rotation_z(radians),
        };
        self.transform(|p| matrix * p);
    }

    fn transform(&mut self, f: impl Fn(DVec3) -> DVec3) {
        for face in &mut self.faces {
            for point in &mut face.points {
                *point = f(*point);
            }
        }
    }
}

/// Index of a direction in [`Direction::ALL`].
pub fn direction_index(side: Direction) -> usize {
    Direction::ALL
        .iter()
        .position(|d| *d == side)
        .expect("direction in ALL")
}

/// A renderable mesh of cuboids.
#[derive(Default)]
pub struct MeshModel {
    pub cuboids: Vec<Cuboid>,
}

impl MeshModel {
    pub fn new(cuboids: Vec<Cuboid>) -> MeshModel {
        MeshModel { cuboids }
    }

    pub fn append(&mut self, mut other: MeshModel) {
        self.cuboids.append(&mut other.cuboids);
    }

    pub fn translate(&mut self, offset: DVec3) {
        for cuboid in &mut self.cuboids {
            cuboid.translate(offset);
        }
    }

    pub fn scale(&mut self, factor: DVec3) {
        for cuboid in &mut self.cuboids {
            cuboid.scale(factor);
        }
    }

    /// Rotate about the origin, applying x then y then z, in degrees.
    pub fn rotate_degrees(&mut self, x: f64, y: f64, z: f64) {
        let matrix = DMat3::from_rotation_z(z.to_radians())
            * DMat3::from_rotation_y(y.to_radians())
            * DMat3::from_rotation_x(x.to_radians());
        for cuboid in &mut self.cuboids {
            cuboid.transform(|p| matrix * p);
        }
    }

    /// Mirror across the yz plane (left-hand display slots).
    pub fn flip_x(&mut self) {
        for cuboid in &mut self.cuboids {
            cuboid.transform(|p| DVec3::new(-p.x, p.y, p.z));
        }
    }

    /// Recompute per-face light factors from a directional light. `ambient`
    /// is the level of a face pointing fully away, `max` the level of a
    /// face pointing straight at the light. Call after all transforms.
    pub fn update_lighting(&mut self, light: DVec3, ambient: f64, max: f64) {
        let light = light.normalize_or_zero();
        for cuboid in &mut self.cuboids {
            for face in &mut cuboid.faces {
                if !cuboid.shade {
                    face.light = 1.0;
                    continue;
                }
                let normal = face.normal().normalize_or_zero();
                let alignment = normal.dot(light).clamp(0.0, 1.0);
                let level = ambient + (max - ambient) * alignment;
                face.light = (level / max).clamp(0.0, 1.0);
            }
        }
    }

    /// Rasterize onto `target` using painter's-algorithm compositing: the
    /// viewer looks along -z, so faces draw in ascending depth order.
    pub fn render(&self, target: &mut RgbaImage, affine: &Affine2D) {
        let mut faces: Vec<&FaceQuad> = self
            .cuboids
            .iter()
            .flat_map(|c| c.faces.iter())
            .filter(|f| !f.hidden && f.image.is_some())
            .collect();
        faces.sort_by(|a, b| {
            a.depth()
                .partial_cmp(&b.depth())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for face in faces {
            draw_face(target, face, affine);
        }
    }
}

/// A 2D affine screen transform (column-major 2x2 plus translation).
#[derive(Debug, Clone, Copy)]
pub struct Affine2D {
    pub m00: f64,
    pub m01: f64,
    pub m10: f64,
    pub m11: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Affine2D {
    /// Screen-centred placement: a 16-unit block fills the raster, +y up.
    pub fn centered(width: u32, height: u32) -> Affine2D {
        Affine2D {
            m00: width as f64 / 16.0,
            m01: 0.0,
            m10: 0.0,
            m11: -(height as f64) / 16.0,
            tx: width as f64 / 2.0,
            ty: height as f64 / 2.0,
        }
    }

    /// List-inventory anchor placement used for player-style renders: the
    /// origin sits at 5/7 of the raster height and the scale follows the
    /// raster width.
    pub fn player_anchored(width: u32, height: u32) -> Affine2D {
        let scale = width as f64 / 39.09375;
        Affine2D {
            m00: scale,
            m01: 0.0,
            m10: 0.0,
            m11: -scale,
            tx: width as f64 / 2.0,
            ty: height as f64 / 7.0 * 5.0,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m00 * x + self.m01 * y + self.tx,
            self.m10 * x + self.m11 * y + self.ty,
        )
    }
}

/// Rasterize one face: project the quad, invert the (parallelogram)
/// mapping per pixel, sample nearest-neighbour, apply light and overlays,
/// source-over onto the target.
fn draw_face(target: &mut RgbaImage, face: &FaceQuad, affine: &Affine2D) {
    let Some(image) = &face.image else {
        return;
    };

    let projected: Vec<(f64, f64)> = face
        .points
        .iter()
        .map(|p| affine.apply(p.x, p.y))
        .collect();
    let origin = projected[0];
    let e1 = (projected[1].0 - origin.0, projected[1].1 - origin.1);
    let e2 = (projected[3].0 - origin.0, projected[3].1 - origin.1);
    let det = e1.0 * e2.1 - e2.0 * e1.1;
    if det.abs() < 1e-9 {
        // Edge-on or degenerate.
        return;
    }

    let min_x = projected.iter().map(|p| p.0).fold(f64::MAX, f64::min);
    let max_x = projected.iter().map(|p| p.0).fold(f64::MIN, f64::max);
    let min_y = projected.iter().map(|p| p.1).fold(f64::MAX, f64::min);
    let max_y = projected.iter().map(|p| p.1).fold(f64::MIN, f64::max);

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().min(target.width() as f64) as u32).min(target.width());
    let y1 = (max_y.ceil().min(target.height() as f64) as u32).min(target.height());

    let (tex_w, tex_h) = image.dimensions();
    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f64 + 0.5 - origin.0;
            let dy = py as f64 + 0.5 - origin.1;
            let u = (dx * e2.1 - e2.0 * dy) / det;
            let v = (e1.0 * dy - dx * e1.1) / det;
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }

            let tx = ((u * tex_w as f64) as u32).min(tex_w - 1);
            let ty = ((v * tex_h as f64) as u32).min(tex_h - 1);
            let mut color = *image.get_pixel(tx, ty);
            if color[3] == 0 {
                continue;
            }

            for (overlay, mode) in &face.overlays {
                let (ow, oh) = overlay.dimensions();
                let ox = ((u * ow as f64) as u32).min(ow - 1);
                let oy = ((v * oh as f64) as u32).min(oh - 1);
                color = blend_overlay(color, *overlay.get_pixel(ox, oy), *mode, face.overlay_factor);
            }

            for channel in 0..3 {
                color[channel] = (color[channel] as f64 * face.light).round() as u8;
            }

            let base = target.get_pixel_mut(px, py);
            *base = imageutil::blend_over(*base, color);
        }
    }
}

fn blend_overlay(base: Rgba<u8>, overlay: Rgba<u8>, mode: BlendMode, factor: f64) -> Rgba<u8> {
    let strength = overlay[3] as f64 / 255.0 * factor.clamp(0.0, 1.0);
    if strength <= 0.0 {
        return base;
    }
    let mut out = base;
    match mode {
        BlendMode::Normal => {
            for channel in 0..3 {
                out[channel] = (base[channel] as f64 * (1.0 - strength)
                    + overlay[channel] as f64 * strength)
                    .round() as u8;
            }
        }
        BlendMode::Add => {
            for channel in 0..3 {
                out[channel] = (base[channel] as f64 + overlay[channel] as f64 * strength)
                    .min(255.0) as u8;
            }
        }
        BlendMode::Multiply => {
            for channel in 0..3 {
                let multiplier = 1.0 - strength * (1.0 - overlay[channel] as f64 / 255.0);
                out[channel] = (base[channel] as f64 * multiplier).round() as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba(color))
    }

    fn full_cube(images: [Option<RgbaImage>; 6]) -> Cuboid {
        Cuboid::from_corners(DVec3::ZERO, DVec3::splat(16.0), images)
    }

    #[test]
    fn test_face_normals_point_outward() {
        let cuboid = full_cube(Default::default());
        for side in Direction::ALL {
            let normal = cuboid.face(side).normal().normalize();
            let expected = DVec3::from_array(side.normal());
            assert!(
                (normal - expected).length() < 1e-9,
                "normal mismatch for {side}: {normal:?}"
            );
        }
    }

    #[test]
    fn test_rotation_preserves_size() {
        let mut cuboid = full_cube(Default::default());
        cuboid.translate(DVec3::splat(-8.0));
        cuboid.rotate_axis(Axis::Y, 45.0);
        let p = cuboid.face(Direction::Up).points[0];
        // Corner distance from the axis is unchanged by rotation.
        assert!((p.length() - DVec3::new(-8.0, 8.0, -8.0).length()).abs() < 1e-9);
    }

    #[test]
    fn test_lighting_factors() {
        let mut mesh = MeshModel::new(vec![full_cube([
            Some(solid([255, 255, 255, 255])),
            Some(solid([255, 255, 255, 255])),
            None,
            None,
            None,
            None,
        ])]);
        mesh.update_lighting(DVec3::new(0.0, 1.0, 0.0), 0.5, 1.0);
        let up = mesh.cuboids[0].face(Direction::Up).light;
        let down = mesh.cuboids[0].face(Direction::Down).light;
        assert!((up - 1.0).abs() < 1e-9);
        assert!((down - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_shade_ignores_light() {
        let mut cuboid = full_cube(Default::default());
        cuboid.shade = false;
        let mut mesh = MeshModel::new(vec![cuboid]);
        mesh.update_lighting(DVec3::new(0.0, 1.0, 0.0), 0.2, 1.0);
        assert_eq!(mesh.cuboids[0].face(Direction::Down).light, 1.0);
    }

    #[test]
    fn test_render_fills_pixels() {
        let mut cuboid = full_cube([
            None,
            None,
            None,
            Some(solid([255, 0, 0, 255])),
            None,
            None,
        ]);
        cuboid.translate(DVec3::splat(-8.0));
        let mesh = MeshModel::new(vec![cuboid]);

        let mut target = RgbaImage::new(32, 32);
        mesh.render(&mut target, &Affine2D::centered(32, 32));

        // The south face spans the whole raster head-on.
        assert_eq!(target.get_pixel(16, 16), &Rgba([255, 0, 0, 255]));
        assert_eq!(target.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_painter_orders_by_depth() {
        // South face (closer to the viewer) must win over the north face.
        let mut cuboid = full_cube([
            None,
            None,
            Some(solid([0, 255, 0, 255])),
            Some(solid([255, 0, 0, 255])),
            None,
            None,
        ]);
        cuboid.translate(DVec3::splat(-8.0));
        let mesh = MeshModel::new(vec![cuboid]);

        let mut target = RgbaImage::new(16, 16);
        mesh.render(&mut target, &Affine2D::centered(16, 16));
        assert_eq!(target.get_pixel(8, 8), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_hidden_face_not_rendered() {
        let mut cuboid = full_cube([
            None,
            None,
            None,
            Some(solid([255, 0, 0, 255])),
            None,
            None,
        ]);
        cuboid.translate(DVec3::splat(-8.0));
        cuboid.face_mut(Direction::South).hidden = true;
        let mesh = MeshModel::new(vec![cuboid]);

        let mut target = RgbaImage::new(16, 16);
        mesh.render(&mut target, &Affine2D::centered(16, 16));
        assert_eq!(target.get_pixel(8, 8), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_overlay_add_brightens() {
        let base = Rgba([100, 100, 100, 255]);
        let overlay = Rgba([100, 0, 0, 255]);
        let out = blend_overlay(base, overlay, BlendMode::Add, 1.0);
        assert_eq!(out[0], 200);
        assert_eq!(out[1], 100);
    }

    #[test]
    fn test_flip_x_mirrors() {
        let mut mesh = MeshModel::new(vec![full_cube(Default::default())]);
        mesh.translate(DVec3::new(-8.0, -8.0, -8.0));
        let before = mesh.cuboids[0].face(Direction::East).points[0].x;
        mesh.flip_x();
        let after = mesh.cuboids[0].face(Direction::East).points[0].x;
        assert_eq!(before, -after);
    }
}

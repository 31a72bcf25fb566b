//! Model rendering: resolved models to raster images.
//!
//! The renderer bakes per-element faces on a worker pool, assembles the
//! cuboid mesh, applies the display transform and lighting for the
//! requested context, projects to an internal raster and resizes to the
//! requested output. Results are cached per input fingerprint; a degraded
//! render always produces an image rather than crashing the caller.

pub mod cache;
pub mod geom;
pub mod glint;
pub mod pool;
pub mod sprite;
pub mod tint;

pub use cache::{CacheKey, RenderCache};
pub use geom::{Affine2D, BlendMode, Cuboid, FaceQuad, MeshModel};
pub use glint::{
    default_composite_provider, default_overlay_provider, GlintCache, GlintCompositeProvider,
    GlintOverlay, GlintOverlayProvider, ENCHANTMENT_GLINT_FACTOR,
};
pub use pool::{RenderPool, DEFAULT_RESIZE_INTERVAL};
pub use tint::TintData;

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use image::RgbaImage;
use parking_lot::Mutex;

use crate::assets::{ResourceManager, TextureIndex, TextureResource};
use crate::config::RuntimeConfig;
use crate::error::{RasterError, Result};
use crate::imageutil;
use crate::model::{
    BlockModel, DisplaySlot, GuiLight, ModelElement, PredicateKey, ITEM_BASE, ITEM_BASE_LAYER,
};
use crate::types::{Direction, ElementRotation};

/// Rejection reason when the model key resolves to nothing.
pub const MODEL_NOT_FOUND: &str = "notfound";

/// Either a rendered image or the reason rendering was rejected. Cheap to
/// clone; cached hits share the same image allocation.
#[derive(Clone)]
pub struct RenderResult {
    image: Option<Arc<RgbaImage>>,
    rejection: Option<String>,
}

impl RenderResult {
    pub fn successful(image: RgbaImage) -> RenderResult {
        RenderResult {
            image: Some(Arc::new(image)),
            rejection: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> RenderResult {
        RenderResult {
            image: None,
            rejection: Some(reason.into()),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection.as_deref()
    }
}

/// Where the projected mesh lands on the output raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProjectionAnchor {
    /// Screen-centred, block fills the raster.
    #[default]
    Center,
    /// List-inventory anchor used for player-style renders.
    Player,
}

/// Hook between model resolution and rendering: may replace the model and
/// supply override textures keyed by texture variable name.
pub type PostResolveHook = dyn Fn(Option<BlockModel>) -> (Option<BlockModel>, HashMap<String, Arc<TextureResource>>)
    + Send
    + Sync;

/// All inputs of one render call.
pub struct RenderRequest<'a> {
    pub width: u32,
    pub height: u32,
    pub manager: &'a ResourceManager,
    pub post_resolve: Option<Arc<PostResolveHook>>,
    pub legacy: bool,
    pub model: String,
    pub display: DisplaySlot,
    pub predicates: BTreeMap<PredicateKey, f64>,
    pub provided_textures: HashMap<String, Arc<TextureResource>>,
    pub tint: TintData,
    pub enchanted: bool,
    pub glint_overlay: GlintOverlayProvider,
    pub glint_composite: GlintCompositeProvider,
    pub anchor: ProjectionAnchor,
}

impl<'a> RenderRequest<'a> {
    pub fn new(
        width: u32,
        height: u32,
        manager: &'a ResourceManager,
        model: impl Into<String>,
        display: DisplaySlot,
    ) -> RenderRequest<'a> {
        RenderRequest {
            width,
            height,
            manager,
            post_resolve: None,
            legacy: false,
            model: model.into(),
            display,
            predicates: BTreeMap::new(),
            provided_textures: HashMap::new(),
            tint: TintData::empty(),
            enchanted: false,
            glint_overlay: default_overlay_provider(),
            glint_composite: default_composite_provider(),
            anchor: ProjectionAnchor::Center,
        }
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_predicate(mut self, key: PredicateKey, value: f64) -> Self {
        self.predicates.insert(key, value);
        self
    }

    pub fn with_provided_texture(mut self, resource: Arc<TextureResource>) -> Self {
        self.provided_textures
            .insert(resource.location.clone(), resource);
        self
    }

    pub fn with_tint(mut self, tint: TintData) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_enchanted(mut self, enchanted: bool) -> Self {
        self.enchanted = enchanted;
        self
    }

    pub fn with_post_resolve(mut self, hook: Arc<PostResolveHook>) -> Self {
        self.post_resolve = Some(hook);
        self
    }

    pub fn with_anchor(mut self, anchor: ProjectionAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_glint_providers(
        mut self,
        overlay: GlintOverlayProvider,
        composite: GlintCompositeProvider,
    ) -> Self {
        self.glint_overlay = overlay;
        self.glint_composite = composite;
        self
    }
}

/// Turns resolved models into raster images. Owns the face-baking worker
/// pool; the render cache lives on the resource manager as a pluggable
/// registry.
pub struct ModelRenderer {
    config: Arc<RuntimeConfig>,
    pool: RenderPool,
    valid: AtomicBool,
}

impl ModelRenderer {
    /// Create a renderer whose pool size follows `thread_policy`,
    /// re-checked every [`DEFAULT_RESIZE_INTERVAL`].
    pub fn new(
        config: Arc<RuntimeConfig>,
        thread_policy: impl Fn() -> usize + Send + Sync + 'static,
    ) -> ModelRenderer {
        Self::with_resize_interval(config, thread_policy, DEFAULT_RESIZE_INTERVAL)
    }

    pub fn with_resize_interval(
        config: Arc<RuntimeConfig>,
        thread_policy: impl Fn() -> usize + Send + Sync + 'static,
        interval: Duration,
    ) -> ModelRenderer {
        ModelRenderer {
            config,
            pool: RenderPool::with_resize_interval(thread_policy, interval),
            valid: AtomicBool::new(true),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Shut down the worker pool and the pool-resize control task.
    /// Idempotent; renders after close fail.
    pub fn close(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            self.pool.close();
        }
    }

    /// Render a model to an image, or report why it could not be rendered.
    ///
    /// The call blocks until all element tasks complete. Per-element task
    /// failures degrade to a missing-texture cube; only closed sessions
    /// and invalid element rotation angles are hard errors.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderResult> {
        if !self.is_valid() {
            return Err(RasterError::Closed("model renderer"));
        }
        if !request.manager.is_valid() {
            return Err(RasterError::Closed("resource manager"));
        }

        let resolved =
            request
                .manager
                .models()
                .resolve(&request.model, request.legacy, &request.predicates);
        let (model, override_textures) = match &request.post_resolve {
            Some(hook) => (hook.as_ref())(resolved),
            None => (resolved, HashMap::new()),
        };
        let Some(model) = model else {
            return Ok(RenderResult::rejected(MODEL_NOT_FOUND));
        };

        let key = self.cache_key(request, &override_textures);
        let cache = request
            .manager
            .resource_registry::<RenderCache>(RenderCache::IDENTIFIER);
        if let Some(cache) = cache {
            if let Some(hit) = cache.get(&key) {
                if hit.is_successful() {
                    return Ok(hit);
                }
            }
        }

        let outcome = match model.parent.as_deref() {
            Some(parent) if parent == ITEM_BASE => {
                self.render_sprite(request, &model, &override_textures)?
            }
            Some(parent) if parent.contains('/') => RenderResult::rejected(parent.to_string()),
            _ => self.render_elements(request, &model, &override_textures)?,
        };

        if outcome.is_successful() {
            if let Some(cache) = cache {
                cache.put(key, outcome.clone());
            }
        }
        Ok(outcome)
    }

    /// Typed fingerprint of everything that can change the output pixels.
    fn cache_key(
        &self,
        request: &RenderRequest,
        override_textures: &HashMap<String, Arc<TextureResource>>,
    ) -> CacheKey {
        let mut provided: Vec<(String, u64)> = request
            .provided_textures
            .iter()
            .map(|(k, v)| (k.clone(), v.content_hash))
            .collect();
        provided.sort();
        let mut overrides: Vec<(String, u64)> = override_textures
            .iter()
            .map(|(k, v)| (k.clone(), v.content_hash))
            .collect();
        overrides.sort();

        CacheKey {
            width: request.width,
            height: request.height,
            session: request.manager.session_id(),
            model: request.model.clone(),
            display: request.display,
            anchor: request.anchor,
            legacy: request.legacy,
            post_resolve: request
                .post_resolve
                .as_ref()
                .map(|hook| Arc::as_ptr(hook) as *const () as u64)
                .unwrap_or(0),
            predicates: request
                .predicates
                .iter()
                .map(|(k, v)| (*k, v.to_bits()))
                .collect(),
            provided_textures: provided,
            override_textures: overrides,
            tint: request.tint.fingerprint(),
            enchanted: request.enchanted,
        }
    }

    /// Render an element-based (cuboid) model: one pool task per element.
    fn render_elements(
        &self,
        request: &RenderRequest,
        model: &BlockModel,
        override_textures: &HashMap<String, Arc<TextureResource>>,
    ) -> Result<RenderResult> {
        // Content errors in rotation angles are fatal before any pool work
        // starts.
        for element in &model.elements {
            if let Some(rotation) = &element.rotation {
                rotation.rescale_factor()?;
            }
        }

        let cull_flags = compute_cull_flags(&model.elements);
        let glint_cache = Arc::new(GlintCache::new());
        let processed_cache: Arc<Mutex<HashMap<String, Arc<RgbaImage>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let count = model.elements.len();
        let (results_tx, results_rx) = crossbeam_channel::bounded(count.max(1));
        let cancelled = Arc::new(AtomicBool::new(false));

        for (index, element) in model.elements.iter().enumerate() {
            let bake = ElementBake {
                from: element.from,
                to: element.to,
                rotation: element.rotation.clone(),
                shade: element.shade,
                faces: self.resolve_face_inputs(
                    request,
                    model,
                    element,
                    override_textures,
                    &cull_flags[index],
                ),
                enchanted: request.enchanted,
                tint: request.tint.clone(),
                texture_resolution: self.config.texture_resolution,
                glint_cache: glint_cache.clone(),
                glint_provider: request.glint_overlay.clone(),
                processed_cache: processed_cache.clone(),
            };
            let results_tx = results_tx.clone();
            let cancelled = cancelled.clone();
            self.pool.execute(Box::new(move || {
                if cancelled.load(Ordering::Acquire) {
                    let _ = results_tx.send((
                        index,
                        Err(RasterError::RenderPool("cancelled".to_string())),
                    ));
                    return;
                }
                let baked = catch_unwind(AssertUnwindSafe(|| bake_element(bake)))
                    .unwrap_or_else(|_| {
                        Err(RasterError::RenderPool("element task panicked".to_string()))
                    });
                let _ = results_tx.send((index, baked));
            }))?;
        }
        drop(results_tx);

        let mut cuboids: Vec<Option<Cuboid>> = (0..count).map(|_| None).collect();
        let mut failed = false;
        for _ in 0..count {
            match results_rx.recv() {
                Ok((index, Ok(cuboid))) => cuboids[index] = Some(cuboid),
                Ok((_, Err(e))) => {
                    if !cancelled.swap(true, Ordering::AcqRel) {
                        log::error!("unable to generate model {}: {e}", model.location);
                    }
                    failed = true;
                }
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }

        let mesh = if failed {
            missing_cube()
        } else {
            MeshModel::new(cuboids.into_iter().flatten().collect())
        };
        Ok(self.composite(request, model, mesh, model.gui_light()))
    }

    /// Resolve each face's texture on the calling thread: override table
    /// by variable name, then caller-provided by location, then the shared
    /// texture index.
    fn resolve_face_inputs(
        &self,
        request: &RenderRequest,
        model: &BlockModel,
        element: &ModelElement,
        override_textures: &HashMap<String, Arc<TextureResource>>,
        cull_flags: &[bool; 6],
    ) -> [Option<FaceInput>; 6] {
        let mut inputs: [Option<FaceInput>; 6] = Default::default();
        for (i, side) in Direction::ALL.into_iter().enumerate() {
            let Some(face) = element.face(side) else {
                continue;
            };

            let override_resource = face
                .texture
                .strip_prefix('#')
                .and_then(|variable| override_textures.get(variable))
                .cloned();
            let location = model
                .texture_location(&face.texture)
                .map(|l| self.config.namespaced(&l));
            let resource = override_resource
                .or_else(|| {
                    location
                        .as_ref()
                        .and_then(|l| request.provided_textures.get(l).cloned())
                })
                .or_else(|| {
                    location
                        .as_ref()
                        .and_then(|l| request.manager.textures().get(l))
                });
            let Some(resource) = resource else {
                log::debug!(
                    "no texture for face {side} of {} ({})",
                    model.location,
                    face.texture
                );
                continue;
            };

            inputs[i] = Some(FaceInput {
                location: location.unwrap_or_else(|| face.texture.clone()),
                resource,
                side,
                uv: face.uv,
                rotation: face.rotation,
                tint_index: face.tintindex,
                hidden: cull_flags[i],
            });
        }
        inputs
    }

    /// Render a sprite-based (`builtin/generated`) model: composite the
    /// layers, tint and glint the sheet, then extrude it for lighting and
    /// display transforms.
    fn render_sprite(
        &self,
        request: &RenderRequest,
        model: &BlockModel,
        override_textures: &HashMap<String, Arc<TextureResource>>,
    ) -> Result<RenderResult> {
        let mut canvas = RgbaImage::new(self.config.internal_width, self.config.internal_height);

        let mut layer = 0;
        while let Some(texture_ref) = model.textures.get(&format!("{ITEM_BASE_LAYER}{layer}")) {
            let location = self.config.namespaced(texture_ref);
            let resource = override_textures
                .get("")
                .or_else(|| override_textures.get(&format!("{ITEM_BASE_LAYER}{layer}")))
                .cloned()
                .or_else(|| request.provided_textures.get(&location).cloned())
                .or_else(|| request.manager.textures().get(&location));
            match resource {
                Some(resource) => {
                    imageutil::draw_layer_scaled(&mut canvas, &resource.processed_image());
                }
                None => {
                    log::warn!("missing sprite layer {location} for {}", model.location);
                }
            }
            layer += 1;
        }

        canvas = request.tint.apply(canvas, 0);
        if request.enchanted {
            canvas = (request.glint_composite.as_ref())(canvas);
        }

        let mesh = sprite::extrude(&canvas, 16.0, 16.0, 16.0);
        let light = model.gui_light.unwrap_or(GuiLight::Front);
        Ok(self.composite(request, model, mesh, light))
    }

    /// Final compositing: block-centre origin, display transform for the
    /// requested slot (mirrored when a left-hand slot fell back to its
    /// right-hand counterpart), lighting, projection, output resize.
    fn composite(
        &self,
        request: &RenderRequest,
        model: &BlockModel,
        mut mesh: MeshModel,
        light: GuiLight,
    ) -> RenderResult {
        if request.anchor == ProjectionAnchor::Player {
            mesh.translate(DVec3::splat(-8.0));
            mesh.rotate_degrees(0.0, 180.0, 0.0);
            mesh.translate(DVec3::splat(8.0));
        }
        mesh.translate(DVec3::splat(-8.0));

        let (transform, mirrored) = model.display_transform(request.display);
        if let Some(transform) = transform {
            mesh.scale(DVec3::from_array(transform.scale));
            if mirrored {
                mesh.rotate_degrees(
                    transform.rotation[0],
                    -transform.rotation[1],
                    -transform.rotation[2],
                );
                mesh.translate(DVec3::new(
                    -transform.translation[0],
                    transform.translation[1],
                    transform.translation[2],
                ));
            } else {
                mesh.rotate_degrees(
                    transform.rotation[0],
                    transform.rotation[1],
                    transform.rotation[2],
                );
                mesh.translate(DVec3::from_array(transform.translation));
            }
        }

        mesh.update_lighting(
            DVec3::from_array(light.light_vector()),
            light.ambient_level(),
            light.max_level(),
        );

        let (internal_w, internal_h) = (self.config.internal_width, self.config.internal_height);
        let mut internal = RgbaImage::new(internal_w, internal_h);
        let affine = match request.anchor {
            ProjectionAnchor::Center => Affine2D::centered(internal_w, internal_h),
            ProjectionAnchor::Player => Affine2D::player_anchored(internal_w, internal_h),
        };
        mesh.render(&mut internal, &affine);

        let output = imageutil::resize_quality(&internal, request.width, request.height);
        RenderResult::successful(output)
    }
}

impl Drop for ModelRenderer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Everything one element task needs, resolved on the calling thread so
/// tasks borrow nothing from the session.
struct ElementBake {
    from: [f64; 3],
    to: [f64; 3],
    rotation: Option<ElementRotation>,
    shade: bool,
    faces: [Option<FaceInput>; 6],
    enchanted: bool,
    tint: TintData,
    texture_resolution: u32,
    glint_cache: Arc<GlintCache>,
    glint_provider: GlintOverlayProvider,
    processed_cache: Arc<Mutex<HashMap<String, Arc<RgbaImage>>>>,
}

struct FaceInput {
    location: String,
    resource: Arc<TextureResource>,
    side: Direction,
    uv: Option<[f64; 4]>,
    rotation: i32,
    tint_index: i32,
    hidden: bool,
}

/// Bake one element into a textured cuboid: per face, crop the UV window
/// out of the processed texture, rotate, tint and glint it, then apply the
/// element rotation.
fn bake_element(bake: ElementBake) -> Result<Cuboid> {
    let mut images: [Option<RgbaImage>; 6] = Default::default();
    let mut overlays: [Option<GlintOverlay>; 6] = Default::default();
    let mut hidden = [false; 6];

    for (i, input) in bake.faces.iter().enumerate() {
        let Some(input) = input else {
            continue;
        };
        hidden[i] = input.hidden;

        let uv = input
            .uv
            .unwrap_or_else(|| ModelElement::derive_uv(bake.from, bake.to, input.side));
        if (uv[2] - uv[0]).abs() < f64::EPSILON || (uv[3] - uv[1]).abs() < f64::EPSILON {
            continue;
        }

        // Blur/animation processing and upscaling are shared across faces
        // referencing the same texture.
        let base = {
            let mut cache = bake.processed_cache.lock();
            cache
                .entry(input.location.clone())
                .or_insert_with(|| {
                    Arc::new(imageutil::upscale_to_resolution(
                        &input.resource.processed_image(),
                        bake.texture_resolution,
                    ))
                })
                .clone()
        };

        let mut face_image = crop_uv_window(&base, uv);
        if input.rotation.rem_euclid(360) != 0 {
            face_image = imageutil::rotate_90_steps(&face_image, input.rotation);
        }
        face_image = bake.tint.apply(face_image, input.tint_index);

        if bake.enchanted {
            overlays[i] = Some(
                bake.glint_cache
                    .get_or_compute(&face_image, &bake.glint_provider),
            );
        }
        images[i] = Some(face_image);
    }

    let mut cuboid = Cuboid::from_corners(
        DVec3::from_array(bake.from),
        DVec3::from_array(bake.to),
        images,
    );
    cuboid.shade = bake.shade;
    for (i, overlay) in overlays.into_iter().enumerate() {
        if let Some(overlay) = overlay {
            let face = &mut cuboid.faces[i];
            face.overlays = overlay
                .overlays
                .into_iter()
                .zip(overlay.blending)
                .collect();
            face.overlay_factor = ENCHANTMENT_GLINT_FACTOR;
        }
        cuboid.faces[i].hidden = hidden[i];
    }

    if let Some(rotation) = &bake.rotation {
        let factor = rotation.rescale_factor()?;
        let origin = DVec3::from_array(rotation.origin);
        cuboid.translate(-origin);
        if factor != 1.0 {
            cuboid.scale(DVec3::splat(factor));
        }
        cuboid.rotate_axis(rotation.axis, rotation.angle);
        cuboid.translate(origin);
    }

    Ok(cuboid)
}

/// Cut the UV window out of a texture, in 0-16 UV space scaled to the
/// texture's pixels, honouring flipped rectangles with ceiling/floor
/// rounding so samples never bleed past the declared window.
fn crop_uv_window(base: &RgbaImage, uv: [f64; 4]) -> RgbaImage {
    let (w, h) = base.dimensions();
    let scale_x = w as f64 / 16.0;
    let scale_y = h as f64 / 16.0;
    let (u1, v1, u2, v2) = (
        uv[0] * scale_x,
        uv[1] * scale_y,
        uv[2] * scale_x,
        uv[3] * scale_y,
    );
    let flip_h = u1 > u2;
    let flip_v = v1 > v2;

    let (x1, dx) = if flip_h {
        let x1 = (w as f64 - u1).ceil();
        (x1, ((w as f64 - u2).floor() - x1).abs())
    } else {
        let x1 = u1.ceil();
        (x1, (u2.floor() - x1).abs())
    };
    let (y1, dy) = if flip_v {
        let y1 = (h as f64 - v1).ceil();
        (y1, ((h as f64 - v2).floor() - y1).abs())
    } else {
        let y1 = v1.ceil();
        (y1, (v2.floor() - y1).abs())
    };

    imageutil::sub_image(
        base,
        x1 as i64,
        y1 as i64,
        dx.max(1.0) as u32,
        dy.max(1.0) as u32,
        flip_h,
        flip_v,
    )
}

/// Which faces are dropped by cullface rules: a face whose declared cull
/// direction has a neighbouring element sitting flush against that bound
/// and fully covering its extent is a visual no-op. Rotated elements are
/// never considered, their geometry is no longer axis-aligned.
fn compute_cull_flags(elements: &[ModelElement]) -> Vec<[bool; 6]> {
    const EPS: f64 = 1e-6;
    let mut flags = vec![[false; 6]; elements.len()];

    for (ai, a) in elements.iter().enumerate() {
        if a.rotation.is_some() {
            continue;
        }
        for (si, side) in Direction::ALL.into_iter().enumerate() {
            let Some(face) = a.face(side) else {
                continue;
            };
            let Some(direction) = face.cullface else {
                continue;
            };
            let axis = direction.axis().index();
            let plane = if direction.is_positive() {
                a.to[axis]
            } else {
                a.from[axis]
            };
            let [c1, c2] = direction.axis().cross_axes();

            let covered = elements.iter().enumerate().any(|(bi, b)| {
                if bi == ai || b.rotation.is_some() {
                    return false;
                }
                if b.face(direction.opposite()).is_none() {
                    return false;
                }
                let facing_bound = if direction.is_positive() {
                    b.from[axis]
                } else {
                    b.to[axis]
                };
                (facing_bound - plane).abs() < EPS
                    && b.from[c1.index()] <= a.from[c1.index()] + EPS
                    && b.to[c1.index()] >= a.to[c1.index()] - EPS
                    && b.from[c2.index()] <= a.from[c2.index()] + EPS
                    && b.to[c2.index()] >= a.to[c2.index()] - EPS
            });
            if covered {
                flags[ai][si] = true;
            }
        }
    }
    flags
}

/// The degraded output when an element task fails: a unit cube wearing the
/// missing-texture checkerboard.
fn missing_cube() -> MeshModel {
    let missing = TextureIndex::missing_image(16, 16);
    let images: [Option<RgbaImage>; 6] = [
        Some(missing.clone()),
        Some(missing.clone()),
        Some(missing.clone()),
        Some(missing.clone()),
        Some(missing.clone()),
        Some(missing),
    ];
    MeshModel::new(vec![Cuboid::from_corners(
        DVec3::ZERO,
        DVec3::splat(16.0),
        images,
    )])
}

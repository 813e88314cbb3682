use anyhow::Context;
use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};

use kiln_engine::atlas::{AtlasDescriptor, AtlasPage, ImageRegion, TexturePacker};
use kiln_engine::batch::{Batcher, FlushStats, ObjectId};
use kiln_engine::mesh::{PackedMesh, TexturedMesh};
use kiln_engine::render::{GpuBackend, RenderCtx, RenderTarget, WgpuBackend};
use kiln_engine::shader::{ShaderCache, ShaderVariant, UniformKey};
use kiln_engine::transform::{TransformIndex, TransformTable};

use crate::cli::ViewerConfig;
use crate::shapes;

const EYE: Vec3 = Vec3::new(0.0, 1.5, 4.0);
const FOV_Y_DEGREES: f32 = 70.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 50.0;

const LIGHT_ORBIT_RADIUS: f32 = 3.0;
const LIGHT_ORBIT_SPEED: f32 = 1.0;
const LIGHT_BOB_AMPLITUDE: f32 = 1.0;
const AMBIENT_STRENGTH: f32 = 0.25;

const GENERATED_PAGE: (u32, u32) = (256, 128);

/// Light position at `t` seconds: orbit in the XZ plane, bobbing in Y.
pub fn light_position(t: f32) -> Vec3 {
    Vec3::new(
        LIGHT_ORBIT_RADIUS * (LIGHT_ORBIT_SPEED * t).cos(),
        LIGHT_BOB_AMPLITUDE * t.sin() + 1.0,
        LIGHT_ORBIT_RADIUS * (LIGHT_ORBIT_SPEED * t).sin(),
    )
}

/// Two images on one page: a checkerboard and a warm solid swatch.
pub fn generated_atlas() -> (AtlasDescriptor, Vec<RgbaImage>) {
    let (width, height) = GENERATED_PAGE;
    let half = width / 2;

    let page = RgbaImage::from_fn(width, height, |x, y| {
        if x < half {
            if ((x / 16) + (y / 16)) % 2 == 0 {
                Rgba([200, 200, 200, 255])
            } else {
                Rgba([60, 60, 70, 255])
            }
        } else {
            Rgba([255, 214, 140, 255])
        }
    });

    let descriptor = AtlasDescriptor {
        atlases: vec![AtlasPage { index: 0, width, height }],
        images: [
            (
                "checker".to_string(),
                ImageRegion { atlas: 0, x: 0, y: 0, width: half, height },
            ),
            (
                "glow".to_string(),
                ImageRegion { atlas: 0, x: half, y: 0, width: half, height },
            ),
        ]
        .into_iter()
        .collect(),
    };

    (descriptor, vec![page])
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Motion {
    Static,
    Spin,
    FollowLight,
}

struct SceneObject {
    id: ObjectId,
    variant: ShaderVariant,
    motion: Motion,
    transform: TransformIndex,
    mesh: PackedMesh,
}

/// Everything drawn by the viewer, plus the engine state drawing it.
pub struct Scene {
    cache: ShaderCache<WgpuBackend>,
    batcher: Batcher,
    packer: TexturePacker,
    transforms: TransformTable,
    objects: Vec<SceneObject>,
    lit: Option<ShaderVariant>,
    clear_color: wgpu::Color,
}

impl Scene {
    pub fn new(ctx: &RenderCtx<'_>, config: &ViewerConfig) -> anyhow::Result<Self> {
        let packer = match &config.atlas {
            Some(source) => TexturePacker::load(&source.descriptor, &source.pages)?,
            None => {
                let (descriptor, pages) = generated_atlas();
                TexturePacker::from_descriptor(descriptor, pages)
                    .context("generated atlas is invalid")?
            }
        };

        let renderer = &config.renderer;
        let mut backend = WgpuBackend::new(ctx, renderer.transform_table_capacity)?;
        backend.upload_atlas_pages(packer.pages())?;

        let cache = ShaderCache::new(backend, &renderer.variants)?;
        let batcher = Batcher::new(&cache);

        let lit = cache
            .variants()
            .find(|&v| v == ShaderVariant::AtlasTransformTableAmbientDiffuse);
        let unlit = cache
            .variants()
            .find(|&v| v == ShaderVariant::AtlasTransformTable);
        let fallback = cache.variants().next().context("no shader variants requested")?;

        let mut transforms = TransformTable::new(renderer.transform_table_capacity);
        let mut objects = Vec::new();

        let mut add = |mesh: TexturedMesh, variant: ShaderVariant, motion: Motion| -> anyhow::Result<()> {
            let transform = transforms.push(Mat4::IDENTITY)?;
            let mut mesh = packer.pack_mesh(&mesh)?;
            mesh.set_transform_index(transform);
            objects.push(SceneObject {
                id: objects.len() as ObjectId,
                variant,
                motion,
                transform,
                mesh,
            });
            Ok(())
        };

        let body = lit.unwrap_or(fallback);
        add(shapes::cube(1.5, &config.body_image), body, Motion::Spin)?;
        add(shapes::floor(12.0, -1.0, &config.body_image), body, Motion::Static)?;
        // The marker is the light itself; it should not be shaded by it.
        add(
            shapes::cube(0.2, &config.marker_image),
            unlit.unwrap_or(fallback),
            Motion::FollowLight,
        )?;

        log::info!(
            "scene: {} objects over {} variant(s), atlas generation {}",
            objects.len(),
            batcher.batches().len(),
            packer.generation()
        );

        Ok(Self {
            cache,
            batcher,
            packer,
            transforms,
            objects,
            lit,
            clear_color: renderer.clear_color,
        })
    }

    /// Sets frame uniforms, queues every object and flushes the batches.
    ///
    /// The recorded draws are replayed by [`encode`](Self::encode).
    pub fn update(&mut self, elapsed: f32, aspect: f32) -> FlushStats {
        let camera_to_clip =
            Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect.max(0.01), Z_NEAR, Z_FAR);
        let world_to_camera = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y);
        let light = light_position(elapsed);

        self.animate(elapsed, light);

        let variants: Vec<ShaderVariant> = self.cache.variants().collect();
        for variant in variants {
            // Failures are logged by the cache; the frame goes on.
            let _ = self.cache.set_uniform(variant, UniformKey::CameraToClip, camera_to_clip);
            let _ = self.cache.set_uniform(variant, UniformKey::WorldToCamera, world_to_camera);
            let _ = self.cache.set_uniform(variant, UniformKey::TransformTableOffset, 0_i32);
        }
        if let Some(lit) = self.lit {
            let _ = self.cache.set_uniform(lit, UniformKey::AmbientLightColor, Vec3::ONE);
            let _ = self.cache.set_uniform(lit, UniformKey::AmbientLightStrength, AMBIENT_STRENGTH);
            let _ = self.cache.set_uniform(lit, UniformKey::DiffuseLightPosition, light);
        }

        for object in &self.objects {
            if let Err(err) = self.packer.check_generation(&object.mesh) {
                log::warn!("object {}: {err}", object.id);
                continue;
            }
            // Rejections are logged by the batch.
            let _ = self
                .batcher
                .queue_draw(object.variant, object.id, &object.mesh.submission());
        }

        self.batcher.draw_everything(&mut self.cache)
    }

    /// Replays this frame's draws into `target`, clearing it first.
    pub fn encode(&mut self, target: &mut RenderTarget<'_>) -> usize {
        let clear = self.clear_color;
        self.cache.backend_mut().encode(target, Some(clear))
    }

    fn animate(&mut self, elapsed: f32, light: Vec3) {
        for object in &self.objects {
            let matrix = match object.motion {
                Motion::Static => continue,
                Motion::Spin => Mat4::from_rotation_y(elapsed * 0.5),
                Motion::FollowLight => Mat4::from_translation(light),
            };
            if let Err(err) = self.transforms.set(object.transform, matrix) {
                log::error!("object {}: {err}", object.id);
            }
        }

        if let Err(err) = self
            .cache
            .backend_mut()
            .upload_transform_table(self.transforms.matrices())
        {
            log::error!("transform upload failed: {err}");
        }
    }
}

use anyhow::Context;
use glam::Mat4;
use image::RgbaImage;

use crate::render::{GpuBackend, PackedVertex, RenderCtx, RenderTarget};
use crate::shader::{ProgramSource, ShaderError, UniformLocation};
use crate::transform::TransformError;

const MAT4_SIZE: u64 = 64;
const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Program handle issued by [`WgpuBackend`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct WgpuProgram(u32);

impl WgpuProgram {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct ProgramResources {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: usize,
    index_buffer: Option<wgpu::Buffer>,
    index_capacity: usize,
}

#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    program: WgpuProgram,
    index_count: u32,
}

/// wgpu implementation of [`GpuBackend`].
///
/// Bind group layout shared by every program:
/// - group 0: the program's own uniform block
/// - group 1: transform table (`capacity` × mat4)
/// - group 2: atlas pages (2D array texture) + sampler
///
/// Uniform and geometry uploads go through the queue immediately. Draws are
/// recorded and replayed into one render pass by [`encode`](Self::encode);
/// flush at most once per encoded pass, since queued buffer writes land
/// before the pass executes.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,

    globals_layout: wgpu::BindGroupLayout,

    transform_table_capacity: usize,
    transforms_layout: wgpu::BindGroupLayout,
    transforms_buffer: wgpu::Buffer,
    transforms_bind_group: wgpu::BindGroup,

    atlas_layout: wgpu::BindGroupLayout,
    atlas_sampler: wgpu::Sampler,
    atlas_bind_group: wgpu::BindGroup,

    programs: Vec<Option<ProgramResources>>,
    bound: Option<WgpuProgram>,
    pending: Vec<PendingDraw>,
}

impl WgpuBackend {
    /// Creates shared layouts, the transform-table buffer and a 1×1 white
    /// placeholder atlas page.
    pub fn new(ctx: &RenderCtx<'_>, transform_table_capacity: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(transform_table_capacity > 0, "transform table capacity must be non-zero");

        let table_bytes = transform_table_capacity as u64 * MAT4_SIZE;
        let limit = ctx.device.limits().max_uniform_buffer_binding_size as u64;
        anyhow::ensure!(
            table_bytes <= limit,
            "transform table of {transform_table_capacity} slots needs {table_bytes} bytes; \
             device uniform binding limit is {limit}"
        );

        let device = ctx.device.clone();
        let queue = ctx.queue.clone();

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln globals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    // Block size differs per variant.
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let transforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln transform table bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(table_bytes),
                },
                count: None,
            }],
        });

        let atlas_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln atlas bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let identity: Vec<[f32; 16]> =
            vec![Mat4::IDENTITY.to_cols_array(); transform_table_capacity];
        let transforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln transform table ubo"),
            size: table_bytes,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&transforms_buffer, 0, bytemuck::cast_slice(&identity));

        let transforms_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln transform table bind group"),
            layout: &transforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: transforms_buffer.as_entire_binding(),
            }],
        });

        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln atlas sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let placeholder = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let atlas_bind_group = create_atlas_bind_group(
            &device,
            &queue,
            &atlas_layout,
            &atlas_sampler,
            std::slice::from_ref(&placeholder),
        );

        let backend = Self {
            device,
            queue,
            surface_format: ctx.surface_format,
            depth_format: ctx.depth_format,
            globals_layout,
            transform_table_capacity,
            transforms_layout,
            transforms_buffer,
            transforms_bind_group,
            atlas_layout,
            atlas_sampler,
            atlas_bind_group,
            programs: Vec::new(),
            bound: None,
            pending: Vec::new(),
        };

        log::debug!(
            "wgpu backend ready: {transform_table_capacity} transform slots, surface {:?}, depth {:?}",
            backend.surface_format,
            backend.depth_format
        );
        Ok(backend)
    }

    /// Replays the recorded draws into a single render pass.
    ///
    /// With `clear`, color is cleared to it and depth to 1.0; otherwise the
    /// attachments are loaded. Returns the number of draws encoded. The
    /// pending list is emptied.
    pub fn encode(&mut self, target: &mut RenderTarget<'_>, clear: Option<wgpu::Color>) -> usize {
        let mut draws = std::mem::take(&mut self.pending);

        let color_load = match clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let depth_load = match clear {
            Some(_) => wgpu::LoadOp::Clear(1.0),
            None => wgpu::LoadOp::Load,
        };

        let mut encoded = 0;
        {
            let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln batch pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let (width, height) = target.size;
            if width > 0 && height > 0 {
                rpass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            }

            rpass.set_bind_group(1, &self.transforms_bind_group, &[]);
            rpass.set_bind_group(2, &self.atlas_bind_group, &[]);

            let mut current: Option<WgpuProgram> = None;
            for draw in &draws {
                let Some(program) = self.programs.get(draw.program.index()).and_then(Option::as_ref)
                else {
                    log::warn!("skipping draw for released program {:?}", draw.program);
                    continue;
                };
                let (Some(vbo), Some(ibo)) =
                    (program.vertex_buffer.as_ref(), program.index_buffer.as_ref())
                else {
                    continue;
                };

                if current != Some(draw.program) {
                    rpass.set_pipeline(&program.pipeline);
                    rpass.set_bind_group(0, &program.bind_group, &[]);
                    current = Some(draw.program);
                }

                rpass.set_vertex_buffer(0, vbo.slice(..));
                rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.index_count, 0, 0..1);
                encoded += 1;
            }
        }

        // Keep the allocation for the next frame.
        draws.clear();
        self.pending = draws;
        encoded
    }

    fn program_mut(&mut self, program: WgpuProgram) -> Option<&mut ProgramResources> {
        self.programs.get_mut(program.index()).and_then(Option::as_mut)
    }

    fn build_pipeline(&self, source: &ProgramSource) -> (wgpu::RenderPipeline, wgpu::Buffer, wgpu::BindGroup) {
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(source.label),
            bind_group_layouts: &[&self.globals_layout, &self.transforms_layout, &self.atlas_layout],
            immediate_size: 0,
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(source.label),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[PackedVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(source.label),
            size: source.uniform_block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(source.label),
            layout: &self.globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        (pipeline, uniform_buffer, bind_group)
    }
}

impl GpuBackend for WgpuBackend {
    type Program = WgpuProgram;

    fn transform_table_capacity(&self) -> usize {
        self.transform_table_capacity
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<Self::Program, ShaderError> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let (pipeline, uniform_buffer, bind_group) = self.build_pipeline(source);
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(ShaderError::Compile {
                variant: source.variant,
                message: err.to_string(),
            });
        }

        let handle = WgpuProgram(self.programs.len() as u32);
        self.programs.push(Some(ProgramResources {
            label: source.label,
            pipeline,
            uniform_buffer,
            bind_group,
            vertex_buffer: None,
            vertex_capacity: 0,
            index_buffer: None,
            index_capacity: 0,
        }));
        Ok(handle)
    }

    fn release_program(&mut self, program: Self::Program) {
        if let Some(slot) = self.programs.get_mut(program.index()) {
            *slot = None;
        }
        if self.bound == Some(program) {
            self.bound = None;
        }
        self.pending.retain(|d| d.program != program);
    }

    fn bind_program(&mut self, program: Self::Program) {
        self.bound = Some(program);
    }

    fn write_uniform(&mut self, program: Self::Program, location: UniformLocation, bytes: &[u8]) {
        let Some(resources) = self.programs.get(program.index()).and_then(Option::as_ref) else {
            return;
        };
        self.queue
            .write_buffer(&resources.uniform_buffer, location.offset as u64, bytes);
    }

    fn upload_geometry(&mut self, program: Self::Program, vertices: &[PackedVertex], indices: &[u32]) {
        let device = self.device.clone();
        let queue = self.queue.clone();
        let Some(resources) = self.program_mut(program) else {
            return;
        };

        if vertices.len() > resources.vertex_capacity || resources.vertex_buffer.is_none() {
            let new_cap = vertices.len().next_power_of_two().max(1024);
            resources.vertex_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(resources.label),
                size: (new_cap * std::mem::size_of::<PackedVertex>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            resources.vertex_capacity = new_cap;
        }

        if indices.len() > resources.index_capacity || resources.index_buffer.is_none() {
            let new_cap = indices.len().next_power_of_two().max(1024);
            resources.index_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(resources.label),
                size: (new_cap * std::mem::size_of::<u32>()) as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            resources.index_capacity = new_cap;
        }

        if let Some(vbo) = resources.vertex_buffer.as_ref() {
            queue.write_buffer(vbo, 0, bytemuck::cast_slice(vertices));
        }
        if let Some(ibo) = resources.index_buffer.as_ref() {
            queue.write_buffer(ibo, 0, bytemuck::cast_slice(indices));
        }
    }

    fn draw_indexed(&mut self, program: Self::Program, index_count: u32) {
        if self.bound != Some(program) {
            log::debug!("draw issued for {program:?} while {:?} is bound", self.bound);
        }
        self.pending.push(PendingDraw { program, index_count });
    }

    fn upload_transform_table(&mut self, matrices: &[Mat4]) -> Result<(), TransformError> {
        if matrices.len() > self.transform_table_capacity {
            return Err(TransformError::CapacityExceeded {
                capacity: self.transform_table_capacity,
            });
        }
        let cols: Vec<[f32; 16]> = matrices.iter().map(Mat4::to_cols_array).collect();
        self.queue
            .write_buffer(&self.transforms_buffer, 0, bytemuck::cast_slice(&cols));
        Ok(())
    }

    fn upload_atlas_pages(&mut self, pages: &[RgbaImage]) -> anyhow::Result<()> {
        let first = pages.first().context("at least one atlas page is required")?;
        let (width, height) = first.dimensions();
        anyhow::ensure!(
            pages.iter().all(|p| p.dimensions() == (width, height)),
            "atlas pages must share one size to live in a texture array"
        );

        let limits = self.device.limits();
        anyhow::ensure!(
            width <= limits.max_texture_dimension_2d && height <= limits.max_texture_dimension_2d,
            "atlas page {width}x{height} exceeds device limit {}",
            limits.max_texture_dimension_2d
        );
        anyhow::ensure!(
            pages.len() as u32 <= limits.max_texture_array_layers,
            "{} atlas pages exceed device limit of {} array layers",
            pages.len(),
            limits.max_texture_array_layers
        );

        self.atlas_bind_group = create_atlas_bind_group(
            &self.device,
            &self.queue,
            &self.atlas_layout,
            &self.atlas_sampler,
            pages,
        );
        log::info!("uploaded {} atlas page(s) of {width}x{height}", pages.len());
        Ok(())
    }
}

fn create_atlas_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    pages: &[RgbaImage],
) -> wgpu::BindGroup {
    let (width, height) = pages.first().map_or((1, 1), |p| p.dimensions());

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("kiln atlas pages"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: pages.len().max(1) as u32,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ATLAS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (layer, page) in pages.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            page.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    // A single-layer texture defaults to a D2 view; the layout wants D2Array.
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("kiln atlas pages view"),
        dimension: Some(wgpu::TextureViewDimension::D2Array),
        ..Default::default()
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("kiln atlas bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

//! Alpha-mask compositor.
//!
//! Produces a copy of a color frame whose alpha is multiplied by the red
//! channel of a mask frame (typically a body-index or depth-derived matte).
//! One compositor owns one compiled effect and one reusable render target.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use glam::Mat4;
use wgpu::{Device, Queue, Texture};

use super::context::GraphicsGuard;
use super::effect::EffectSource;
use super::graphics_lock::enter_graphics;
use super::render_target::RenderTarget;
use crate::config::{get_compositor_config, CompositorConfig};
use crate::error::{MatteError, MatteResult};

pub const GLOBALS_PARAM: &str = "globals";
pub const COLOR_PARAM: &str = "color_image";
pub const MASK_PARAM: &str = "mask_image";
pub const SAMPLER_PARAM: &str = "texture_sampler";
pub const DRAW_TECHNIQUE: &str = "draw";

/// Built-in alpha mask effect.
pub const ALPHA_MASK_SHADER: &str = r#"
// technique draw: vs_default ps_alpha_mask

struct Globals {
    view_proj: mat4x4<f32>,
    sprite_size: vec4<f32>,     // width, height, 0, 0
}

@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var color_image: texture_2d<f32>;
@group(0) @binding(2) var mask_image: texture_2d<f32>;
@group(0) @binding(3) var texture_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

// Four-vertex triangle strip covering the sprite in pixel space.
@vertex
fn vs_default(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32(vertex_index & 1u), f32((vertex_index >> 1u) & 1u));
    var output: VertexOutput;
    output.position = globals.view_proj * vec4<f32>(corner * globals.sprite_size.xy, 0.0, 1.0);
    output.uv = corner;
    return output;
}

@fragment
fn ps_alpha_mask(input: VertexOutput) -> @location(0) vec4<f32> {
    var color = textureSample(color_image, texture_sampler, input.uv);
    let mask = textureSample(mask_image, texture_sampler, input.uv);
    color.a = color.a * mask.r;
    return color;
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    sprite_size: [f32; 4],
}

/// Binding slots resolved from the effect.
#[derive(Debug, Clone, Copy)]
struct Slots {
    globals: u32,
    color: u32,
    mask: u32,
    sampler: u32,
}

/// Every GPU object the compositor owns. Dropped only under the graphics guard.
struct GpuState {
    device: Arc<Device>,
    queue: Arc<Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    target: RenderTarget,
}

/// GPU pipeline applying a mask to a color frame's alpha channel.
pub struct AlphaMaskCompositor {
    gpu: ManuallyDrop<GpuState>,
    slots: Slots,
    ortho_near: f32,
    ortho_far: f32,
    frames: u64,
}

impl AlphaMaskCompositor {
    /// Create a compositor with the global config.
    pub fn new(gfx: &GraphicsGuard<'_>) -> MatteResult<Self> {
        Self::with_config(gfx, &get_compositor_config())
    }

    pub fn with_config(gfx: &GraphicsGuard<'_>, config: &CompositorConfig) -> MatteResult<Self> {
        let effect = EffectSource::parse("Alpha Mask Effect", ALPHA_MASK_SHADER)?;
        Self::with_source(gfx, &effect, config)
    }

    /// Build from a custom effect exposing the same parameters and technique.
    pub fn with_source(
        gfx: &GraphicsGuard<'_>,
        effect: &EffectSource,
        config: &CompositorConfig,
    ) -> MatteResult<Self> {
        let device = Arc::clone(gfx.device());
        let queue = Arc::clone(gfx.queue());

        let shader = effect.compile(&device)?;

        let globals = effect.param(GLOBALS_PARAM)?;
        let color = effect.param(COLOR_PARAM)?;
        let mask = effect.param(MASK_PARAM)?;
        let sampler_slot = effect.param(SAMPLER_PARAM)?;
        let technique = effect.technique(DRAW_TECHNIQUE)?;

        if [color, mask, sampler_slot]
            .iter()
            .any(|p| p.group != globals.group)
            || globals.group != 0
        {
            return Err(MatteError::PipelineCreation(format!(
                "{}: all parameters must be bound in group 0",
                effect.label()
            )));
        }
        let slots = Slots {
            globals: globals.binding,
            color: color.binding,
            mask: mask.binding,
            sampler: sampler_slot.binding,
        };

        let format = config.output_format.to_wgpu();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Alpha Mask Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: slots.globals,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(slots.color),
                texture_entry(slots.mask),
                wgpu::BindGroupLayoutEntry {
                    binding: slots.sampler,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Alpha Mask Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Alpha Mask Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(technique.vertex.as_str()),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(technique.fragment.as_str()),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    // Output replaces the target; no blending.
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(MatteError::PipelineCreation(err.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Alpha Mask Globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Alpha Mask Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        log::info!(
            "[COMPOSITOR] Alpha mask compositor ready ({:?}, technique '{}')",
            format,
            DRAW_TECHNIQUE
        );

        Ok(Self {
            gpu: ManuallyDrop::new(GpuState {
                device,
                queue,
                pipeline,
                bind_group_layout,
                uniform_buffer,
                sampler,
                target: RenderTarget::new(format, config.max_target_dimension),
            }),
            slots,
            ortho_near: config.ortho_near,
            ortho_far: config.ortho_far,
            frames: 0,
        })
    }

    /// Composite one frame.
    ///
    /// The output has `color`'s size, its RGB and `alpha * mask.r`. Returns
    /// `None` (frame dropped) when the render target cannot be prepared or the
    /// GPU rejects the frame; the compositor stays usable either way.
    pub fn filter(&mut self, gfx: &GraphicsGuard<'_>, color: &Texture, mask: &Texture) -> Option<&Texture> {
        let gpu = &mut *self.gpu;
        if !gfx.owns_device(&gpu.device) {
            log::warn!("[COMPOSITOR] filter called with a guard for another device");
            return None;
        }

        let (width, height) = (color.width(), color.height());

        gpu.target.reset();
        let target_view = match gpu.target.begin(&gpu.device, width, height) {
            Ok(view) => view,
            Err(e) => {
                log::warn!("[COMPOSITOR] Dropping frame {}x{}: {}", width, height, e);
                return None;
            }
        };

        let view_proj = Mat4::orthographic_rh(
            0.0,
            width as f32,
            height as f32,
            0.0,
            self.ortho_near,
            self.ortho_far,
        );
        let globals = Globals {
            view_proj: view_proj.to_cols_array_2d(),
            sprite_size: [width as f32, height as f32, 0.0, 0.0],
        };

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        gpu.queue
            .write_buffer(&gpu.uniform_buffer, 0, bytemuck::cast_slice(&[globals]));

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let mask_view = mask.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Alpha Mask Bind Group"),
            layout: &gpu.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: self.slots.globals,
                    resource: gpu.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: self.slots.color,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: self.slots.mask,
                    resource: wgpu::BindingResource::TextureView(&mask_view),
                },
                wgpu::BindGroupEntry {
                    binding: self.slots.sampler,
                    resource: wgpu::BindingResource::Sampler(&gpu.sampler),
                },
            ],
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Alpha Mask Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Alpha Mask Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&gpu.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..4, 0..1);
        }

        gpu.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            log::warn!("[COMPOSITOR] Dropping frame {}x{}: {}", width, height, err);
            return None;
        }

        gpu.target.end();
        self.frames += 1;
        if self.frames == 1 {
            log::debug!("[COMPOSITOR] First frame composited ({}x{})", width, height);
        }
        gpu.target.texture()
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.gpu.target.format()
    }

    pub fn render_target(&self) -> &RenderTarget {
        &self.gpu.target
    }

    /// Frames composited successfully so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

impl Drop for AlphaMaskCompositor {
    fn drop(&mut self) {
        let _graphics = enter_graphics();
        self.gpu.target.release();
        // SAFETY: `gpu` is dropped exactly once, here, and never touched afterwards.
        unsafe { ManuallyDrop::drop(&mut self.gpu) };
        log::debug!("[COMPOSITOR] Released after {} frames", self.frames);
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

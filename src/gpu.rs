//! GPU [`Surface`] drawing straight into a window.
//!
//! Stars and links are both drawn as instanced quads. A star is a segment
//! whose two ends coincide, so one shader handles both: the fragment stage
//! measures the distance to the segment and turns it into coverage.
//!
//! Drawing calls only record primitives. [`GpuSurface::present`] uploads
//! them and submits one render pass per run of the same blend mode.

use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use winit::window::Window;

use crate::error::GpuError;
use crate::render::{BlendMode, Surface};

/// Star and link shader.
pub const PRIMITIVE_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;

struct PrimitiveInput {
    @location(0) from_pos: vec2<f32>,
    @location(1) to_pos: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) extent: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) pixel: vec2<f32>,
    @location(1) from_pos: vec2<f32>,
    @location(2) to_pos: vec2<f32>,
    @location(3) color: vec4<f32>,
    @location(4) extent: f32,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    prim: PrimitiveInput,
) -> VertexOutput {
    // x runs along the segment, y across it
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, -1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
    );
    let corner = corners[vertex_index];

    let along = prim.to_pos - prim.from_pos;
    let len = length(along);
    var dir = vec2<f32>(1.0, 0.0);
    if len > 0.0001 {
        dir = along / len;
    }
    let normal = vec2<f32>(-dir.y, dir.x);

    // One pixel of padding for the anti-aliased rim
    let pad = prim.extent + 1.0;
    let start = prim.from_pos - dir * pad;
    let pixel = start + dir * (corner.x * (len + 2.0 * pad)) + normal * (corner.y * pad);

    let ndc = vec2<f32>(
        pixel.x / uniforms.resolution.x * 2.0 - 1.0,
        1.0 - pixel.y / uniforms.resolution.y * 2.0,
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(ndc, 0.0, 1.0);
    out.pixel = pixel;
    out.from_pos = prim.from_pos;
    out.to_pos = prim.to_pos;
    out.color = prim.color;
    out.extent = prim.extent;
    return out;
}

fn segment_distance(p: vec2<f32>, a: vec2<f32>, b: vec2<f32>) -> f32 {
    let ab = b - a;
    let len_sq = dot(ab, ab);
    var t = 0.0;
    if len_sq > 0.0 {
        t = clamp(dot(p - a, ab) / len_sq, 0.0, 1.0);
    }
    return distance(p, a + ab * t);
}

fn coverage(pixel: vec2<f32>, a: vec2<f32>, b: vec2<f32>, extent: f32) -> f32 {
    return clamp(extent + 0.5 - segment_distance(pixel, a, b), 0.0, 1.0);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let alpha = coverage(in.pixel, in.from_pos, in.to_pos, in.extent) * in.color.a;
    if alpha <= 0.0 {
        discard;
    }
    return vec4<f32>(in.color.rgb, alpha);
}

@fragment
fn fs_premultiplied(in: VertexOutput) -> @location(0) vec4<f32> {
    let alpha = coverage(in.pixel, in.from_pos, in.to_pos, in.extent) * in.color.a;
    if alpha <= 0.0 {
        discard;
    }
    return vec4<f32>(in.color.rgb * alpha, alpha);
}
"#;

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.05,
    a: 1.0,
};

/// One star or link, in pixel coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Primitive {
    pub from: [f32; 2],
    pub to: [f32; 2],
    pub color: [f32; 4],
    /// Circle radius, or half the line width.
    pub extent: f32,
    _pad: [f32; 3],
}

impl Primitive {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4, 3 => Float32];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Primitive>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    resolution: [f32; 2],
    _pad: [f32; 2],
}

/// Consecutive primitives sharing a blend mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub mode: BlendMode,
    pub range: Range<u32>,
}

/// CPU side of the GPU surface: the primitives of the current frame.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    primitives: Vec<Primitive>,
    batches: Vec<Batch>,
    mode: BlendMode,
    global_alpha: f32,
}

impl DrawList {
    pub fn new() -> Self {
        Self {
            global_alpha: 1.0,
            ..Default::default()
        }
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
        self.batches.clear();
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.mode = mode;
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
    }

    fn push(&mut self, from: Vec2, to: Vec2, extent: f32, color: Vec4) {
        let alpha = color.w * self.global_alpha;
        if alpha <= 0.0 || !from.is_finite() || !to.is_finite() || !extent.is_finite() {
            return;
        }

        let index = self.primitives.len() as u32;
        self.primitives.push(Primitive {
            from: from.to_array(),
            to: to.to_array(),
            color: color.truncate().extend(alpha).to_array(),
            extent: extent.max(0.0),
            _pad: [0.0; 3],
        });

        let mode = self.mode;
        if let Some(batch) = self.batches.last_mut().filter(|b| b.mode == mode) {
            batch.range.end = index + 1;
        } else {
            self.batches.push(Batch {
                mode,
                range: index..index + 1,
            });
        }
    }

    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Vec4) {
        self.push(center, center, radius, color);
    }

    pub fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Vec4) {
        self.push(from, to, width * 0.5, color);
    }
}

/// Blend state for a mode.
///
/// Lighten keeps the per-channel maximum, which only works on premultiplied
/// color; see [`fragment_entry`].
pub fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    match mode {
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
        BlendMode::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        },
        BlendMode::Lighten => {
            let max = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Max,
            };
            wgpu::BlendState {
                color: max,
                alpha: max,
            }
        }
    }
}

/// Fragment entry point matching [`blend_state`].
pub fn fragment_entry(mode: BlendMode) -> &'static str {
    match mode {
        BlendMode::Lighten => "fs_premultiplied",
        BlendMode::Alpha | BlendMode::Additive => "fs_main",
    }
}

struct Pipelines {
    alpha: wgpu::RenderPipeline,
    lighten: wgpu::RenderPipeline,
    additive: wgpu::RenderPipeline,
}

impl Pipelines {
    fn get(&self, mode: BlendMode) -> &wgpu::RenderPipeline {
        match mode {
            BlendMode::Alpha => &self.alpha,
            BlendMode::Lighten => &self.lighten,
            BlendMode::Additive => &self.additive,
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    mode: BlendMode,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Starfield Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Primitive::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry(mode)),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend_state(mode)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
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
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// A window surface the engine draws on directly.
pub struct GpuSurface {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipelines: Pipelines,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    list: DrawList,
}

impl GpuSurface {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Starfield Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GpuError::NoAdapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Starfield Uniform Buffer"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Starfield Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Starfield Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Starfield Shader"),
            source: wgpu::ShaderSource::Wgsl(PRIMITIVE_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Starfield Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipelines = Pipelines {
            alpha: create_pipeline(&device, &pipeline_layout, &shader, config.format, BlendMode::Alpha),
            lighten: create_pipeline(&device, &pipeline_layout, &shader, config.format, BlendMode::Lighten),
            additive: create_pipeline(&device, &pipeline_layout, &shader, config.format, BlendMode::Additive),
        };

        let instance_capacity = 256;
        let instance_buffer = Self::create_instance_buffer(&device, instance_capacity);

        log::info!("GPU surface ready, format {:?}", config.format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipelines,
            uniform_buffer,
            bind_group,
            instance_buffer,
            instance_capacity,
            list: DrawList::new(),
        })
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Starfield Instance Buffer"),
            size: (capacity * std::mem::size_of::<Primitive>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Reconfigure the surface at its current size, e.g. after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Primitives recorded for the current frame.
    pub fn draw_list(&self) -> &DrawList {
        &self.list
    }

    /// Upload the recorded frame and show it.
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = Uniforms {
            resolution: [self.config.width as f32, self.config.height as f32],
            _pad: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let count = self.list.primitives().len();
        if count > self.instance_capacity {
            self.instance_capacity = count.next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(&self.device, self.instance_capacity);
            log::debug!("instance buffer grown to {}", self.instance_capacity);
        }
        if count > 0 {
            self.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(self.list.primitives()),
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Starfield Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Starfield Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            for batch in self.list.batches() {
                render_pass.set_pipeline(self.pipelines.get(batch.mode));
                render_pass.draw(0..6, batch.range.clone());
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl Surface for GpuSurface {
    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn clear(&mut self) {
        self.list.clear();
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.list.set_blend_mode(mode);
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.list.set_global_alpha(alpha);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Vec4) {
        self.list.fill_circle(center, radius, color);
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Vec4) {
        self.list.stroke_line(from, to, width, color);
    }
}

//! wgpu two-pass cloud compositor.
//!
//! Pass 1 blends the six halves into an `R8Unorm` intensity target. The target is read back,
//! seam-repaired on the host and uploaded again, then pass 2 applies the half swap, the pole
//! mirror and the frame overlay into an `Rgba8Unorm` target. wgpu textures are addressed
//! top-left first, so the read-back rows need no vertical flip.

use tracing::{debug, info};

use crate::assets::sources::ChannelSources;
use crate::clouds::channels::MergedPair;
use crate::clouds::compositor::{CloudLayers, derive_layers, resize_frame};
use crate::clouds::seam::fill_seam;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};
use crate::render::backend::CloudBackend;

const FULLSCREEN_VS: &str = r#"
@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  return vec4<f32>(p[vi], 0.0, 1.0);
}
"#;

const BLEND_FS: &str = r#"
@group(0) @binding(0) var ir_left: texture_2d<f32>;
@group(0) @binding(1) var ir_right: texture_2d<f32>;
@group(0) @binding(2) var dust_left: texture_2d<f32>;
@group(0) @binding(3) var dust_right: texture_2d<f32>;
@group(0) @binding(4) var vis_left: texture_2d<f32>;
@group(0) @binding(5) var vis_right: texture_2d<f32>;

fn merged(left: texture_2d<f32>, right: texture_2d<f32>, x: i32, y: i32) -> vec3<f32> {
  let half = i32(textureDimensions(right).x);
  var c: vec4<f32>;
  if (x < half) {
    c = textureLoad(right, vec2<i32>(x, y), 0);
  } else {
    c = textureLoad(left, vec2<i32>(x - half, y), 0);
  }
  return round(c.rgb * 255.0);
}

fn screen(a: f32, b: f32) -> f32 {
  return (1.0 - (1.0 - a / 255.0) * (1.0 - b / 255.0)) * 255.0;
}

fn gamma(g: f32, v: f32) -> f32 {
  let x = clamp(v / 255.0, 0.0, 1.0);
  if (x <= 0.0) {
    return 0.0;
  }
  return 255.0 * pow(x, 1.0 / g);
}

fn ir_remap(v: f32) -> f32 {
  if (v < 72.0) {
    return 0.0;
  }
  if (v > 178.0) {
    return 255.0;
  }
  return (v - 72.0) / (178.0 - 72.0) * 255.0;
}

@fragment
fn fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
  let x = i32(pos.x);
  let y = i32(pos.y);
  let ir = merged(ir_left, ir_right, x, y);
  let dust = merged(dust_left, dust_right, x, y);
  let vis = merged(vis_left, vis_right, x, y);

  let inv_b = 255.0 - dust.b;
  let masked_red = (dust.r / 255.0) * (inv_b / 255.0) * 255.0;
  let dust_signal = screen(masked_red, 0.5 * inv_b);
  let ir_signal = gamma(1.46, ir_remap(ir.r));
  let combined = gamma(2.0, screen(dust_signal, 0.77 * ir_signal));

  let hi = max(max(vis.r, vis.g), vis.b);
  let lo = min(min(vis.r, vis.g), vis.b);
  let selected = (hi - lo < 25.0)
    || (vis.r < vis.g && abs(vis.g - vis.b) < 11.0 && vis.g > 150.0);
  var value = combined;
  if (selected) {
    value = max(gamma(1.5, hi), combined);
  }
  return vec4<f32>(floor(clamp(value, 0.0, 255.0)) / 255.0, 0.0, 0.0, 1.0);
}
"#;

const FINISH_FS: &str = r#"
@group(0) @binding(0) var field: texture_2d<f32>;
@group(0) @binding(1) var frame: texture_2d<f32>;

fn mul_div255(a: f32, b: f32) -> f32 {
  return floor((a * b + 127.0) / 255.0);
}

@fragment
fn fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
  let dims = vec2<i32>(textureDimensions(field));
  let w = dims.x;
  let h = dims.y;
  let m = h / 8;
  let x = i32(pos.x);
  let y = i32(pos.y);

  var sy = y;
  if (y < m) {
    sy = 2 * m - 1 - y;
  } else if (y >= h - m) {
    sy = 2 * h - 1 - 2 * m - y;
  }
  let sx = (x + w / 2) % w;
  let v = round(textureLoad(field, vec2<i32>(sx, sy), 0).r * 255.0);

  let f = round(textureLoad(frame, vec2<i32>(x, y), 0) * 255.0);
  if (f.a <= 0.0) {
    return vec4<f32>(v / 255.0, v / 255.0, v / 255.0, 1.0);
  }
  let inv = 255.0 - f.a;
  let under = mul_div255(v, inv);
  let rgb = min(vec3<f32>(
    mul_div255(f.r, f.a),
    mul_div255(f.g, f.a),
    mul_div255(f.b, f.a),
  ) + vec3<f32>(under), vec3<f32>(255.0));
  return vec4<f32>(rgb / 255.0, 1.0);
}
"#;

struct Stage {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

struct Gpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    blend: Stage,
    finish: Stage,
}

/// Shader path; the device is created on first use.
#[derive(Default)]
pub struct GpuBackend {
    gpu: Option<Gpu>,
}

impl GpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_init(&mut self) -> CloudResult<&Gpu> {
        if self.gpu.is_none() {
            self.gpu = Some(init_gpu()?);
        }
        self.gpu
            .as_ref()
            .ok_or_else(|| CloudError::gpu("gpu backend not initialized"))
    }
}

impl CloudBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    #[tracing::instrument(skip_all, fields(width = geometry.width, height = geometry.height))]
    fn compose_clouds(
        &mut self,
        channels: &ChannelSources,
        frame: &Raster,
        geometry: Geometry,
    ) -> CloudResult<CloudLayers> {
        geometry.validate()?;
        for (left, right, what) in [
            (&channels.ir_left, &channels.ir_right, "ir"),
            (&channels.dust_left, &channels.dust_right, "dust"),
            (&channels.visible_left, &channels.visible_right, "visible"),
        ] {
            MergedPair::new(left, right, geometry, what)?;
        }
        let frame = resize_frame(frame, geometry)?;
        let gpu = self.ensure_init()?;

        let halves = [
            &channels.ir_left,
            &channels.ir_right,
            &channels.dust_left,
            &channels.dust_right,
            &channels.visible_left,
            &channels.visible_right,
        ];
        let inputs: Vec<wgpu::Texture> = halves
            .iter()
            .map(|half| upload(gpu, &half.to_format(PixelFormat::Rgba8), "cloudmap_half"))
            .collect::<CloudResult<_>>()?;
        let views: Vec<wgpu::TextureView> = inputs
            .iter()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();

        let field_target = target(gpu, geometry, wgpu::TextureFormat::R8Unorm, "cloudmap_field");
        draw(gpu, &gpu.blend, &views, &field_target, "cloudmap_blend")?;
        let data = read_texture(gpu, &field_target, geometry, 1)?;
        let mut field = Raster::new(geometry.width, geometry.height, PixelFormat::Gray8, data)?;
        debug!("pass 1 read back");

        let gaps = fill_seam(&mut field, geometry)?;
        debug!(gaps, "seam repaired between passes");

        let field_tex = upload(gpu, &field, "cloudmap_field_repaired")?;
        let frame_tex = upload(gpu, &frame, "cloudmap_frame")?;
        let finish_views = [
            field_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            frame_tex.create_view(&wgpu::TextureViewDescriptor::default()),
        ];
        let framed_target =
            target(gpu, geometry, wgpu::TextureFormat::Rgba8Unorm, "cloudmap_framed");
        draw(gpu, &gpu.finish, &finish_views, &framed_target, "cloudmap_finish")?;
        let data = read_texture(gpu, &framed_target, geometry, 4)?;
        let framed = Raster::new(geometry.width, geometry.height, PixelFormat::Rgba8, data)?;
        info!("gpu passes complete");

        derive_layers(&framed)
    }
}

fn init_gpu() -> CloudResult<Gpu> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|e| match e {
        wgpu::RequestAdapterError::NotFound { .. } => CloudError::gpu("no gpu adapter available"),
        other => CloudError::gpu(format!("wgpu request_adapter failed: {other:?}")),
    })?;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("cloudmap_device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        experimental_features: wgpu::ExperimentalFeatures::default(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .map_err(|e| CloudError::gpu(format!("wgpu request_device failed: {e:?}")))?;

    let blend = stage(
        &device,
        BLEND_FS,
        6,
        wgpu::TextureFormat::R8Unorm,
        "cloudmap_blend",
    );
    let finish = stage(
        &device,
        FINISH_FS,
        2,
        wgpu::TextureFormat::Rgba8Unorm,
        "cloudmap_finish",
    );
    Ok(Gpu {
        device,
        queue,
        blend,
        finish,
    })
}

fn stage(
    device: &wgpu::Device,
    fragment: &str,
    textures: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> Stage {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..textures)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
            },
            count: None,
        })
        .collect();
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_VS}\n{fragment}").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });
    Stage {
        pipeline,
        bind_group_layout,
    }
}

fn upload(gpu: &Gpu, raster: &Raster, label: &str) -> CloudResult<wgpu::Texture> {
    let format = match raster.format() {
        PixelFormat::Gray8 => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgb8 => {
            return Err(CloudError::gpu("rgb rasters must be expanded before upload"));
        }
    };
    let size = wgpu::Extent3d {
        width: raster.width(),
        height: raster.height(),
        depth_or_array_layers: 1,
    };
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        raster.data(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(raster.stride() as u32),
            rows_per_image: Some(raster.height()),
        },
        size,
    );
    Ok(texture)
}

fn target(gpu: &Gpu, geometry: Geometry, format: wgpu::TextureFormat, label: &str) -> wgpu::Texture {
    gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: geometry.width,
            height: geometry.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn draw(
    gpu: &Gpu,
    stage: &Stage,
    inputs: &[wgpu::TextureView],
    target: &wgpu::Texture,
    label: &str,
) -> CloudResult<()> {
    let entries: Vec<wgpu::BindGroupEntry> = inputs
        .iter()
        .enumerate()
        .map(|(i, view)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: wgpu::BindingResource::TextureView(view),
        })
        .collect();
    let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &stage.bind_group_layout,
        entries: &entries,
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    {
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&stage.pipeline);
        rp.set_bind_group(0, &bind_group, &[]);
        rp.draw(0..3, 0..1);
    }
    gpu.queue.submit(Some(encoder.finish()));
    Ok(())
}

fn read_texture(
    gpu: &Gpu,
    texture: &wgpu::Texture,
    geometry: Geometry,
    bytes_per_pixel: u32,
) -> CloudResult<Vec<u8>> {
    let row_bytes = geometry
        .width
        .checked_mul(bytes_per_pixel)
        .ok_or_else(|| CloudError::gpu("readback width overflow"))?;
    let padded_row_bytes = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    let size = u64::from(padded_row_bytes)
        .checked_mul(u64::from(geometry.height))
        .ok_or_else(|| CloudError::gpu("readback buffer size overflow"))?;
    let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("cloudmap_readback"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("cloudmap_readback_encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row_bytes),
                rows_per_image: Some(geometry.height),
            },
        },
        wgpu::Extent3d {
            width: geometry.width,
            height: geometry.height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(Some(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    gpu.device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| CloudError::gpu(format!("wgpu poll failed: {e:?}")))?;
    rx.recv()
        .map_err(|_| CloudError::gpu("readback channel closed"))?
        .map_err(|e| CloudError::gpu(format!("readback map failed: {e:?}")))?;

    let mapped = slice.get_mapped_range();
    let mut out = Vec::with_capacity(row_bytes as usize * geometry.height as usize);
    for row in 0..geometry.height as usize {
        let start = row * padded_row_bytes as usize;
        out.extend_from_slice(&mapped[start..start + row_bytes as usize]);
    }
    drop(mapped);
    readback.unmap();
    Ok(out)
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

//! wgpu backend implementation
//!
//! wgpu has no bound-state machine, so this backend keeps one: the bound program,
//! textures, framebuffer, viewport and fixed-function toggles are recorded on the
//! backend and every `clear`/`draw_mesh` encodes a single render pass against them
//! and submits it right away. Uniforms live in a CPU shadow per program that is
//! written to the program's uniform buffer just before each draw.

mod reflect;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::Mesh;
use reflect::{SampledDimension, ShaderReflection, UniformField};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Linked program: both stage modules plus the emulated uniform block
struct ShaderProgram {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_data: Vec<u8>,
    fields: Vec<UniformField>,
    sampled_dimension: Option<SampledDimension>,
}

struct TextureEntry {
    texture: wgpu::Texture,
    sample_view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: TextureFormat,
    is_cubemap: bool,
}

struct RenderbufferEntry {
    view: Arc<wgpu::TextureView>,
    width: u32,
    height: u32,
}

struct FramebufferEntry {
    width: u32,
    height: u32,
    depth: Option<RenderbufferHandle>,
    color: Option<(TextureHandle, CubemapFace)>,
}

struct MeshEntry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: u64,
    format: wgpu::TextureFormat,
    has_depth: bool,
    cull: bool,
    depth_write: bool,
}

/// Where the default framebuffer lives
enum DefaultTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        frame: Option<(wgpu::SurfaceTexture, Arc<wgpu::TextureView>)>,
    },
    Headless {
        #[allow(dead_code)]
        texture: wgpu::Texture,
        view: Arc<wgpu::TextureView>,
        width: u32,
        height: u32,
    },
}

/// Resolved attachments for one pass
struct PassTarget {
    color: Arc<wgpu::TextureView>,
    depth: Option<Arc<wgpu::TextureView>>,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: DefaultTarget,
    default_depth: Arc<wgpu::TextureView>,
    sampler: wgpu::Sampler,

    // Resource storage
    shaders: HashMap<u64, ShaderProgram>,
    textures: HashMap<u64, TextureEntry>,
    renderbuffers: HashMap<u64, RenderbufferEntry>,
    framebuffers: HashMap<u64, FramebufferEntry>,
    meshes: HashMap<u64, MeshEntry>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    // Handle counters
    next_shader_id: u64,
    next_texture_id: u64,
    next_renderbuffer_id: u64,
    next_framebuffer_id: u64,
    next_mesh_id: u64,

    // Bound state
    bound_shader: Option<ShaderHandle>,
    bound_textures: HashMap<u32, TextureHandle>,
    bound_framebuffer: Option<FramebufferHandle>,
    viewport: Option<(u32, u32, u32, u32)>,
    backface_culling: bool,
    depth_write: bool,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        }
    }

    fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
        match format {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        }
    }

    /// Clamp to device limits while maintaining aspect ratio
    fn clamp_size(max_size: u32, width: u32, height: u32) -> (u32, u32) {
        if width > max_size || height > max_size {
            let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
            let new_width = ((width as f32 * scale) as u32).max(1);
            let new_height = ((height as f32 * scale) as u32).max(1);
            (new_width, new_height)
        } else {
            (width.max(1), height.max(1))
        }
    }

    fn create_depth_view(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
    ) -> Arc<wgpu::TextureView> {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn create_headless_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, Arc<wgpu::TextureView>) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Headless Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, Arc::new(view))
    }

    fn from_parts(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: DefaultTarget,
    ) -> Self {
        let (width, height) = match &target {
            DefaultTarget::Surface { config, .. } => (config.width, config.height),
            DefaultTarget::Headless { width, height, .. } => (*width, *height),
        };
        let default_depth = Self::create_depth_view(&device, "Default Depth", width, height);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skybox Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            instance,
            adapter,
            device,
            queue,
            target,
            default_depth,
            sampler,
            shaders: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            meshes: HashMap::new(),
            pipelines: HashMap::new(),
            next_shader_id: 1,
            next_texture_id: 1,
            next_renderbuffer_id: 1,
            next_framebuffer_id: 1,
            next_mesh_id: 1,
            bound_shader: None,
            bound_textures: HashMap::new(),
            bound_framebuffer: None,
            viewport: None,
            backface_culling: true,
            depth_write: true,
        }
    }

    /// Create a backend presenting to `window`
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let (instance, surface, adapter, device, queue) = Self::init_native(window.clone()).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        // The skybox shader applies its own gamma curve, so present without an sRGB encode
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed("surface reports no supported formats".into())
            })?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let (width, height) =
            Self::clamp_size(device.limits().max_texture_dimension_2d, size.width, size.height);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);
        log::info!("Surface configured: {}x{} {:?}", width, height, surface_format);

        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            DefaultTarget::Surface {
                surface,
                config,
                frame: None,
            },
        ))
    }

    /// Create a backend without a window; the default framebuffer is an offscreen texture
    pub fn new_headless(width: u32, height: u32) -> BackendResult<Self> {
        pollster::block_on(Self::new_headless_async(width, height))
    }

    pub async fn new_headless_async(width: u32, height: u32) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let (device, queue) = Self::request_device(&adapter).await?;
        let (width, height) =
            Self::clamp_size(device.limits().max_texture_dimension_2d, width, height);
        let (texture, view) = Self::create_headless_target(&device, width, height);

        Ok(Self::from_parts(
            instance,
            adapter,
            device,
            queue,
            DefaultTarget::Headless {
                texture,
                view,
                width,
                height,
            },
        ))
    }

    async fn request_device(adapter: &wgpu::Adapter) -> BackendResult<(wgpu::Device, wgpu::Queue)> {
        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Skybox Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))
    }

    /// Native initialization
    async fn init_native(
        window: Arc<winit::window::Window>,
    ) -> BackendResult<(
        wgpu::Instance,
        wgpu::Surface<'static>,
        wgpu::Adapter,
        wgpu::Device,
        wgpu::Queue,
    )> {
        // On Windows, try Vulkan first to avoid D3D12 debug layer validation errors
        let backends = if std::env::var("WGPU_BACKEND").is_ok() {
            wgpu::Backends::all()
        } else if cfg!(target_os = "windows") {
            wgpu::Backends::VULKAN
        } else {
            wgpu::Backends::all()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await;

        // If no adapter found with preferred backend, try with all backends
        let (instance, surface, adapter) = match adapter {
            Some(adapter) => (instance, surface, adapter),
            None if backends != wgpu::Backends::all() => {
                log::warn!("Preferred backend not available, falling back to all backends");
                let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                    backends: wgpu::Backends::all(),
                    ..Default::default()
                });
                let surface = instance
                    .create_surface(window)
                    .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;
                let adapter = instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: Some(&surface),
                        force_fallback_adapter: false,
                    })
                    .await
                    .ok_or_else(|| {
                        BackendError::InitializationFailed("No suitable adapter found".into())
                    })?;
                (instance, surface, adapter)
            }
            None => {
                return Err(BackendError::InitializationFailed(
                    "No suitable adapter found".into(),
                ))
            }
        };

        let (device, queue) = Self::request_device(&adapter).await?;
        Ok((instance, surface, adapter, device, queue))
    }

    /// Run `f` inside a validation error scope and turn a captured error into `err`
    fn scoped<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
        err: impl FnOnce(String) -> BackendError,
    ) -> BackendResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(err(e.to_string())),
            None => Ok(value),
        }
    }

    fn texture_entry(&self, texture: TextureHandle) -> BackendResult<&TextureEntry> {
        self.textures.get(&texture.0).ok_or(BackendError::InvalidHandle {
            kind: "texture",
            id: texture.0,
        })
    }

    /// Attachments for the next pass: the bound framebuffer, or the default target
    fn resolve_target(&self) -> BackendResult<PassTarget> {
        let Some(fb) = self.bound_framebuffer else {
            let depth = Some(Arc::clone(&self.default_depth));
            return match &self.target {
                DefaultTarget::Surface { config, frame, .. } => {
                    let (_, view) = frame.as_ref().ok_or(BackendError::NoActiveFrame)?;
                    Ok(PassTarget {
                        color: Arc::clone(view),
                        depth,
                        format: config.format,
                        width: config.width,
                        height: config.height,
                    })
                }
                DefaultTarget::Headless {
                    view,
                    width,
                    height,
                    ..
                } => Ok(PassTarget {
                    color: Arc::clone(view),
                    depth,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    width: *width,
                    height: *height,
                }),
            };
        };

        let status = self.framebuffer_status(fb);
        if !status.is_complete() {
            return Err(BackendError::FramebufferIncomplete(status));
        }

        let entry = self.framebuffers.get(&fb.0).ok_or(BackendError::InvalidHandle {
            kind: "framebuffer",
            id: fb.0,
        })?;
        let (cubemap, face) = entry
            .color
            .ok_or(BackendError::FramebufferIncomplete(FramebufferStatus::MissingColorAttachment))?;
        let color = self.texture_entry(cubemap)?;
        let depth = entry
            .depth
            .and_then(|rb| self.renderbuffers.get(&rb.0))
            .map(|rb| Arc::clone(&rb.view));

        Ok(PassTarget {
            color: Arc::new(color.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(face.name()),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: face.index(),
                array_layer_count: Some(1),
                ..Default::default()
            })),
            depth,
            format: Self::convert_texture_format(color.format),
            width: entry.width,
            height: entry.height,
        })
    }

    /// GL viewports are bottom-left based; wgpu viewports are top-left based
    fn pass_viewport(&self, target: &PassTarget) -> (f32, f32, f32, f32) {
        let (x, y, w, h) = self.viewport.unwrap_or((0, 0, target.width, target.height));
        let x = x.min(target.width);
        let w = w.min(target.width - x).max(1);
        let h = h.min(target.height).max(1);
        let top = target.height.saturating_sub(y.saturating_add(h));
        (x as f32, top as f32, w as f32, h as f32)
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> BackendResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let program = self.shaders.get(&key.shader).ok_or(BackendError::InvalidHandle {
            kind: "shader",
            id: key.shader,
        })?;

        let layout = Vertex::layout();
        let attributes: Vec<wgpu::VertexAttribute> = layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: Self::convert_vertex_format(a.format),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();
        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.array_stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];
        let targets = [Some(wgpu::ColorTargetState {
            format: key.format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let label = format!("{} Pipeline", program.label);
        let pipeline = self.scoped(
            |device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&label),
                    layout: Some(&program.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &program.vertex,
                        entry_point: "vs_main",
                        buffers: &vertex_buffers,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &program.fragment,
                        entry_point: "fs_main",
                        targets: &targets,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: key.cull.then_some(wgpu::Face::Back),
                        ..Default::default()
                    },
                    depth_stencil: key.has_depth.then(|| wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: key.depth_write,
                        depth_compare: wgpu::CompareFunction::LessEqual,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                })
            },
            BackendError::PipelineCreationFailed,
        )?;

        log::debug!("Created pipeline for {:?}", key);
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn create_bind_group(&self, program: &ShaderProgram) -> BackendResult<wgpu::BindGroup> {
        let mut entries = Vec::with_capacity(3);
        if let Some(buffer) = &program.uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }

        if let Some(dimension) = program.sampled_dimension {
            let handle = self.bound_textures.get(&0).copied().ok_or_else(|| {
                BackendError::PipelineCreationFailed(format!(
                    "{} samples a texture but slot 0 is empty",
                    program.label
                ))
            })?;
            let texture = self.texture_entry(handle)?;
            if texture.is_cubemap != (dimension == SampledDimension::Cube) {
                return Err(BackendError::PipelineCreationFailed(format!(
                    "{} expects a {:?} texture in slot 0",
                    program.label, dimension
                )));
            }
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture.sample_view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }

    /// Copy one cubemap face back to the CPU, tightly packed
    pub fn read_cubemap_face(
        &self,
        cubemap: TextureHandle,
        face: CubemapFace,
    ) -> BackendResult<Vec<u8>> {
        let entry = self.texture_entry(cubemap)?;
        let bpp = entry.format.bytes_per_pixel();
        let row = entry.width * bpp;
        let padded_row = row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Face Readback"),
            size: padded_row as u64 * entry.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: face.index(),
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(entry.height),
                },
            },
            wgpu::Extent3d {
                width: entry.width,
                height: entry.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| BackendError::TextureCreationFailed(e.to_string()))?
            .map_err(|e| BackendError::TextureCreationFailed(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((row * entry.height) as usize);
        for chunk in mapped.chunks(padded_row as usize) {
            pixels.extend_from_slice(&chunk[..row as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(pixels)
    }

    /// Size, format and cubemap-ness of a live texture
    pub fn texture_info(&self, texture: TextureHandle) -> Option<(u32, u32, TextureFormat, bool)> {
        self.textures
            .get(&texture.0)
            .map(|t| (t.width, t.height, t.format, t.is_cubemap))
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// GL adapters cannot copy a single layer of an array texture into a buffer,
    /// so `read_cubemap_face` returns zeros there.
    pub fn supports_cubemap_readback(&self) -> bool {
        self.adapter.get_info().backend != wgpu::Backend::Gl
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl GraphicsBackend for WgpuBackend {
    fn shader_dialect(&self) -> ShaderDialect {
        ShaderDialect::Wgsl
    }

    fn clip_space(&self) -> ClipSpace {
        ClipSpace::ZeroToOneTopDown
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        match &self.target {
            DefaultTarget::Surface { config, .. } => (config.width, config.height),
            DefaultTarget::Headless { width, height, .. } => (*width, *height),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        let (width, height) =
            Self::clamp_size(self.device.limits().max_texture_dimension_2d, width, height);

        match &mut self.target {
            DefaultTarget::Surface {
                surface, config, ..
            } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            DefaultTarget::Headless {
                texture,
                view,
                width: w,
                height: h,
            } => {
                let (new_texture, new_view) =
                    Self::create_headless_target(&self.device, width, height);
                *texture = new_texture;
                *view = new_view;
                *w = width;
                *h = height;
            }
        }

        self.default_depth =
            Self::create_depth_view(&self.device, "Default Depth", width, height);
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        if let DefaultTarget::Surface { surface, frame, .. } = &mut self.target {
            let output = surface.get_current_texture().map_err(|e| match e {
                wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
                wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
                _ => BackendError::AcquireImageFailed(e.to_string()),
            })?;
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            *frame = Some((output, Arc::new(view)));
        }
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let DefaultTarget::Surface { frame, .. } = &mut self.target {
            if let Some((texture, view)) = frame.take() {
                drop(view);
                texture.present();
            }
        }
        Ok(())
    }

    fn load_shader(&mut self, desc: &ShaderDescriptor) -> BackendResult<ShaderHandle> {
        let label = desc.label.clone().unwrap_or_else(|| "shader".to_string());

        let vertex_reflection =
            ShaderReflection::from_wgsl(&format!("{} (vertex)", label), &desc.vertex_source)?;
        let reflection = vertex_reflection.merge(ShaderReflection::from_wgsl(
            &format!("{} (fragment)", label),
            &desc.fragment_source,
        )?)?;

        let (vertex, fragment) = self.scoped(
            |device| {
                let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Wgsl(desc.vertex_source.as_str().into()),
                });
                let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Wgsl(desc.fragment_source.as_str().into()),
                });
                (vertex, fragment)
            },
            BackendError::ShaderCreationFailed,
        )?;

        let mut layout_entries = Vec::with_capacity(3);
        if reflection.uniform_block_size > 0 {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        if let Some(dimension) = reflection.sampled_dimension {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: match dimension {
                        SampledDimension::D2 => wgpu::TextureViewDimension::D2,
                        SampledDimension::Cube => wgpu::TextureViewDimension::Cube,
                    },
                    multisampled: false,
                },
                count: None,
            });
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&label),
                entries: &layout_entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let buffer_size = reflection.buffer_size();
        let uniform_buffer = (buffer_size > 0).then(|| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: buffer_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let id = self.next_shader_id;
        self.next_shader_id += 1;
        log::debug!(
            "Loaded shader '{}' [ID {}] with uniforms {:?}",
            label,
            id,
            reflection.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>()
        );
        self.shaders.insert(
            id,
            ShaderProgram {
                label,
                vertex,
                fragment,
                bind_group_layout,
                pipeline_layout,
                uniform_buffer,
                uniform_data: vec![0; buffer_size as usize],
                fields: reflection.fields,
                sampled_dimension: reflection.sampled_dimension,
            },
        );

        Ok(ShaderHandle(id))
    }

    fn uniform_location(&self, shader: ShaderHandle, name: &str) -> Option<UniformLocation> {
        self.shaders
            .get(&shader.0)?
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| UniformLocation(i as u32))
    }

    fn set_uniform(
        &mut self,
        shader: ShaderHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        let Some(program) = self.shaders.get_mut(&shader.0) else {
            log::warn!("set_uniform on unknown shader {}", shader.0);
            return;
        };
        let Some(field) = program.fields.get(location.0 as usize) else {
            log::warn!("{}: no uniform at location {}", program.label, location.0);
            return;
        };
        if field.kind != value.kind() {
            log::warn!(
                "{}: uniform '{}' is {:?}, got {:?}",
                program.label,
                field.name,
                field.kind,
                value.kind()
            );
            return;
        }

        let offset = field.offset as usize;
        match value {
            UniformValue::Int(v) => {
                program.uniform_data[offset..offset + 4].copy_from_slice(&v.to_le_bytes())
            }
            UniformValue::Mat4(m) => {
                program.uniform_data[offset..offset + 64].copy_from_slice(bytemuck::bytes_of(&m))
            }
        }
    }

    fn use_shader(&mut self, shader: Option<ShaderHandle>) {
        self.bound_shader = shader;
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader.0).is_some() {
            self.pipelines.retain(|key, _| key.shader != shader.0);
        }
        if self.bound_shader == Some(shader) {
            self.bound_shader = None;
        }
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<TextureHandle> {
        let expected = desc.format.image_size(desc.width, desc.height);
        if data.len() != expected {
            return Err(BackendError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.scoped(
            |device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: desc.label.as_deref(),
                    size,
                    mip_level_count: desc.mip_levels,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: Self::convert_texture_format(desc.format),
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                })
            },
            BackendError::TextureCreationFailed,
        )?;

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * desc.format.bytes_per_pixel()),
                rows_per_image: Some(desc.height),
            },
            size,
        );

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            TextureEntry {
                sample_view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                texture,
                width: desc.width,
                height: desc.height,
                format: desc.format,
                is_cubemap: false,
            },
        );

        Ok(TextureHandle(id))
    }

    fn create_cubemap(&mut self, size: u32, format: TextureFormat) -> BackendResult<TextureHandle> {
        if !format.is_color_renderable() {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} cannot be used as a cubemap render target",
                format
            )));
        }
        if size == 0 || size > self.device.limits().max_texture_dimension_2d {
            return Err(BackendError::TextureCreationFailed(format!(
                "cubemap size {} is outside the device limits",
                size
            )));
        }

        let texture = self.scoped(
            |device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Cubemap"),
                    size: wgpu::Extent3d {
                        width: size,
                        height: size,
                        depth_or_array_layers: 6,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: Self::convert_texture_format(format),
                    usage: wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::COPY_DST
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                })
            },
            BackendError::TextureCreationFailed,
        )?;

        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cubemap View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                sample_view,
                width: size,
                height: size,
                format,
                is_cubemap: true,
            },
        );

        Ok(TextureHandle(id))
    }

    fn write_cubemap_face(
        &mut self,
        cubemap: TextureHandle,
        face: CubemapFace,
        data: &[u8],
    ) -> BackendResult<()> {
        let entry = self.texture_entry(cubemap)?;
        let expected = entry.format.image_size(entry.width, entry.height);
        if data.len() != expected {
            return Err(BackendError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: face.index(),
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(entry.width * entry.format.bytes_per_pixel()),
                rows_per_image: Some(entry.height),
            },
            wgpu::Extent3d {
                width: entry.width,
                height: entry.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(texture) => {
                self.bound_textures.insert(slot, texture);
            }
            None => {
                self.bound_textures.remove(&slot);
            }
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(entry) = self.textures.remove(&texture.0) {
            entry.texture.destroy();
        }
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn create_depth_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle> {
        let view = self.scoped(
            |device| Self::create_depth_view(device, "Depth Renderbuffer", width, height),
            BackendError::TextureCreationFailed,
        )?;

        let id = self.next_renderbuffer_id;
        self.next_renderbuffer_id += 1;
        self.renderbuffers.insert(
            id,
            RenderbufferEntry {
                view,
                width,
                height,
            },
        );
        Ok(RenderbufferHandle(id))
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.renderbuffers.remove(&renderbuffer.0);
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> BackendResult<FramebufferHandle> {
        if width == 0 || height == 0 {
            return Err(BackendError::FramebufferCreationFailed(format!(
                "invalid size {}x{}",
                width, height
            )));
        }

        let id = self.next_framebuffer_id;
        self.next_framebuffer_id += 1;
        self.framebuffers.insert(
            id,
            FramebufferEntry {
                width,
                height,
                depth: None,
                color: None,
            },
        );
        Ok(FramebufferHandle(id))
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    ) -> BackendResult<()> {
        let entry = self
            .framebuffers
            .get_mut(&framebuffer.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "framebuffer",
                id: framebuffer.0,
            })?;

        match attachment {
            Attachment::Depth(rb) => entry.depth = Some(rb),
            Attachment::CubemapFace { cubemap, face } => entry.color = Some((cubemap, face)),
        }

        self.bound_framebuffer = None;
        Ok(())
    }

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(entry) = self.framebuffers.get(&framebuffer.0) else {
            return FramebufferStatus::InvalidAttachment;
        };

        let color = entry.color.map(|(cubemap, _)| {
            self.textures
                .get(&cubemap.0)
                .filter(|t| t.is_cubemap)
                .map(|t| (t.width, t.height))
        });
        let depth = entry
            .depth
            .map(|rb| self.renderbuffers.get(&rb.0).map(|r| (r.width, r.height)));

        FramebufferStatus::evaluate((entry.width, entry.height), color, depth)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if let Some(entry) = self.framebuffers.remove(&framebuffer.0) {
            if let Some(rb) = entry.depth {
                self.renderbuffers.remove(&rb.0);
            }
        }
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = Some((x, y, width, height));
    }

    fn set_backface_culling(&mut self, enabled: bool) {
        self.backface_culling = enabled;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn clear(&mut self, color: [f32; 4]) {
        let target = match self.resolve_target() {
            Ok(target) => target,
            Err(e) => {
                log::warn!("clear skipped: {}", e);
                return;
            }
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0] as f64,
                            g: color[1] as f64,
                            b: color[2] as f64,
                            a: color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.as_deref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle> {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&mesh.name),
                contents: mesh.vertex_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&mesh.name),
                contents: mesh.index_bytes(),
                usage: wgpu::BufferUsages::INDEX,
            });

        let id = self.next_mesh_id;
        self.next_mesh_id += 1;
        self.meshes.insert(
            id,
            MeshEntry {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count() as u32,
            },
        );
        Ok(MeshHandle(id))
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> BackendResult<()> {
        let shader = self.bound_shader.ok_or(BackendError::NoShaderBound)?;
        let target = self.resolve_target()?;

        let key = PipelineKey {
            shader: shader.0,
            format: target.format,
            has_depth: target.depth.is_some(),
            cull: self.backface_culling,
            depth_write: self.depth_write,
        };
        self.ensure_pipeline(key)?;

        let program = self.shaders.get(&shader.0).ok_or(BackendError::InvalidHandle {
            kind: "shader",
            id: shader.0,
        })?;
        let mesh_entry = self.meshes.get(&mesh.0).ok_or(BackendError::InvalidHandle {
            kind: "mesh",
            id: mesh.0,
        })?;
        let pipeline = self.pipelines.get(&key).ok_or(BackendError::InvalidHandle {
            kind: "pipeline",
            id: shader.0,
        })?;

        if let Some(buffer) = &program.uniform_buffer {
            self.queue.write_buffer(buffer, 0, &program.uniform_data);
        }
        let bind_group = self.create_bind_group(program)?;
        let (x, y, w, h) = self.pass_viewport(&target);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Draw Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&program.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.as_deref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_viewport(x, y, w, h, 0.0, 1.0);
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, mesh_entry.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh_entry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh_entry.index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh.0);
    }
}

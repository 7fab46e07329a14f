//! Common types shared between backends

use crate::backend::traits::{RenderbufferHandle, TextureHandle};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

/// Near culling distance of internal render cameras
pub const DEFAULT_CULL_DISTANCE_NEAR: f32 = 0.01;
/// Far culling distance of internal render cameras
pub const DEFAULT_CULL_DISTANCE_FAR: f32 = 1000.0;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth24Plus,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth24Plus)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth24Plus => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Whether the format can be rendered into and sampled as a bake target
    pub fn is_color_renderable(&self) -> bool {
        !self.is_depth() && *self != TextureFormat::Rgba32Float
    }

    /// Byte size of a `width` x `height` image in this format
    pub fn image_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel() as usize
    }
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
        }
    }
}

/// One of the six faces of a cubemap, in the canonical layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubemapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubemapFace {
    /// All faces in layer order: +X, -X, +Y, -Y, +Z, -Z
    pub const ALL: [CubemapFace; 6] = [
        CubemapFace::PositiveX,
        CubemapFace::NegativeX,
        CubemapFace::PositiveY,
        CubemapFace::NegativeY,
        CubemapFace::PositiveZ,
        CubemapFace::NegativeZ,
    ];

    /// Array layer index of the face
    pub fn index(&self) -> u32 {
        match self {
            CubemapFace::PositiveX => 0,
            CubemapFace::NegativeX => 1,
            CubemapFace::PositiveY => 2,
            CubemapFace::NegativeY => 3,
            CubemapFace::PositiveZ => 4,
            CubemapFace::NegativeZ => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CubemapFace::PositiveX => "+X",
            CubemapFace::NegativeX => "-X",
            CubemapFace::PositiveY => "+Y",
            CubemapFace::NegativeY => "-Y",
            CubemapFace::PositiveZ => "+Z",
            CubemapFace::NegativeZ => "-Z",
        }
    }
}

/// Framebuffer attachment target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Depth renderbuffer
    Depth(RenderbufferHandle),
    /// One face of a cubemap as color target 0
    CubemapFace {
        cubemap: TextureHandle,
        face: CubemapFace,
    },
}

/// Result of a framebuffer completeness query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    /// Nothing attached at all
    MissingAttachment,
    /// Depth attached but no color target
    MissingColorAttachment,
    /// An attachment does not match the framebuffer size
    SizeMismatch,
    /// An attachment refers to a destroyed or unusable resource
    InvalidAttachment,
}

impl FramebufferStatus {
    pub fn is_complete(&self) -> bool {
        *self == FramebufferStatus::Complete
    }

    /// Completeness rule shared by every backend.
    ///
    /// `color` and `depth` are `None` when nothing is attached, `Some(None)` when the
    /// attached resource no longer exists, and `Some(Some(size))` otherwise.
    pub fn evaluate(
        size: (u32, u32),
        color: Option<Option<(u32, u32)>>,
        depth: Option<Option<(u32, u32)>>,
    ) -> Self {
        match (color, depth) {
            (None, None) => FramebufferStatus::MissingAttachment,
            (None, Some(_)) => FramebufferStatus::MissingColorAttachment,
            (Some(None), _) | (_, Some(None)) => FramebufferStatus::InvalidAttachment,
            (Some(Some(color)), depth) => {
                let depth_ok = depth.flatten().map_or(true, |d| d == size);
                if color == size && depth_ok {
                    FramebufferStatus::Complete
                } else {
                    FramebufferStatus::SizeMismatch
                }
            }
        }
    }
}

/// Uniform value types the skybox programs use
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Int,
    Mat4,
}

/// Shading-language dialect, used to pick shader source directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// Desktop OpenGL 3.3
    Glsl330,
    /// OpenGL ES 2 / WebGL
    Glsl100,
    /// WebGPU shading language
    Wgsl,
}

impl ShaderDialect {
    /// GLSL dialect matching the compilation target
    pub fn glsl_for_target() -> Self {
        if cfg!(any(target_arch = "wasm32", target_os = "android")) {
            ShaderDialect::Glsl100
        } else {
            ShaderDialect::Glsl330
        }
    }

    /// Token substituted for `{dialect}` in shader path templates
    pub fn selector(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl330 => "glsl330",
            ShaderDialect::Glsl100 => "glsl100",
            ShaderDialect::Wgsl => "wgsl",
        }
    }
}

/// Shader program descriptor
#[derive(Debug, Clone)]
pub struct ShaderDescriptor {
    pub label: Option<String>,
    pub vertex_source: String,
    pub fragment_source: String,
}

/// Clip-space and render-target conventions of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSpace {
    /// Depth in -1..1, offscreen targets stored bottom row first
    OpenGl,
    /// Depth in 0..1, offscreen targets stored top row first (wgpu, Vulkan, D3D)
    ZeroToOneTopDown,
}

impl ClipSpace {
    /// Right-handed perspective projection for this clip space
    pub fn perspective(&self, fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        match self {
            ClipSpace::OpenGl => Mat4::perspective_rh_gl(fov_y_radians, aspect, near, far),
            ClipSpace::ZeroToOneTopDown => Mat4::perspective_rh(fov_y_radians, aspect, near, far),
        }
    }

    /// Correction applied to projections that render into textures, so that
    /// texel rows land where the OpenGL cubemap convention expects them
    pub fn offscreen_correction(&self) -> Mat4 {
        match self {
            ClipSpace::OpenGl => Mat4::IDENTITY,
            ClipSpace::ZeroToOneTopDown => Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)),
        }
    }
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

/// Vertex attribute description
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Vertex with position, normal and UV
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x3,
                    offset: 12,
                },
                VertexAttribute {
                    location: 2,
                    format: VertexFormat::Float32x2,
                    offset: 24,
                },
            ],
        }
    }
}

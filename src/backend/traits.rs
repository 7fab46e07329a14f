//! Core backend abstraction traits
//!
//! These traits define the immediate-mode surface the skybox code drives: shader
//! programs with named uniforms, 2D and cubemap textures, framebuffers with
//! renderbuffer/cubemap-face attachments, and a handful of fixed-function toggles.

use crate::backend::types::*;
use crate::resources::Mesh;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Framebuffer is not complete: {0:?}")]
    FramebufferIncomplete(FramebufferStatus),
    #[error("Unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u64 },
    #[error("Texture data has {actual} bytes, expected {expected}")]
    DataSizeMismatch { expected: usize, actual: usize },
    #[error("No shader bound for drawing")]
    NoShaderBound,
    #[error("No frame in flight; call begin_frame before drawing to the window")]
    NoActiveFrame,
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture (2D or cubemap)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a depth renderbuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferHandle(pub(crate) u64);

/// Handle to an offscreen framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to a linked vertex + fragment program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Handle to an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u64);

impl TextureHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Location of a named uniform inside a shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

/// Main graphics backend trait
pub trait GraphicsBackend {
    /// Shading-language dialect this backend compiles
    fn shader_dialect(&self) -> ShaderDialect;

    /// Clip-space and render-target conventions
    fn clip_space(&self) -> ClipSpace;

    /// Near/far culling distances used by internal render cameras
    fn cull_distances(&self) -> (f32, f32) {
        (DEFAULT_CULL_DISTANCE_NEAR, DEFAULT_CULL_DISTANCE_FAR)
    }

    /// Size of the default (window) framebuffer
    fn framebuffer_size(&self) -> (u32, u32);

    /// Resize the default framebuffer
    fn resize(&mut self, width: u32, height: u32);

    /// Begin a new frame
    fn begin_frame(&mut self) -> BackendResult<()>;

    /// End and present the frame
    fn end_frame(&mut self) -> BackendResult<()>;

    // Shaders

    /// Compile and link a vertex + fragment program
    fn load_shader(&mut self, desc: &ShaderDescriptor) -> BackendResult<ShaderHandle>;

    /// Look up a uniform by name
    fn uniform_location(&self, shader: ShaderHandle, name: &str) -> Option<UniformLocation>;

    /// Set a uniform value on a program
    fn set_uniform(&mut self, shader: ShaderHandle, location: UniformLocation, value: UniformValue);

    /// Bind a program for subsequent draws, or unbind with `None`
    fn use_shader(&mut self, shader: Option<ShaderHandle>);

    /// Destroy a program
    fn destroy_shader(&mut self, shader: ShaderHandle);

    // Textures

    /// Create a 2D texture with initial data
    fn create_texture(&mut self, desc: &TextureDescriptor, data: &[u8])
        -> BackendResult<TextureHandle>;

    /// Create empty cubemap storage usable both as a render target and for sampling
    fn create_cubemap(&mut self, size: u32, format: TextureFormat) -> BackendResult<TextureHandle>;

    /// Upload one face of a cubemap
    fn write_cubemap_face(
        &mut self,
        cubemap: TextureHandle,
        face: CubemapFace,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Bind a texture to a sampling unit, or unbind with `None`
    fn bind_texture(&mut self, slot: u32, texture: Option<TextureHandle>);

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    // Framebuffers

    /// Create a depth renderbuffer
    fn create_depth_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle>;

    /// Destroy a renderbuffer that was never attached to a framebuffer
    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);

    /// Create a framebuffer with no attachments
    fn create_framebuffer(&mut self, width: u32, height: u32) -> BackendResult<FramebufferHandle>;

    /// Attach a target to a framebuffer.
    ///
    /// Attaching binds the framebuffer, attaches, and unbinds it again: on return no
    /// framebuffer is bound, so callers must re-bind before drawing.
    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    ) -> BackendResult<()>;

    /// Check framebuffer completeness
    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus;

    /// Bind a framebuffer for drawing, or the default framebuffer with `None`
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Destroy a framebuffer together with its attached renderbuffers
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    // Fixed-function state

    /// Set viewport
    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Enable or disable back-face culling
    fn set_backface_culling(&mut self, enabled: bool);

    /// Enable or disable depth writes
    fn set_depth_mask(&mut self, enabled: bool);

    /// Clear color and depth of the bound framebuffer
    fn clear(&mut self, color: [f32; 4]);

    // Meshes

    /// Upload a mesh
    fn create_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle>;

    /// Draw a mesh with the bound program, textures and framebuffer
    fn draw_mesh(&mut self, mesh: MeshHandle) -> BackendResult<()>;

    /// Destroy a mesh
    fn destroy_mesh(&mut self, mesh: MeshHandle);
}

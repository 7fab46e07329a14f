//! Dummy backend for testing and headless tooling.
//!
//! This backend doesn't touch a GPU. It records every state-changing call as a
//! [`DummyCommand`], tracks which handles are alive, and enforces the same rules
//! as a real backend (attach unbinds the framebuffer, incomplete framebuffers and
//! destroyed textures cannot be drawn with).
//!
//! Uniform locations come from GLSL-style `uniform <type> <name>;` declarations
//! found in the shader sources.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::Mesh;
use std::collections::HashMap;

/// A recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    LoadShader(ShaderHandle),
    SetUniform {
        shader: ShaderHandle,
        name: String,
        value: UniformValue,
    },
    UseShader(Option<ShaderHandle>),
    DestroyShader(ShaderHandle),
    CreateTexture(TextureHandle),
    CreateCubemap(TextureHandle),
    WriteCubemapFace {
        cubemap: TextureHandle,
        face: CubemapFace,
    },
    BindTexture {
        slot: u32,
        texture: Option<TextureHandle>,
    },
    DestroyTexture(TextureHandle),
    CreateRenderbuffer(RenderbufferHandle),
    CreateFramebuffer(FramebufferHandle),
    Attach {
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    },
    BindFramebuffer(Option<FramebufferHandle>),
    DestroyFramebuffer(FramebufferHandle),
    DestroyRenderbuffer(RenderbufferHandle),
    SetViewport {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    SetBackfaceCulling(bool),
    SetDepthMask(bool),
    Clear {
        framebuffer: Option<FramebufferHandle>,
    },
    CreateMesh(MeshHandle),
    Draw {
        mesh: MeshHandle,
        shader: ShaderHandle,
        framebuffer: Option<FramebufferHandle>,
        /// Cubemap face the draw landed in, when drawing offscreen
        target: Option<(TextureHandle, CubemapFace)>,
        backface_culling: bool,
        depth_write: bool,
    },
    DestroyMesh(MeshHandle),
}

/// Texture metadata kept by the dummy backend
#[derive(Debug, Clone, PartialEq)]
pub struct DummyTexture {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_levels: u32,
    pub is_cubemap: bool,
}

#[derive(Debug, Clone)]
struct DummyShader {
    label: String,
    uniforms: Vec<String>,
}

impl DummyShader {
    fn declared_uniforms(sources: [&str; 2]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for line in sources.iter().flat_map(|s| s.lines()) {
            let Some(decl) = line.trim().strip_prefix("uniform ") else {
                continue;
            };
            let name = decl
                .trim_end_matches(';')
                .split_whitespace()
                .last()
                .unwrap_or_default()
                .to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[derive(Debug, Clone)]
struct DummyFramebuffer {
    width: u32,
    height: u32,
    depth: Option<RenderbufferHandle>,
    color: Option<(TextureHandle, CubemapFace)>,
}

/// Dummy graphics backend
#[derive(Debug)]
pub struct DummyBackend {
    framebuffer_size: (u32, u32),
    dialect: ShaderDialect,
    clip_space: ClipSpace,
    force_incomplete: bool,
    fail_cubemaps: bool,

    commands: Vec<DummyCommand>,
    next_id: u64,

    shaders: HashMap<u64, DummyShader>,
    uniforms: HashMap<(u64, String), UniformValue>,
    textures: HashMap<u64, DummyTexture>,
    renderbuffers: HashMap<u64, (u32, u32)>,
    framebuffers: HashMap<u64, DummyFramebuffer>,
    meshes: HashMap<u64, usize>,

    bound_shader: Option<ShaderHandle>,
    bound_textures: HashMap<u32, TextureHandle>,
    bound_framebuffer: Option<FramebufferHandle>,
    viewport: (u32, u32, u32, u32),
    backface_culling: bool,
    depth_write: bool,
}

impl DummyBackend {
    /// Create a new dummy backend with an 800x450 default framebuffer.
    pub fn new() -> Self {
        Self::with_size(800, 450)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            framebuffer_size: (width, height),
            dialect: ShaderDialect::glsl_for_target(),
            clip_space: ClipSpace::OpenGl,
            force_incomplete: false,
            fail_cubemaps: false,
            commands: Vec::new(),
            next_id: 1,
            shaders: HashMap::new(),
            uniforms: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            meshes: HashMap::new(),
            bound_shader: None,
            bound_textures: HashMap::new(),
            bound_framebuffer: None,
            viewport: (0, 0, width, height),
            backface_culling: true,
            depth_write: true,
        }
    }

    /// Report a different shading-language dialect
    pub fn with_dialect(mut self, dialect: ShaderDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Report a different clip-space convention
    pub fn with_clip_space(mut self, clip_space: ClipSpace) -> Self {
        self.clip_space = clip_space;
        self
    }

    /// Make every framebuffer report `MissingColorAttachment`, as a broken driver would
    pub fn set_force_incomplete(&mut self, force: bool) {
        self.force_incomplete = force;
    }

    /// Make `create_cubemap` fail, as when video memory runs out
    pub fn set_fail_cubemaps(&mut self, fail: bool) {
        self.fail_cubemaps = fail;
    }

    pub fn commands(&self) -> &[DummyCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DummyCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Last value set for a uniform, by name
    pub fn uniform_value(&self, shader: ShaderHandle, name: &str) -> Option<UniformValue> {
        self.uniforms.get(&(shader.0, name.to_string())).copied()
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&DummyTexture> {
        self.textures.get(&texture.0)
    }

    pub fn is_shader_live(&self, shader: ShaderHandle) -> bool {
        self.shaders.contains_key(&shader.0)
    }

    pub fn is_mesh_live(&self, mesh: MeshHandle) -> bool {
        self.meshes.contains_key(&mesh.0)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_cubemaps(&self) -> usize {
        self.textures.values().filter(|t| t.is_cubemap).count()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_renderbuffers(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn bound_shader(&self) -> Option<ShaderHandle> {
        self.bound_shader
    }

    pub fn bound_texture(&self, slot: u32) -> Option<TextureHandle> {
        self.bound_textures.get(&slot).copied()
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    pub fn viewport(&self) -> (u32, u32, u32, u32) {
        self.viewport
    }

    pub fn backface_culling(&self) -> bool {
        self.backface_culling
    }

    pub fn depth_mask(&self) -> bool {
        self.depth_write
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: DummyCommand) {
        log::trace!("DummyBackend: {:?}", command);
        self.commands.push(command);
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for DummyBackend {
    fn shader_dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn clip_space(&self) -> ClipSpace {
        self.clip_space
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.framebuffer_size = (width, height);
        }
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn load_shader(&mut self, desc: &ShaderDescriptor) -> BackendResult<ShaderHandle> {
        // A `#error` directive fails compilation, as it does in any GLSL compiler
        for source in [&desc.vertex_source, &desc.fragment_source] {
            if source.trim().is_empty() || source.contains("#error") {
                return Err(BackendError::ShaderCreationFailed(format!(
                    "{}: compilation failed",
                    desc.label.as_deref().unwrap_or("shader")
                )));
            }
        }

        let handle = ShaderHandle(self.alloc());
        self.shaders.insert(
            handle.0,
            DummyShader {
                label: desc.label.clone().unwrap_or_default(),
                uniforms: DummyShader::declared_uniforms([
                    &desc.vertex_source,
                    &desc.fragment_source,
                ]),
            },
        );
        self.record(DummyCommand::LoadShader(handle));
        Ok(handle)
    }

    fn uniform_location(&self, shader: ShaderHandle, name: &str) -> Option<UniformLocation> {
        self.shaders
            .get(&shader.0)?
            .uniforms
            .iter()
            .position(|n| n == name)
            .map(|i| UniformLocation(i as u32))
    }

    fn set_uniform(
        &mut self,
        shader: ShaderHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        let Some(program) = self.shaders.get(&shader.0) else {
            log::warn!("DummyBackend: set_uniform on unknown shader {}", shader.0);
            return;
        };
        let Some(name) = program.uniforms.get(location.0 as usize).cloned() else {
            log::warn!(
                "DummyBackend: shader '{}' has no uniform at location {}",
                program.label,
                location.0
            );
            return;
        };

        self.uniforms.insert((shader.0, name.clone()), value);
        self.record(DummyCommand::SetUniform {
            shader,
            name,
            value,
        });
    }

    fn use_shader(&mut self, shader: Option<ShaderHandle>) {
        self.bound_shader = shader;
        self.record(DummyCommand::UseShader(shader));
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader.0);
        self.uniforms.retain(|(id, _), _| *id != shader.0);
        if self.bound_shader == Some(shader) {
            self.bound_shader = None;
        }
        self.record(DummyCommand::DestroyShader(shader));
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

        let handle = TextureHandle(self.alloc());
        self.textures.insert(
            handle.0,
            DummyTexture {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                mip_levels: desc.mip_levels,
                is_cubemap: false,
            },
        );
        self.record(DummyCommand::CreateTexture(handle));
        Ok(handle)
    }

    fn create_cubemap(&mut self, size: u32, format: TextureFormat) -> BackendResult<TextureHandle> {
        if self.fail_cubemaps {
            return Err(BackendError::OutOfMemory);
        }
        if size == 0 || !format.is_color_renderable() {
            return Err(BackendError::TextureCreationFailed(format!(
                "cannot create {}x{} {:?} cubemap",
                size, size, format
            )));
        }

        let handle = TextureHandle(self.alloc());
        self.textures.insert(
            handle.0,
            DummyTexture {
                width: size,
                height: size,
                format,
                mip_levels: 1,
                is_cubemap: true,
            },
        );
        self.record(DummyCommand::CreateCubemap(handle));
        Ok(handle)
    }

    fn write_cubemap_face(
        &mut self,
        cubemap: TextureHandle,
        face: CubemapFace,
        data: &[u8],
    ) -> BackendResult<()> {
        let texture = self
            .textures
            .get(&cubemap.0)
            .filter(|t| t.is_cubemap)
            .ok_or(BackendError::InvalidHandle {
                kind: "cubemap",
                id: cubemap.0,
            })?;

        let expected = texture.format.image_size(texture.width, texture.height);
        if data.len() != expected {
            return Err(BackendError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        self.record(DummyCommand::WriteCubemapFace { cubemap, face });
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
        self.record(DummyCommand::BindTexture { slot, texture });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_none() {
            log::warn!("DummyBackend: double free of texture {}", texture.0);
        }
        self.record(DummyCommand::DestroyTexture(texture));
    }

    fn create_depth_renderbuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> BackendResult<RenderbufferHandle> {
        let handle = RenderbufferHandle(self.alloc());
        self.renderbuffers.insert(handle.0, (width, height));
        self.record(DummyCommand::CreateRenderbuffer(handle));
        Ok(handle)
    }

    fn destroy_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.renderbuffers.remove(&renderbuffer.0);
        self.record(DummyCommand::DestroyRenderbuffer(renderbuffer));
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> BackendResult<FramebufferHandle> {
        if width == 0 || height == 0 {
            return Err(BackendError::FramebufferCreationFailed(format!(
                "invalid size {}x{}",
                width, height
            )));
        }

        let handle = FramebufferHandle(self.alloc());
        self.framebuffers.insert(
            handle.0,
            DummyFramebuffer {
                width,
                height,
                depth: None,
                color: None,
            },
        );
        self.record(DummyCommand::CreateFramebuffer(handle));
        Ok(handle)
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

        // Attaching enables, attaches and disables the framebuffer
        self.bound_framebuffer = None;
        self.record(DummyCommand::Attach {
            framebuffer,
            attachment,
        });
        Ok(())
    }

    fn framebuffer_status(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(entry) = self.framebuffers.get(&framebuffer.0) else {
            return FramebufferStatus::InvalidAttachment;
        };
        if self.force_incomplete {
            return FramebufferStatus::MissingColorAttachment;
        }

        let color = entry.color.map(|(cubemap, _)| {
            self.textures
                .get(&cubemap.0)
                .filter(|t| t.is_cubemap)
                .map(|t| (t.width, t.height))
        });
        let depth = entry
            .depth
            .map(|rb| self.renderbuffers.get(&rb.0).copied());

        FramebufferStatus::evaluate((entry.width, entry.height), color, depth)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        self.record(DummyCommand::BindFramebuffer(framebuffer));
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
        self.record(DummyCommand::DestroyFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = (x, y, width, height);
        self.record(DummyCommand::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn set_backface_culling(&mut self, enabled: bool) {
        self.backface_culling = enabled;
        self.record(DummyCommand::SetBackfaceCulling(enabled));
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.record(DummyCommand::SetDepthMask(enabled));
    }

    fn clear(&mut self, _color: [f32; 4]) {
        let framebuffer = self.bound_framebuffer;
        self.record(DummyCommand::Clear { framebuffer });
    }

    fn create_mesh(&mut self, mesh: &Mesh) -> BackendResult<MeshHandle> {
        let handle = MeshHandle(self.alloc());
        self.meshes.insert(handle.0, mesh.index_count());
        self.record(DummyCommand::CreateMesh(handle));
        Ok(handle)
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> BackendResult<()> {
        let shader = self.bound_shader.ok_or(BackendError::NoShaderBound)?;
        if !self.meshes.contains_key(&mesh.0) {
            return Err(BackendError::InvalidHandle {
                kind: "mesh",
                id: mesh.0,
            });
        }
        if let Some(texture) = self.bound_textures.get(&0) {
            if !self.textures.contains_key(&texture.0) {
                return Err(BackendError::InvalidHandle {
                    kind: "texture",
                    id: texture.0,
                });
            }
        }

        let target = match self.bound_framebuffer {
            Some(fb) => {
                let status = self.framebuffer_status(fb);
                if !status.is_complete() {
                    return Err(BackendError::FramebufferIncomplete(status));
                }
                self.framebuffers.get(&fb.0).and_then(|f| f.color)
            }
            None => None,
        };

        self.record(DummyCommand::Draw {
            mesh,
            shader,
            framebuffer: self.bound_framebuffer,
            target,
            backface_culling: self.backface_culling,
            depth_write: self.depth_write,
        });
        Ok(())
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh.0);
        self.record(DummyCommand::DestroyMesh(mesh));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader(backend: &mut DummyBackend) -> ShaderHandle {
        backend
            .load_shader(&ShaderDescriptor {
                label: Some("test".into()),
                vertex_source: "uniform mat4 matView;\nvoid main() {}".into(),
                fragment_source: "uniform int doGamma;\nuniform mat4 matView;\nvoid main() {}"
                    .into(),
            })
            .unwrap()
    }

    #[test]
    fn test_attach_leaves_framebuffer_unbound() {
        let mut backend = DummyBackend::new();
        let fb = backend.create_framebuffer(16, 16).unwrap();
        let rb = backend.create_depth_renderbuffer(16, 16).unwrap();

        backend.bind_framebuffer(Some(fb));
        backend.framebuffer_attach(fb, Attachment::Depth(rb)).unwrap();

        assert_eq!(backend.bound_framebuffer(), None);
    }

    #[test]
    fn test_destroy_framebuffer_releases_depth() {
        let mut backend = DummyBackend::new();
        let fb = backend.create_framebuffer(16, 16).unwrap();
        let rb = backend.create_depth_renderbuffer(16, 16).unwrap();
        backend.framebuffer_attach(fb, Attachment::Depth(rb)).unwrap();

        backend.destroy_framebuffer(fb);

        assert_eq!(backend.live_framebuffers(), 0);
        assert_eq!(backend.live_renderbuffers(), 0);
    }

    #[test]
    fn test_draw_into_incomplete_framebuffer_fails() {
        let mut backend = DummyBackend::new();
        let shader = shader(&mut backend);
        let mesh = backend.create_mesh(&Mesh::cube(1.0)).unwrap();
        let fb = backend.create_framebuffer(16, 16).unwrap();

        backend.use_shader(Some(shader));
        backend.bind_framebuffer(Some(fb));

        let err = backend.draw_mesh(mesh).unwrap_err();
        assert!(matches!(
            err,
            BackendError::FramebufferIncomplete(FramebufferStatus::MissingAttachment)
        ));
    }

    #[test]
    fn test_draw_with_destroyed_texture_fails() {
        let mut backend = DummyBackend::new();
        let shader = shader(&mut backend);
        let mesh = backend.create_mesh(&Mesh::cube(1.0)).unwrap();
        let cubemap = backend.create_cubemap(4, TextureFormat::Rgba8Unorm).unwrap();

        backend.use_shader(Some(shader));
        backend.bind_texture(0, Some(cubemap));
        backend.destroy_texture(cubemap);

        assert!(matches!(
            backend.draw_mesh(mesh),
            Err(BackendError::InvalidHandle { kind: "texture", .. })
        ));
    }

    #[test]
    fn test_uniform_locations_follow_declarations() {
        let mut backend = DummyBackend::new();
        let shader = shader(&mut backend);

        let view = backend.uniform_location(shader, "matView").unwrap();
        let gamma = backend.uniform_location(shader, "doGamma").unwrap();
        backend.set_uniform(shader, gamma, UniformValue::Int(1));

        assert_ne!(view, gamma);
        assert_eq!(backend.uniform_location(shader, "missing"), None);
        assert_eq!(backend.uniform_value(shader, "doGamma"), Some(UniformValue::Int(1)));
        assert_eq!(backend.uniform_value(shader, "matView"), None);
    }

    #[test]
    fn test_error_directive_fails_compilation() {
        let mut backend = DummyBackend::new();
        let result = backend.load_shader(&ShaderDescriptor {
            label: None,
            vertex_source: "#error broken".into(),
            fragment_source: "void main() {}".into(),
        });
        assert!(matches!(result, Err(BackendError::ShaderCreationFailed(_))));
        assert_eq!(backend.live_shaders(), 0);
    }
}

//! Cubemap baking
//!
//! Two paths produce a cubemap: cross/line layout images are split on the CPU and
//! uploaded face by face, equirectangular panoramas are re-projected on the GPU by
//! drawing a cube six times into an offscreen framebuffer, once per face.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{SkyboxError, SkyboxResult};
use crate::resources::{CubemapFaces, Mesh};
use crate::skybox::set_named_uniform;
use glam::{Mat4, Vec3};

/// Projection uniform of both skybox programs
pub const UNIFORM_PROJECTION: &str = "matProjection";
/// View uniform of both skybox programs
pub const UNIFORM_VIEW: &str = "matView";
/// Texture unit the panorama is bound to while baking
pub const PANORAMA_TEXTURE_UNIT: u32 = 0;

/// Camera of one bake pass: looks from the origin along `direction`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubemapFaceView {
    pub face: CubemapFace,
    pub direction: Vec3,
    pub up: Vec3,
}

impl CubemapFaceView {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(Vec3::ZERO, self.direction, self.up)
    }
}

/// Bake cameras in layer order.
///
/// Horizontal faces use -Y as up. The ±Y faces look along the up axis, so they use
/// ±Z instead; this keeps the seams of adjacent faces aligned with the OpenGL
/// cubemap convention.
pub const CUBEMAP_FACE_VIEWS: [CubemapFaceView; 6] = [
    CubemapFaceView {
        face: CubemapFace::PositiveX,
        direction: Vec3::X,
        up: Vec3::NEG_Y,
    },
    CubemapFaceView {
        face: CubemapFace::NegativeX,
        direction: Vec3::NEG_X,
        up: Vec3::NEG_Y,
    },
    CubemapFaceView {
        face: CubemapFace::PositiveY,
        direction: Vec3::Y,
        up: Vec3::Z,
    },
    CubemapFaceView {
        face: CubemapFace::NegativeY,
        direction: Vec3::NEG_Y,
        up: Vec3::NEG_Z,
    },
    CubemapFaceView {
        face: CubemapFace::PositiveZ,
        direction: Vec3::Z,
        up: Vec3::NEG_Y,
    },
    CubemapFaceView {
        face: CubemapFace::NegativeZ,
        direction: Vec3::NEG_Z,
        up: Vec3::NEG_Y,
    },
];

/// A baked cubemap and what it was baked as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cubemap {
    pub handle: TextureHandle,
    pub size: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
}

/// What to bake from
#[derive(Debug, Clone, Copy)]
pub enum BakeSource<'a> {
    /// Equirectangular panorama texture, re-projected with the conversion program
    Panorama {
        shader: ShaderHandle,
        texture: TextureHandle,
    },
    /// Faces already cut out of a cross or line layout image
    Cross(&'a CubemapFaces),
}

/// Resources a panorama bake owns until it finishes
#[derive(Default)]
struct BakeTargets {
    depth: Option<RenderbufferHandle>,
    depth_attached: bool,
    cubemap: Option<TextureHandle>,
    framebuffer: Option<FramebufferHandle>,
    mesh: Option<MeshHandle>,
}

impl BakeTargets {
    /// Release everything except the cubemap when `keep_cubemap` is set
    fn release<B: GraphicsBackend>(self, backend: &mut B, keep_cubemap: bool) {
        if let Some(framebuffer) = self.framebuffer {
            backend.destroy_framebuffer(framebuffer);
        }
        if let Some(depth) = self.depth {
            if !(self.depth_attached && self.framebuffer.is_some()) {
                backend.destroy_renderbuffer(depth);
            }
        }
        if let Some(mesh) = self.mesh {
            backend.destroy_mesh(mesh);
        }
        if let (Some(cubemap), false) = (self.cubemap, keep_cubemap) {
            backend.destroy_texture(cubemap);
        }
    }
}

/// Stateless cubemap baker
pub struct CubemapBaker;

impl CubemapBaker {
    /// Bake `source` into a new cubemap.
    ///
    /// Panoramas are rendered at `size` x `size` in `format`. Cross layouts keep the
    /// face size and pixel format of the source image.
    pub fn bake<B: GraphicsBackend>(
        backend: &mut B,
        source: BakeSource<'_>,
        size: u32,
        format: TextureFormat,
        clear_color: [f32; 4],
    ) -> SkyboxResult<Cubemap> {
        match source {
            BakeSource::Cross(faces) => Self::upload_faces(backend, faces),
            BakeSource::Panorama { shader, texture } => {
                Self::render_panorama(backend, shader, texture, size, format, clear_color)
            }
        }
    }

    /// Upload pre-cut faces into a new cubemap
    pub fn upload_faces<B: GraphicsBackend>(
        backend: &mut B,
        faces: &CubemapFaces,
    ) -> SkyboxResult<Cubemap> {
        let handle = backend.create_cubemap(faces.size, faces.format)?;

        for (face, pixels) in CubemapFace::ALL.iter().zip(&faces.faces) {
            if let Err(e) = backend.write_cubemap_face(handle, *face, pixels) {
                backend.destroy_texture(handle);
                return Err(e.into());
            }
        }

        log::info!(
            "Cubemap [ID {}] loaded from {:?} layout ({}x{})",
            handle.id(),
            faces.layout,
            faces.size,
            faces.size
        );

        Ok(Cubemap {
            handle,
            size: faces.size,
            mip_levels: 1,
            format: faces.format,
        })
    }

    /// Project an equirectangular panorama onto the six cube faces
    pub fn render_panorama<B: GraphicsBackend>(
        backend: &mut B,
        shader: ShaderHandle,
        panorama: TextureHandle,
        size: u32,
        format: TextureFormat,
        clear_color: [f32; 4],
    ) -> SkyboxResult<Cubemap> {
        // The camera sits inside the cube
        backend.set_backface_culling(false);

        let mut targets = BakeTargets::default();
        let result = Self::render_faces(
            backend,
            &mut targets,
            shader,
            panorama,
            size,
            format,
            clear_color,
        );

        backend.use_shader(None);
        backend.bind_texture(PANORAMA_TEXTURE_UNIT, None);
        backend.bind_framebuffer(None);

        targets.release(backend, result.is_ok());

        let (width, height) = backend.framebuffer_size();
        backend.set_viewport(0, 0, width, height);
        backend.set_backface_culling(true);

        let handle = result?;
        log::info!(
            "Cubemap [ID {}] baked from panorama [ID {}] ({}x{} {:?})",
            handle.id(),
            panorama.id(),
            size,
            size,
            format
        );

        Ok(Cubemap {
            handle,
            size,
            mip_levels: 1,
            format,
        })
    }

    fn render_faces<B: GraphicsBackend>(
        backend: &mut B,
        targets: &mut BakeTargets,
        shader: ShaderHandle,
        panorama: TextureHandle,
        size: u32,
        format: TextureFormat,
        clear_color: [f32; 4],
    ) -> SkyboxResult<TextureHandle> {
        let depth = backend.create_depth_renderbuffer(size, size)?;
        targets.depth = Some(depth);
        let cubemap = backend.create_cubemap(size, format)?;
        targets.cubemap = Some(cubemap);
        let framebuffer = backend.create_framebuffer(size, size)?;
        targets.framebuffer = Some(framebuffer);

        backend.framebuffer_attach(framebuffer, Attachment::Depth(depth))?;
        targets.depth_attached = true;
        backend.framebuffer_attach(
            framebuffer,
            Attachment::CubemapFace {
                cubemap,
                face: CubemapFace::PositiveX,
            },
        )?;

        let status = backend.framebuffer_status(framebuffer);
        if !status.is_complete() {
            log::error!(
                "FBO: [ID {:?}] Framebuffer object is not complete: {:?}",
                framebuffer,
                status
            );
            return Err(SkyboxError::FramebufferIncomplete(status));
        }
        log::debug!("FBO: [ID {:?}] Framebuffer object created successfully", framebuffer);

        let mesh = backend.create_mesh(&Mesh::cube(1.0))?;
        targets.mesh = Some(mesh);

        backend.use_shader(Some(shader));

        let clip = backend.clip_space();
        let (near, far) = backend.cull_distances();
        let projection = clip.offscreen_correction()
            * clip.perspective(90f32.to_radians(), 1.0, near, far);
        set_named_uniform(
            backend,
            shader,
            UNIFORM_PROJECTION,
            UniformValue::Mat4(projection),
        );

        backend.set_viewport(0, 0, size, size);
        backend.bind_texture(PANORAMA_TEXTURE_UNIT, Some(panorama));

        for view in &CUBEMAP_FACE_VIEWS {
            set_named_uniform(
                backend,
                shader,
                UNIFORM_VIEW,
                UniformValue::Mat4(view.view_matrix()),
            );

            // Attaching unbinds the framebuffer, so bind it again afterwards
            backend.framebuffer_attach(
                framebuffer,
                Attachment::CubemapFace {
                    cubemap,
                    face: view.face,
                },
            )?;
            backend.bind_framebuffer(Some(framebuffer));

            backend.clear(clear_color);
            backend.draw_mesh(mesh)?;
            log::debug!("Baked cubemap face {}", view.face.name());
        }

        Ok(cubemap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_face_views_in_layer_order() {
        for (i, view) in CUBEMAP_FACE_VIEWS.iter().enumerate() {
            assert_eq!(view.face.index() as usize, i);
            assert_eq!(view.direction.length(), 1.0);
            assert_eq!(view.direction.dot(view.up), 0.0);
        }
    }

    #[test]
    fn test_view_looks_down_face_axis() {
        for view in &CUBEMAP_FACE_VIEWS {
            // Right-handed views look down -Z in eye space
            let eye = view.view_matrix() * view.direction.extend(0.0);
            assert!((eye - Vec4::new(0.0, 0.0, -1.0, 0.0)).length() < 1e-6);
        }
    }

    #[test]
    fn test_vertical_faces_use_depth_axis_up() {
        assert_eq!(CUBEMAP_FACE_VIEWS[2].up, Vec3::Z);
        assert_eq!(CUBEMAP_FACE_VIEWS[3].up, Vec3::NEG_Z);
        for i in [0, 1, 4, 5] {
            assert_eq!(CUBEMAP_FACE_VIEWS[i].up, Vec3::NEG_Y);
        }
    }
}

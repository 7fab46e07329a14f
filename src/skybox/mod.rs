//! Skybox resource
//!
//! A [`Skybox`] owns a unit cube, the program that draws it, the program that
//! converts panoramas, and one baked cubemap. The application drives it with
//! [`Skybox::load`], [`Skybox::update`] once per frame, [`Skybox::draw`] and finally
//! [`Skybox::unload`].

mod baker;
mod hot_swap;

pub use baker::*;
pub use hot_swap::*;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{SkyboxError, SkyboxResult};
use crate::overlay::{TextOverlay, BLACK};
use crate::resources::{file_name, shader, Mesh};
use crate::scene::Camera;
use crate::SkyboxConfig;
use glam::Mat4;
use std::path::{Path, PathBuf};

/// Texture unit the cubemap is sampled from
pub const ENVIRONMENT_MAP_UNIT: i32 = 0;

pub const UNIFORM_ENVIRONMENT_MAP: &str = "environmentMap";
pub const UNIFORM_DO_GAMMA: &str = "doGamma";
pub const UNIFORM_VFLIPPED: &str = "vflipped";
pub const UNIFORM_EQUIRECTANGULAR_MAP: &str = "equirectangularMap";

/// Resolve `name` on `shader` and set it, warning when the program lacks it
pub(crate) fn set_named_uniform<B: GraphicsBackend>(
    backend: &mut B,
    shader: ShaderHandle,
    name: &str,
    value: UniformValue,
) {
    match backend.uniform_location(shader, name) {
        Some(location) => backend.set_uniform(shader, location, value),
        None => log::warn!("Shader uniform '{}' not found", name),
    }
}

/// Handles acquired by [`Skybox::load`] so far
#[derive(Default)]
struct Acquired {
    mesh: Option<MeshHandle>,
    skybox_shader: Option<ShaderHandle>,
    conversion_shader: Option<ShaderHandle>,
}

impl Acquired {
    fn release<B: GraphicsBackend>(self, backend: &mut B) {
        if let Some(shader) = self.skybox_shader {
            backend.destroy_shader(shader);
        }
        if let Some(shader) = self.conversion_shader {
            backend.destroy_shader(shader);
        }
        if let Some(mesh) = self.mesh {
            backend.destroy_mesh(mesh);
        }
    }
}

struct Loaded {
    mesh: MeshHandle,
    skybox_shader: ShaderHandle,
    conversion_shader: ShaderHandle,
    cubemap: Cubemap,
}

/// A loaded skybox
#[derive(Debug)]
pub struct Skybox {
    uses_hdr: bool,
    source_path: PathBuf,
    skybox_shader: ShaderHandle,
    conversion_shader: ShaderHandle,
    mesh: MeshHandle,
    cubemap: Option<Cubemap>,
    config: SkyboxConfig,
    released: bool,
}

impl Skybox {
    /// Load a skybox from a cross/line layout image, or from an equirectangular
    /// panorama when `hdr_path` is given.
    ///
    /// With a panorama, `image_path` is not read. On failure every handle acquired
    /// so far is released.
    pub fn load<B: GraphicsBackend>(
        backend: &mut B,
        config: &SkyboxConfig,
        image_path: impl AsRef<Path>,
        hdr_path: Option<&Path>,
    ) -> SkyboxResult<Self> {
        let uses_hdr = hdr_path.is_some();
        let source_path = hdr_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| image_path.as_ref().to_path_buf());

        let mut acquired = Acquired::default();
        let loaded = match Self::acquire(backend, config, &source_path, uses_hdr, &mut acquired)
        {
            Ok(loaded) => loaded,
            Err(e) => {
                log::error!("Failed to load skybox from {}: {}", source_path.display(), e);
                acquired.release(backend);
                return Err(e);
            }
        };

        let Loaded {
            mesh,
            skybox_shader,
            conversion_shader,
            cubemap,
        } = loaded;

        log::info!(
            "Skybox loaded from {} ({}, {}x{})",
            source_path.display(),
            if uses_hdr { "panorama" } else { "cross layout" },
            cubemap.size,
            cubemap.size
        );

        Ok(Self {
            uses_hdr,
            source_path,
            skybox_shader,
            conversion_shader,
            mesh,
            cubemap: Some(cubemap),
            config: config.clone(),
            released: false,
        })
    }

    fn acquire<B: GraphicsBackend>(
        backend: &mut B,
        config: &SkyboxConfig,
        source_path: &Path,
        uses_hdr: bool,
        acquired: &mut Acquired,
    ) -> SkyboxResult<Loaded> {
        let mesh = backend.create_mesh(&Mesh::cube(1.0))?;
        acquired.mesh = Some(mesh);

        let paths = &config.shaders;
        let skybox_shader = shader::load_program(
            backend,
            "skybox",
            &paths.skybox_vertex,
            &paths.skybox_fragment,
        )?;
        acquired.skybox_shader = Some(skybox_shader);

        let flag = UniformValue::Int(uses_hdr as i32);
        set_named_uniform(
            backend,
            skybox_shader,
            UNIFORM_ENVIRONMENT_MAP,
            UniformValue::Int(ENVIRONMENT_MAP_UNIT),
        );
        set_named_uniform(backend, skybox_shader, UNIFORM_DO_GAMMA, flag);
        set_named_uniform(backend, skybox_shader, UNIFORM_VFLIPPED, flag);

        let conversion_shader = shader::load_program(
            backend,
            "cubemap",
            &paths.conversion_vertex,
            &paths.conversion_fragment,
        )?;
        acquired.conversion_shader = Some(conversion_shader);

        set_named_uniform(
            backend,
            conversion_shader,
            UNIFORM_EQUIRECTANGULAR_MAP,
            UniformValue::Int(PANORAMA_TEXTURE_UNIT as i32),
        );
        log::debug!("Skybox uniforms wired (doGamma = vflipped = {})", uses_hdr);

        let source = PreparedSource::load(source_path, uses_hdr)?;
        let cubemap = bake_prepared(backend, config, conversion_shader, &source)?;

        Ok(Loaded {
            mesh,
            skybox_shader,
            conversion_shader,
            cubemap,
        })
    }

    /// Check this frame's dropped files and rebake from an accepted one.
    ///
    /// The HDR flag chosen at load time is kept; a file that cannot be baked through
    /// that path is rejected before the current cubemap is touched. A GPU failure
    /// after the old cubemap was released leaves the skybox without one.
    pub fn update<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        dropped_files: &[PathBuf],
    ) -> SkyboxResult<SwapOutcome> {
        let path = match select_drop(dropped_files, &self.config.accepted_extensions) {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(SwapOutcome::NoDrop),
            Err(rejection) => {
                log::warn!("Ignoring file drop: {}", rejection);
                return Ok(SwapOutcome::Rejected(rejection));
            }
        };

        let source = match PreparedSource::validate_drop(path, self.uses_hdr) {
            Ok(source) => source,
            Err(rejection) => {
                log::warn!("Ignoring file drop: {}", rejection);
                return Ok(SwapOutcome::Rejected(rejection));
            }
        };

        if let Some(old) = self.cubemap.take() {
            backend.destroy_texture(old.handle);
        }

        let cubemap = bake_prepared(backend, &self.config, self.conversion_shader, &source)?;
        self.cubemap = Some(cubemap);
        self.source_path = path.to_path_buf();
        log::info!("Skybox swapped to {}", self.source_path.display());

        Ok(SwapOutcome::Swapped {
            path: self.source_path.clone(),
        })
    }

    /// Draw the skybox cube with culling and depth writes off
    pub fn draw<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        view: Mat4,
        projection: Mat4,
    ) -> SkyboxResult<()> {
        let cubemap = self.cubemap.ok_or(SkyboxError::MissingCubemap)?;

        backend.set_backface_culling(false);
        backend.set_depth_mask(false);

        backend.use_shader(Some(self.skybox_shader));
        set_named_uniform(
            backend,
            self.skybox_shader,
            UNIFORM_PROJECTION,
            UniformValue::Mat4(projection),
        );
        set_named_uniform(
            backend,
            self.skybox_shader,
            UNIFORM_VIEW,
            UniformValue::Mat4(view),
        );
        backend.bind_texture(ENVIRONMENT_MAP_UNIT as u32, Some(cubemap.handle));

        let result = backend.draw_mesh(self.mesh);

        backend.bind_texture(ENVIRONMENT_MAP_UNIT as u32, None);
        backend.use_shader(None);
        backend.set_depth_mask(true);
        backend.set_backface_culling(true);

        Ok(result?)
    }

    /// Draw from `camera`'s point of view
    pub fn draw_with_camera<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        camera: &Camera,
    ) -> SkyboxResult<()> {
        let projection = camera.projection_matrix(backend.clip_space());
        self.draw(backend, camera.view_matrix(), projection)
    }

    /// Text naming the current source image
    pub fn info_text(&self) -> String {
        let name = file_name(&self.source_path);
        if self.uses_hdr {
            format!("Panorama image from hdrihaven.com: {}", name)
        } else {
            format!(": {}", name)
        }
    }

    /// Show [`Skybox::info_text`] in the bottom-left corner
    pub fn draw_info_overlay(&self, overlay: &mut impl TextOverlay) {
        let y = overlay.screen_height() as i32 - 20;
        overlay.draw_text(&self.info_text(), 10, y, 10, BLACK);
    }

    /// Release the skybox program, the conversion program, the cubemap and the
    /// mesh, in that order
    pub fn unload<B: GraphicsBackend>(mut self, backend: &mut B) {
        backend.destroy_shader(self.skybox_shader);
        backend.destroy_shader(self.conversion_shader);
        if let Some(cubemap) = self.cubemap.take() {
            backend.destroy_texture(cubemap.handle);
        }
        backend.destroy_mesh(self.mesh);
        self.released = true;
        log::info!("Skybox unloaded ({})", self.source_path.display());
    }

    pub fn uses_hdr(&self) -> bool {
        self.uses_hdr
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The active cubemap, `None` only after a failed swap
    pub fn cubemap(&self) -> Option<&Cubemap> {
        self.cubemap.as_ref()
    }

    pub fn skybox_shader(&self) -> ShaderHandle {
        self.skybox_shader
    }

    pub fn conversion_shader(&self) -> ShaderHandle {
        self.conversion_shader
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn config(&self) -> &SkyboxConfig {
        &self.config
    }
}

impl Drop for Skybox {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "Skybox ({}) dropped without unload; GPU handles leaked",
                self.source_path.display()
            );
        }
    }
}

/// Bake a decoded source; the temporary panorama texture is released afterwards
fn bake_prepared<B: GraphicsBackend>(
    backend: &mut B,
    config: &SkyboxConfig,
    conversion_shader: ShaderHandle,
    source: &PreparedSource,
) -> SkyboxResult<Cubemap> {
    match source {
        PreparedSource::Cross(faces) => CubemapBaker::bake(
            backend,
            BakeSource::Cross(faces),
            config.bake_size,
            config.bake_format,
            config.clear_color,
        ),
        PreparedSource::Panorama(image) => {
            let panorama = image.upload(backend)?;
            let result = CubemapBaker::bake(
                backend,
                BakeSource::Panorama {
                    shader: conversion_shader,
                    texture: panorama,
                },
                config.bake_size,
                config.bake_format,
                config.clear_color,
            );
            backend.destroy_texture(panorama);
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Color;

    struct Recorder {
        height: u32,
        lines: Vec<(String, i32, i32, u32, Color)>,
    }

    impl TextOverlay for Recorder {
        fn screen_height(&self) -> u32 {
            self.height
        }

        fn draw_text(&mut self, text: &str, x: i32, y: i32, font_size: u32, color: Color) {
            self.lines.push((text.to_string(), x, y, font_size, color));
        }
    }

    fn skybox(uses_hdr: bool, path: &str) -> Skybox {
        Skybox {
            uses_hdr,
            source_path: PathBuf::from(path),
            skybox_shader: ShaderHandle(1),
            conversion_shader: ShaderHandle(2),
            mesh: MeshHandle(3),
            cubemap: None,
            config: SkyboxConfig::default(),
            released: true,
        }
    }

    #[test]
    fn test_info_text() {
        assert_eq!(
            skybox(true, "assets/dresden_square_2k.hdr").info_text(),
            "Panorama image from hdrihaven.com: dresden_square_2k.hdr"
        );
        assert_eq!(skybox(false, "assets/skybox.png").info_text(), ": skybox.png");
    }

    #[test]
    fn test_overlay_anchored_bottom_left() {
        let mut overlay = Recorder {
            height: 450,
            lines: Vec::new(),
        };
        skybox(false, "skybox.png").draw_info_overlay(&mut overlay);

        assert_eq!(
            overlay.lines,
            vec![(": skybox.png".to_string(), 10, 430, 10, BLACK)]
        );
    }
}

//! Skybox - cubemap skybox loading and baking
//!
//! Turns an environment image into a GPU cubemap and draws it around the camera.
//! Two kinds of source are supported:
//! - **Cross/line layouts**: six faces packed into one image, split on the CPU
//! - **Equirectangular panoramas**: re-projected onto the six faces by an
//!   offscreen render pass
//!
//! Everything GPU-facing goes through [`GraphicsBackend`]. [`WgpuBackend`] renders
//! with wgpu, [`DummyBackend`] records calls without a GPU.
//!
//! # Features
//! - Runtime hot-swap of the source image from file drops
//! - Shader sources resolved per shading-language dialect
//! - Hardened bake: incomplete framebuffers abort instead of rendering garbage

pub mod backend;
pub mod error;
pub mod overlay;
pub mod resources;
pub mod scene;
pub mod skybox;
pub mod window;

pub use backend::dummy::DummyBackend;
pub use backend::wgpu_backend::WgpuBackend;
pub use backend::{GraphicsBackend, TextureFormat};
pub use error::{SkyboxError, SkyboxResult};
pub use skybox::{Cubemap, CubemapBaker, DropRejection, Skybox, SwapOutcome};
pub use window::Window;

use std::path::Path;

/// Path templates of the two shader programs.
///
/// `{dialect}` is replaced with the backend's dialect selector
/// (`glsl330`, `glsl100` or `wgsl`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyboxShaderPaths {
    pub skybox_vertex: String,
    pub skybox_fragment: String,
    pub conversion_vertex: String,
    pub conversion_fragment: String,
}

impl Default for SkyboxShaderPaths {
    fn default() -> Self {
        Self::in_dir("shaders")
    }
}

impl SkyboxShaderPaths {
    /// Standard file names under `root/{dialect}/`
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        let template = |file: &str| {
            root.as_ref()
                .join(resources::shader::DIALECT_PLACEHOLDER)
                .join(file)
                .to_string_lossy()
                .into_owned()
        };
        Self {
            skybox_vertex: template("skybox.vs"),
            skybox_fragment: template("skybox.fs"),
            conversion_vertex: template("cubemap.vs"),
            conversion_fragment: template("cubemap.fs"),
        }
    }
}

/// Configuration for loading a skybox
#[derive(Debug, Clone)]
pub struct SkyboxConfig {
    /// Edge length of cubemaps baked from panoramas
    pub bake_size: u32,
    /// Pixel format of cubemaps baked from panoramas
    pub bake_format: TextureFormat,
    pub shaders: SkyboxShaderPaths,
    /// File extensions accepted from drops, without the dot
    pub accepted_extensions: Vec<String>,
    /// Clear color of each bake pass
    pub clear_color: [f32; 4],
}

impl Default for SkyboxConfig {
    fn default() -> Self {
        Self {
            bake_size: 1024,
            bake_format: TextureFormat::Rgba8Unorm,
            shaders: SkyboxShaderPaths::default(),
            accepted_extensions: ["png", "jpg", "hdr", "bmp", "tga"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl SkyboxConfig {
    pub fn with_bake_size(mut self, size: u32) -> Self {
        self.bake_size = size;
        self
    }

    pub fn with_bake_format(mut self, format: TextureFormat) -> Self {
        self.bake_format = format;
        self
    }

    pub fn with_shaders(mut self, shaders: SkyboxShaderPaths) -> Self {
        self.shaders = shaders;
        self
    }

    pub fn with_accepted_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShaderDialect;
    use crate::resources::shader::resolve_path;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = SkyboxConfig::default();
        assert_eq!(config.bake_size, 1024);
        assert_eq!(config.bake_format, TextureFormat::Rgba8Unorm);
        assert_eq!(config.accepted_extensions.len(), 5);
    }

    #[test]
    fn test_shader_paths_resolve_per_dialect() {
        let paths = SkyboxShaderPaths::default();
        assert_eq!(
            resolve_path(&paths.skybox_vertex, ShaderDialect::Wgsl),
            PathBuf::from("shaders").join("wgsl").join("skybox.vs")
        );
        assert_eq!(
            resolve_path(&paths.conversion_fragment, ShaderDialect::Glsl100),
            PathBuf::from("shaders").join("glsl100").join("cubemap.fs")
        );
    }

    #[test]
    fn test_builders() {
        let config = SkyboxConfig::default()
            .with_bake_size(256)
            .with_bake_format(TextureFormat::Rgba16Float)
            .with_accepted_extensions(["png"])
            .with_clear_color([1.0, 0.0, 0.0, 1.0]);

        assert_eq!(config.bake_size, 256);
        assert_eq!(config.bake_format, TextureFormat::Rgba16Float);
        assert_eq!(config.accepted_extensions, vec!["png".to_string()]);
        assert_eq!(config.clear_color, [1.0, 0.0, 0.0, 1.0]);
    }
}

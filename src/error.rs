//! Error types for skybox loading and baking

use crate::backend::{BackendError, FramebufferStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, baking or drawing a skybox
#[derive(Error, Debug)]
pub enum SkyboxError {
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to read shader source {path}: {source}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cubemap layout not detected for a {width}x{height} image")]
    LayoutNotDetected { width: u32, height: u32 },
    #[error("Bake framebuffer is incomplete: {0:?}")]
    FramebufferIncomplete(FramebufferStatus),
    #[error("Skybox has no cubemap; the last swap failed")]
    MissingCubemap,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type SkyboxResult<T> = Result<T, SkyboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SkyboxError::LayoutNotDetected {
            width: 100,
            height: 70,
        };
        assert_eq!(
            err.to_string(),
            "Cubemap layout not detected for a 100x70 image"
        );
    }

    #[test]
    fn test_backend_error_converts() {
        fn fails() -> SkyboxResult<()> {
            Err(BackendError::NoShaderBound)?
        }
        assert!(matches!(
            fails(),
            Err(SkyboxError::Backend(BackendError::NoShaderBound))
        ));
    }

    #[test]
    fn test_shader_source_error_keeps_path() {
        let err = SkyboxError::ShaderSource {
            path: PathBuf::from("shaders/wgsl/skybox.vs"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("shaders/wgsl/skybox.vs"));
    }
}

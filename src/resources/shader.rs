//! Shader source loading with dialect-substituted paths

use crate::backend::traits::{GraphicsBackend, ShaderHandle};
use crate::backend::types::{ShaderDescriptor, ShaderDialect};
use crate::error::{SkyboxError, SkyboxResult};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the backend's dialect selector
pub const DIALECT_PLACEHOLDER: &str = "{dialect}";

/// Substitute the dialect selector into a path template
pub fn resolve_path(template: &str, dialect: ShaderDialect) -> PathBuf {
    PathBuf::from(template.replace(DIALECT_PLACEHOLDER, dialect.selector()))
}

fn read_source(path: &Path) -> SkyboxResult<String> {
    std::fs::read_to_string(path).map_err(|source| SkyboxError::ShaderSource {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a vertex/fragment pair and compile it on `backend`
pub fn load_program<B: GraphicsBackend>(
    backend: &mut B,
    label: &str,
    vertex_template: &str,
    fragment_template: &str,
) -> SkyboxResult<ShaderHandle> {
    let dialect = backend.shader_dialect();
    let vertex_path = resolve_path(vertex_template, dialect);
    let fragment_path = resolve_path(fragment_template, dialect);

    let desc = ShaderDescriptor {
        label: Some(label.to_string()),
        vertex_source: read_source(&vertex_path)?,
        fragment_source: read_source(&fragment_path)?,
    };

    let handle = backend.load_shader(&desc)?;
    log::debug!(
        "Shader '{}' loaded from {} + {}",
        label,
        vertex_path.display(),
        fragment_path.display()
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            resolve_path("shaders/{dialect}/skybox.vs", ShaderDialect::Glsl330),
            PathBuf::from("shaders/glsl330/skybox.vs")
        );
        assert_eq!(
            resolve_path("fixed/path.fs", ShaderDialect::Wgsl),
            PathBuf::from("fixed/path.fs")
        );
    }

    #[test]
    fn test_missing_source_reports_resolved_path() {
        let mut backend = DummyBackend::new().with_dialect(ShaderDialect::Glsl100);
        let err = load_program(&mut backend, "sky", "nowhere/{dialect}/a.vs", "b.fs").unwrap_err();

        match err {
            SkyboxError::ShaderSource { path, .. } => {
                assert_eq!(path, PathBuf::from("nowhere/glsl100/a.vs"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.live_shaders(), 0);
    }
}

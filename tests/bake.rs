//! Cubemap baking on the dummy backend.

mod common;

use common::{backend, drawn_faces, Fixtures};
use glam::Mat4;
use rstest::rstest;
use skybox::backend::dummy::{DummyBackend, DummyCommand};
use skybox::backend::{
    Attachment, BackendError, ClipSpace, CubemapFace, FramebufferStatus, GraphicsBackend,
    ShaderDescriptor, ShaderHandle, TextureDescriptor, TextureFormat, TextureHandle, UniformValue,
};
use skybox::resources::{CubemapFaces, TextureData};
use skybox::skybox::{BakeSource, CUBEMAP_FACE_VIEWS};
use skybox::{CubemapBaker, SkyboxError};

const CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Conversion program and a 2:1 panorama texture
fn panorama_inputs(backend: &mut DummyBackend) -> (ShaderHandle, TextureHandle) {
    let shader = backend
        .load_shader(&ShaderDescriptor {
            label: Some("cubemap".into()),
            vertex_source: "uniform mat4 matProjection;\nuniform mat4 matView;\n".into(),
            fragment_source: "uniform sampler2D equirectangularMap;\n".into(),
        })
        .unwrap();
    let texture = backend
        .create_texture(
            &TextureDescriptor {
                label: Some("panorama".into()),
                width: 8,
                height: 4,
                mip_levels: 1,
                format: TextureFormat::Rgba8Unorm,
            },
            &[0; 8 * 4 * 4],
        )
        .unwrap();
    (shader, texture)
}

fn bake_panorama(backend: &mut DummyBackend, size: u32) -> skybox::SkyboxResult<skybox::Cubemap> {
    let (shader, texture) = panorama_inputs(backend);
    CubemapBaker::bake(
        backend,
        BakeSource::Panorama { shader, texture },
        size,
        TextureFormat::Rgba8Unorm,
        CLEAR,
    )
}

// ============================================================================
// Panorama Path
// ============================================================================

/// Six faces are drawn, each once, in +X, -X, +Y, -Y, +Z, -Z order.
#[test]
fn test_panorama_draws_each_face_once_in_order() {
    let mut backend = backend();
    let cubemap = bake_panorama(&mut backend, 32).unwrap();

    let faces = drawn_faces(backend.commands());
    let expected: Vec<_> = CubemapFace::ALL
        .iter()
        .map(|face| (cubemap.handle, *face))
        .collect();
    assert_eq!(faces, expected);
}

/// Each face draw sees its own view matrix and the shared 90 degree projection.
#[test]
fn test_panorama_uploads_face_views() {
    let mut backend = backend();
    let cubemap = bake_panorama(&mut backend, 32).unwrap();

    let views: Vec<Mat4> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            DummyCommand::SetUniform {
                name,
                value: UniformValue::Mat4(m),
                ..
            } if name == "matView" => Some(*m),
            _ => None,
        })
        .collect();
    let expected: Vec<Mat4> = CUBEMAP_FACE_VIEWS.iter().map(|v| v.view_matrix()).collect();
    assert_eq!(views, expected);
    assert_eq!(cubemap.size, 32);
}

/// Attaching a face unbinds the framebuffer, so every face is attached, bound, cleared, drawn.
#[test]
fn test_panorama_attach_then_bind_per_face() {
    let mut backend = backend();
    bake_panorama(&mut backend, 16).unwrap();

    let sequence: Vec<&str> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            DummyCommand::Attach {
                attachment: Attachment::CubemapFace { .. },
                ..
            } => Some("attach"),
            DummyCommand::BindFramebuffer(Some(_)) => Some("bind"),
            DummyCommand::Clear { framebuffer: Some(_) } => Some("clear"),
            DummyCommand::Draw { .. } => Some("draw"),
            _ => None,
        })
        .collect();

    // The completeness probe attaches +X once before the loop
    let mut expected = vec!["attach"];
    for _ in 0..6 {
        expected.extend(["attach", "bind", "clear", "draw"]);
    }
    assert_eq!(sequence, expected);
}

/// Faces are drawn from inside the cube with culling off; state is restored afterwards.
#[test]
fn test_panorama_restores_render_state() {
    let mut backend = DummyBackend::with_size(640, 360);
    bake_panorama(&mut backend, 16).unwrap();

    for command in backend.commands() {
        if let DummyCommand::Draw {
            backface_culling, ..
        } = command
        {
            assert!(!backface_culling);
        }
    }
    assert!(backend.commands().contains(&DummyCommand::SetViewport {
        x: 0,
        y: 0,
        width: 16,
        height: 16
    }));

    assert_eq!(backend.viewport(), (0, 0, 640, 360));
    assert!(backend.backface_culling());
    assert_eq!(backend.bound_shader(), None);
    assert_eq!(backend.bound_texture(0), None);
    assert_eq!(backend.bound_framebuffer(), None);
}

/// The framebuffer and its depth renderbuffer do not outlive the bake.
#[test]
fn test_panorama_releases_bake_targets() {
    let mut backend = backend();
    let cubemap = bake_panorama(&mut backend, 16).unwrap();

    assert_eq!(backend.live_framebuffers(), 0);
    assert_eq!(backend.live_renderbuffers(), 0);
    assert_eq!(backend.live_meshes(), 0);
    assert!(backend.texture(cubemap.handle).is_some());
}

/// Baking the same source twice gives cubemaps with identical shape.
#[rstest]
#[case::rgba8(TextureFormat::Rgba8Unorm)]
#[case::rgba16f(TextureFormat::Rgba16Float)]
fn test_rebake_is_idempotent(#[case] format: TextureFormat) {
    let mut backend = backend();
    let (shader, texture) = panorama_inputs(&mut backend);
    let source = BakeSource::Panorama { shader, texture };

    let first = CubemapBaker::bake(&mut backend, source, 64, format, CLEAR).unwrap();
    let second = CubemapBaker::bake(&mut backend, source, 64, format, CLEAR).unwrap();

    assert_ne!(first.handle, second.handle);
    assert_eq!(
        (first.size, first.mip_levels, first.format),
        (second.size, second.mip_levels, second.format)
    );
    assert_eq!((second.size, second.mip_levels, second.format), (64, 1, format));
}

/// An incomplete framebuffer aborts the bake without drawing and without leaking.
#[test]
fn test_incomplete_framebuffer_is_fatal() {
    let mut backend = backend();
    backend.set_force_incomplete(true);

    let err = bake_panorama(&mut backend, 16).unwrap_err();

    assert!(matches!(
        err,
        SkyboxError::FramebufferIncomplete(FramebufferStatus::MissingColorAttachment)
    ));
    assert!(drawn_faces(backend.commands()).is_empty());
    assert_eq!(backend.live_cubemaps(), 0);
    assert_eq!(backend.live_framebuffers(), 0);
    assert_eq!(backend.live_renderbuffers(), 0);
    assert!(backend.backface_culling());
}

/// Running out of memory for the cubemap frees the renderbuffer created before it.
#[test]
fn test_cubemap_allocation_failure_cleans_up() {
    let mut backend = backend();
    backend.set_fail_cubemaps(true);

    let err = bake_panorama(&mut backend, 16).unwrap_err();

    assert!(matches!(err, SkyboxError::Backend(BackendError::OutOfMemory)));
    assert_eq!(backend.live_renderbuffers(), 0);
    assert_eq!(backend.live_framebuffers(), 0);
}

/// Top-down backends get a Y flip on the bake projection only.
#[rstest]
#[case::opengl(ClipSpace::OpenGl)]
#[case::wgpu(ClipSpace::ZeroToOneTopDown)]
fn test_projection_follows_clip_space(#[case] clip: ClipSpace) {
    let mut backend = backend().with_clip_space(clip);
    bake_panorama(&mut backend, 16).unwrap();

    let (near, far) = backend.cull_distances();
    let expected = clip.offscreen_correction()
        * clip.perspective(90f32.to_radians(), 1.0, near, far);
    let projections: Vec<Mat4> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            DummyCommand::SetUniform {
                name,
                value: UniformValue::Mat4(m),
                ..
            } if name == "matProjection" => Some(*m),
            _ => None,
        })
        .collect();
    assert_eq!(projections, vec![expected]);
}

// ============================================================================
// Cross Path
// ============================================================================

/// Cross layouts upload six faces at the source face size, without any render pass.
#[rstest]
#[case::cross(false)]
#[case::line(true)]
fn test_cross_upload(#[case] line: bool) {
    let fixtures = Fixtures::new("cross-upload");
    let path = if line {
        fixtures.line_png("line.png", 8)
    } else {
        fixtures.cross_png("cross.png", 8)
    };
    let faces = CubemapFaces::extract(&TextureData::from_file(&path).unwrap()).unwrap();
    let mut backend = backend();

    let cubemap = CubemapBaker::bake(
        &mut backend,
        BakeSource::Cross(&faces),
        1024,
        TextureFormat::Rgba16Float,
        CLEAR,
    )
    .unwrap();

    assert_eq!(cubemap.size, 8);
    assert_eq!(cubemap.format, TextureFormat::Rgba8Unorm);
    let written: Vec<CubemapFace> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            DummyCommand::WriteCubemapFace { face, .. } => Some(*face),
            _ => None,
        })
        .collect();
    assert_eq!(written, CubemapFace::ALL.to_vec());
    assert_eq!(backend.live_framebuffers(), 0);
    assert!(drawn_faces(backend.commands()).is_empty());
}

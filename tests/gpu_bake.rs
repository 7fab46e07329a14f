//! Real GPU bakes through the headless wgpu backend.
//!
//! Tests skip when no adapter is available, or when the adapter runs on GL and
//! cannot read cubemap layers back.
//!
//! ```bash
//! cargo test --test gpu_bake
//! ```

mod common;

use common::{shader_root, Fixtures};
use glam::{Mat4, Vec3};
use skybox::backend::{CubemapFace, GraphicsBackend, TextureFormat};
use skybox::{Skybox, SkyboxConfig, SkyboxShaderPaths, SwapOutcome, WgpuBackend};

const BAKE_SIZE: u32 = 32;

fn headless() -> Option<WgpuBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    match WgpuBackend::new_headless(64, 64) {
        Ok(backend) if backend.supports_cubemap_readback() => Some(backend),
        Ok(backend) => {
            let info = backend.adapter_info();
            eprintln!(
                "{} ({:?}) cannot read back cubemap faces, skipping",
                info.name, info.backend
            );
            None
        }
        Err(e) => {
            eprintln!("wgpu adapter not available, skipping: {}", e);
            None
        }
    }
}

fn gpu_config() -> SkyboxConfig {
    SkyboxConfig::default()
        .with_shaders(SkyboxShaderPaths::in_dir(shader_root()))
        .with_bake_size(BAKE_SIZE)
}

fn mean_red(pixels: &[u8]) -> f32 {
    let reds: Vec<f32> = pixels.chunks(4).map(|p| p[0] as f32).collect();
    reds.iter().sum::<f32>() / reds.len() as f32
}

/// The six-pass bake fills every face of a cubemap with the panorama's content.
#[test]
fn test_panorama_bake_on_gpu() {
    let Some(mut backend) = headless() else {
        return;
    };
    let fixtures = Fixtures::new("gpu-bake");
    let hdr = fixtures.panorama_hdr("panorama.hdr", 64);

    let skybox = Skybox::load(&mut backend, &gpu_config(), "", Some(hdr.as_path())).unwrap();
    let cubemap = *skybox.cubemap().unwrap();

    assert_eq!(
        backend.texture_info(cubemap.handle),
        Some((BAKE_SIZE, BAKE_SIZE, TextureFormat::Rgba8Unorm, true))
    );

    let faces: Vec<Vec<u8>> = CubemapFace::ALL
        .iter()
        .map(|face| backend.read_cubemap_face(cubemap.handle, *face).unwrap())
        .collect();
    for face in &faces {
        assert_eq!(face.len(), (BAKE_SIZE * BAKE_SIZE * 4) as usize);
        // Alpha is written as opaque everywhere
        assert!(face.chunks(4).all(|p| p[3] == 255));
    }

    // The panorama brightens from top to bottom, so the two poles differ
    let up = mean_red(&faces[CubemapFace::PositiveY.index() as usize]);
    let down = mean_red(&faces[CubemapFace::NegativeY.index() as usize]);
    assert!((up - down).abs() > 32.0, "poles too similar: {up} vs {down}");

    skybox.unload(&mut backend);
}

/// Cross layouts upload through the GPU path and draw into the headless target.
#[test]
fn test_cross_load_swap_and_draw_on_gpu() {
    let Some(mut backend) = headless() else {
        return;
    };
    let fixtures = Fixtures::new("gpu-cross");
    let cross = fixtures.cross_png("cross.png", 16);
    let next = fixtures.line_png("next.png", 8);

    let mut skybox = Skybox::load(&mut backend, &gpu_config(), &cross, None).unwrap();
    let cubemap = *skybox.cubemap().unwrap();
    assert_eq!(
        backend.texture_info(cubemap.handle),
        Some((16, 16, TextureFormat::Rgba8Unorm, true))
    );

    // +X of the fixture cross is pure red
    let pos_x = backend
        .read_cubemap_face(cubemap.handle, CubemapFace::PositiveX)
        .unwrap();
    assert!(pos_x.chunks(4).all(|p| p == [255, 0, 0, 255]));

    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::X, Vec3::Y);
    let projection = backend
        .clip_space()
        .perspective(90f32.to_radians(), 1.0, 0.01, 1000.0);
    backend.begin_frame().unwrap();
    skybox.draw(&mut backend, view, projection).unwrap();
    backend.end_frame().unwrap();

    let outcome = skybox.update(&mut backend, &[next.clone()]).unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped { path: next });
    assert!(backend.texture_info(cubemap.handle).is_none());
    assert_eq!(skybox.cubemap().unwrap().size, 8);

    skybox.unload(&mut backend);
}

//! Common utilities for skybox integration tests.
//!
//! Fixture images are written into a fresh directory per test with the `image`
//! crate. Shaders come from the crate's own `shaders/` tree, so the dummy backend
//! sees the same uniform declarations a GL backend would.

#![allow(dead_code)]

use image::{codecs::hdr::HdrEncoder, Rgb, Rgba, RgbaImage};
use skybox::backend::dummy::{DummyBackend, DummyCommand};
use skybox::backend::{CubemapFace, ShaderDialect, TextureHandle};
use skybox::{SkyboxConfig, SkyboxShaderPaths};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Fixture Directory
// ============================================================================

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Scratch directory removed on drop
pub struct Fixtures {
    root: PathBuf,
}

impl Fixtures {
    pub fn new(test: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "skybox-{}-{}-{}",
            test,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&root).expect("create fixture dir");
        Self { root }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// 4x3 cross whose faces are filled with distinct colors
    pub fn cross_png(&self, name: &str, face_size: u32) -> PathBuf {
        let path = self.path(name);
        cross_image(face_size).save(&path).expect("write cross png");
        path
    }

    /// Six faces side by side
    pub fn line_png(&self, name: &str, face_size: u32) -> PathBuf {
        let path = self.path(name);
        let image = RgbaImage::from_fn(face_size * 6, face_size, |x, _| {
            face_color((x / face_size) as usize)
        });
        image.save(&path).expect("write line png");
        path
    }

    /// Square image; no cubemap layout can be detected in it
    pub fn square_png(&self, name: &str, size: u32) -> PathBuf {
        let path = self.path(name);
        RgbaImage::from_pixel(size, size, Rgba([10, 20, 30, 255]))
            .save(&path)
            .expect("write square png");
        path
    }

    /// 2:1 Radiance HDR panorama with a vertical brightness gradient
    pub fn panorama_hdr(&self, name: &str, width: u32) -> PathBuf {
        let path = self.path(name);
        let height = width / 2;
        let pixels: Vec<Rgb<f32>> = (0..height)
            .flat_map(|y| {
                let v = 4.0 * y as f32 / height as f32;
                (0..width).map(move |_| Rgb([v, v * 0.5, 0.25]))
            })
            .collect();

        let file = File::create(&path).expect("create hdr");
        HdrEncoder::new(BufWriter::new(file))
            .encode(&pixels, width as usize, height as usize)
            .expect("encode hdr");
        path
    }

    pub fn text_file(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, "not an image").expect("write text file");
        path
    }

    /// Copy of the shipped shaders with `#error` injected into one file
    pub fn broken_shaders(&self, broken_file: &str) -> SkyboxShaderPaths {
        let dialect_dir = self.root.join("shaders").join("glsl330");
        std::fs::create_dir_all(&dialect_dir).expect("create shader dir");
        for file in ["skybox.vs", "skybox.fs", "cubemap.vs", "cubemap.fs"] {
            let original = shader_root().join("glsl330").join(file);
            let mut source = std::fs::read_to_string(original).expect("read shader");
            if file == broken_file {
                source.push_str("\n#error broken on purpose\n");
            }
            std::fs::write(dialect_dir.join(file), source).expect("write shader");
        }
        SkyboxShaderPaths::in_dir(self.root.join("shaders"))
    }
}

impl Drop for Fixtures {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

// ============================================================================
// Images
// ============================================================================

/// Distinct opaque color per face index
pub fn face_color(face: usize) -> Rgba<u8> {
    const COLORS: [[u8; 4]; 6] = [
        [255, 0, 0, 255],
        [0, 255, 255, 255],
        [0, 255, 0, 255],
        [255, 0, 255, 255],
        [0, 0, 255, 255],
        [255, 255, 0, 255],
    ];
    Rgba(COLORS[face % 6])
}

/// Cell (column, row) of each face in a 4x3 cross, in +X, -X, +Y, -Y, +Z, -Z order
const CROSS_CELLS: [(u32, u32); 6] = [(2, 1), (0, 1), (1, 0), (1, 2), (1, 1), (3, 1)];

pub fn cross_image(face_size: u32) -> RgbaImage {
    RgbaImage::from_fn(face_size * 4, face_size * 3, |x, y| {
        let cell = (x / face_size, y / face_size);
        CROSS_CELLS
            .iter()
            .position(|c| *c == cell)
            .map(face_color)
            .unwrap_or(Rgba([0, 0, 0, 0]))
    })
}

// ============================================================================
// Backend & Config
// ============================================================================

pub fn shader_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

/// Dummy backend reading the GLSL 330 shaders
pub fn backend() -> DummyBackend {
    let _ = env_logger::builder().is_test(true).try_init();
    DummyBackend::new().with_dialect(ShaderDialect::Glsl330)
}

/// Default config with the shipped shaders and a small bake size
pub fn config() -> SkyboxConfig {
    SkyboxConfig::default()
        .with_shaders(SkyboxShaderPaths::in_dir(shader_root()))
        .with_bake_size(64)
}

// ============================================================================
// Command Inspection
// ============================================================================

/// Cubemap faces drawn into, in draw order
pub fn drawn_faces(commands: &[DummyCommand]) -> Vec<(TextureHandle, CubemapFace)> {
    commands
        .iter()
        .filter_map(|c| match c {
            DummyCommand::Draw {
                target: Some(target),
                ..
            } => Some(*target),
            _ => None,
        })
        .collect()
}

/// Textures destroyed, in order
pub fn destroyed_textures(commands: &[DummyCommand]) -> Vec<TextureHandle> {
    commands
        .iter()
        .filter_map(|c| match c {
            DummyCommand::DestroyTexture(t) => Some(*t),
            _ => None,
        })
        .collect()
}

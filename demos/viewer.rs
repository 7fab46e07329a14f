//! Skybox viewer
//!
//! Run with:
//!   cargo run --example viewer -- --image skybox.png
//!   cargo run --example viewer -- --hdr dresden_square_2k.hdr --size 512
//!
//! Drop a single .png/.jpg/.hdr/.bmp/.tga file onto the window to swap the skybox.
//! The camera slowly turns around its position.

use clap::Parser;
use glam::Vec3;
use skybox::{
    backend::GraphicsBackend,
    overlay::{Color, TextOverlay},
    scene::{Camera, Projection},
    window::{self, LoopPhase},
    Skybox, SkyboxConfig, SkyboxShaderPaths, SwapOutcome, WgpuBackend, Window,
};
use std::path::PathBuf;
use std::time::Instant;
use winit::event_loop::EventLoop;

/// Degrees per second the camera turns
const ORBIT_SPEED: f32 = 10.0;

const RAYWHITE: [f32; 4] = [245.0 / 255.0, 245.0 / 255.0, 245.0 / 255.0, 1.0];

#[derive(Parser, Debug)]
#[command(about = "View a cubemap skybox; drop an image onto the window to replace it")]
struct Args {
    /// Cross or line layout image
    #[arg(long)]
    image: Option<PathBuf>,

    /// Equirectangular panorama; takes precedence over --image
    #[arg(long)]
    hdr: Option<PathBuf>,

    /// Edge length of the cubemap baked from a panorama
    #[arg(long, default_value_t = 1024)]
    size: u32,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 450)]
    height: u32,

    /// Present without waiting for vertical sync
    #[arg(long)]
    no_vsync: bool,
}

/// Shows the info line in the window title, the viewer has no text renderer
struct TitleOverlay<'a> {
    window: &'a Window,
}

impl TextOverlay for TitleOverlay<'_> {
    fn screen_height(&self) -> u32 {
        self.window.dimensions().1
    }

    fn draw_text(&mut self, text: &str, _x: i32, _y: i32, _font_size: u32, _color: Color) {
        self.window.set_title(&format!("Skybox viewer {}", text));
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.image.is_none() && args.hdr.is_none() {
        eprintln!("Pass --image <cross layout> or --hdr <panorama>");
        std::process::exit(2);
    }

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    let window = Window::new(&event_loop, "Skybox viewer", args.width, args.height)
        .expect("Failed to create window");

    let mut backend = match WgpuBackend::new(window.window_arc(), !args.no_vsync) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Failed to create wgpu backend: {}", e);
            return;
        }
    };

    let config = SkyboxConfig::default()
        .with_bake_size(args.size)
        .with_shaders(SkyboxShaderPaths::in_dir(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders"),
        ));

    let image = args.image.clone().unwrap_or_default();
    let skybox = match Skybox::load(&mut backend, &config, &image, args.hdr.as_deref()) {
        Ok(skybox) => skybox,
        Err(e) => {
            eprintln!("Failed to load skybox: {}", e);
            return;
        }
    };

    let (width, height) = window.dimensions();
    let mut camera = Camera::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(4.0, 1.0, 4.0))
        .with_projection(Projection::perspective(
            45.0,
            width as f32 / height.max(1) as f32,
            0.01,
            1000.0,
        ));

    let mut skybox = Some(skybox);
    let mut last_frame = Instant::now();
    let mut title_dirty = true;

    let result = window::run(event_loop, window, move |window, phase| {
        if phase == LoopPhase::Exiting {
            if let Some(skybox) = skybox.take() {
                skybox.unload(&mut backend);
            }
            return;
        }
        let Some(sky) = skybox.as_mut() else {
            return;
        };

        if window.was_resized() {
            let (width, height) = window.dimensions();
            backend.resize(width, height);
            camera.projection.set_aspect(width as f32 / height.max(1) as f32);
            window.clear_resize_flag();
        }

        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        camera.orbit((ORBIT_SPEED * dt).to_radians());

        match sky.update(&mut backend, &window.take_dropped_files()) {
            Ok(SwapOutcome::Swapped { .. }) => title_dirty = true,
            Ok(_) => {}
            Err(e) => log::error!("Skybox swap failed: {}", e),
        }

        if title_dirty {
            sky.draw_info_overlay(&mut TitleOverlay { window });
            title_dirty = false;
        }

        if let Err(e) = backend.begin_frame() {
            log::warn!("Skipping frame: {}", e);
            return;
        }
        backend.clear(RAYWHITE);
        if let Err(e) = sky.draw_with_camera(&mut backend, &camera) {
            log::error!("Skybox draw failed: {}", e);
        }
        if let Err(e) = backend.end_frame() {
            log::error!("Failed to present frame: {}", e);
        }
    });

    if let Err(e) = result {
        eprintln!("Event loop failed: {}", e);
    }
}

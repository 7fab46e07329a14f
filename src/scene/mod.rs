//! Scene management

mod camera;

pub use camera::*;

//! Resource management
//!
//! CPU-side meshes, decoded images, cubemap layouts and shader sources.

mod cubemap_layout;
mod mesh;
pub mod shader;
mod texture;

pub use cubemap_layout::*;
pub use mesh::*;
pub use texture::*;

//! Backend abstraction layer
//!
//! Provides the immediate-mode traits and types the skybox code drives, a wgpu
//! implementation and a recording dummy used by tests and headless tooling.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;

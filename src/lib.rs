//! sgl-scene
//!
//! A thin frame driver on top of wgpu. Scenes come from `.obj`-style model
//! files with `.mtl`-style material libraries; meshes are organized in a scene
//! graph and drawn immediately, one draw per mesh, into up to four off-screen
//! targets which can then be shown on a full-screen quad.
//!
//! High-level modules
//! - `camera`: look-at camera and perspective projection
//! - `config`: runtime configuration read from TOML
//! - `context`: the wgpu backend owning surface, device, queue and pipelines
//! - `data_structures`: meshes, materials, textures, the texture registry and the scene graph
//! - `device`: the frame driver
//! - `error`: error type shared by every fallible operation
//! - `flow`: the winit event loop driving a device
//! - `pipelines`: mesh and display render pipelines
//! - `render`: the backend trait and a headless recording backend
//! - `resources`: model, material library and image loaders
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod device;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::Config;
pub use device::{Device, FrameState};
pub use error::{Error, Result};
pub use render::{Headless, RenderBackend};

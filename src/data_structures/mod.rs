//! Engine data structures: meshes, materials, textures and scene graphs.
//!
//! - `mesh` holds object segments, the geometry builder and GPU mesh buffers
//! - `material` holds materials and their texture slots
//! - `registry` maps texture names to shared texture handles
//! - `texture` contains CPU texel buffers and the GPU texture wrapper
//! - `scene_graph` enables hierarchical scene organization

pub mod material;
pub mod mesh;
pub mod registry;
pub mod scene_graph;
pub mod texture;

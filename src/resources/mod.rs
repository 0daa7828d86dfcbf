/**
 * This module contains all logic for loading meshes, materials and textures from external files.
 */
pub mod material;
pub mod model;
pub mod texture;

pub use material::load_materials;
pub use model::load_scene;
pub use texture::load_image;

//! Materials: named bundles of texture slots and shading scalars.

use std::{collections::BTreeMap, rc::Rc};

use crate::{
    data_structures::{registry::TextureRegistry, texture::TexelBuffer},
    error::Result,
    render::RenderBackend,
};

/// Material name to material, as read from one material library.
pub type MaterialTable = BTreeMap<String, Material>;

/// The five texture slots a material can fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureSlot {
    Ambient,
    Diffuse,
    Normal,
    Metallic,
    Roughness,
}

impl TextureSlot {
    pub const COUNT: usize = 5;
    pub const ALL: [TextureSlot; Self::COUNT] = [
        TextureSlot::Ambient,
        TextureSlot::Diffuse,
        TextureSlot::Normal,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
    ];

    /// Suffix appended to the material name to form the registry name.
    pub fn suffix(self) -> &'static str {
        match self {
            TextureSlot::Ambient => "Ambient",
            TextureSlot::Diffuse => "Diffuse",
            TextureSlot::Normal => "Normal",
            TextureSlot::Metallic => "Metallic",
            TextureSlot::Roughness => "Roughness",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn texture_name(self, material: &str) -> String {
        format!("{}{}", material, self.suffix())
    }
}

/// A registry texture name together with the slot it binds to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    pub slot: TextureSlot,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    textures: [Option<Rc<TexelBuffer>>; TextureSlot::COUNT],
    alpha: f32,
    illum: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            textures: Default::default(),
            alpha: 1.0,
            illum: 0.0,
        }
    }
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Rc<TexelBuffer>> {
        self.textures[slot.index()].as_ref()
    }

    /// Replaces whatever the slot held before.
    pub fn set_texture(&mut self, slot: TextureSlot, texture: TexelBuffer) {
        self.textures[slot.index()] = Some(Rc::new(texture));
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    pub fn illum(&self) -> f32 {
        self.illum
    }

    pub fn set_illum(&mut self, illum: f32) {
        self.illum = illum;
    }

    /// Filled slots in slot order.
    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, &Rc<TexelBuffer>)> {
        TextureSlot::ALL
            .into_iter()
            .filter_map(|slot| self.texture(slot).map(|texture| (slot, texture)))
    }

    /// Registry names of the filled slots for a material called `name`.
    pub fn texture_bindings(&self, name: &str) -> Vec<TextureBinding> {
        self.textures()
            .map(|(slot, _)| TextureBinding {
                slot,
                name: slot.texture_name(name),
            })
            .collect()
    }

    /// Uploads every filled slot and inserts it into `registry`.
    ///
    /// Returns the number of textures registered.
    pub fn register_textures<B: RenderBackend>(
        &self,
        name: &str,
        registry: &mut TextureRegistry<B::Texture>,
        backend: &mut B,
    ) -> Result<usize> {
        let mut registered = 0;
        for (slot, texels) in self.textures() {
            let texture_name = slot.texture_name(name);
            let texture = backend.create_texture(&texture_name, texels)?;
            if registry.insert(texture_name.clone(), Rc::new(texture)).is_some() {
                log::debug!("texture {} replaced an earlier registration", texture_name);
            }
            registered += 1;
        }
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Headless;

    #[test]
    fn defaults_are_opaque_with_no_textures() {
        let material = Material::new();
        assert_eq!(material.alpha(), 1.0);
        assert_eq!(material.illum(), 0.0);
        assert_eq!(material.textures().count(), 0);
        assert!(material.texture_bindings("stone").is_empty());
    }

    #[test]
    fn bindings_follow_slot_order_and_suffixes() {
        let mut material = Material::new();
        material.set_texture(TextureSlot::Roughness, TexelBuffer::scalar(0.5));
        material.set_texture(TextureSlot::Diffuse, TexelBuffer::rgb(1.0, 1.0, 1.0));
        let names: Vec<_> = material
            .texture_bindings("stone")
            .into_iter()
            .map(|binding| binding.name)
            .collect();
        assert_eq!(names, vec!["stoneDiffuse", "stoneRoughness"]);
    }

    #[test]
    fn registration_shares_textures_with_the_registry() {
        let mut material = Material::new();
        material.set_texture(TextureSlot::Normal, TexelBuffer::rgb(0.5, 0.5, 1.0));
        let mut backend = Headless::new(4, 4);
        let mut registry = TextureRegistry::new();
        let registered = material
            .register_textures("wall", &mut registry, &mut backend)
            .unwrap();
        assert_eq!(registered, 1);
        let texture = registry.get("wallNormal").unwrap();
        assert_eq!(texture.label, "wallNormal");
        assert_eq!(texture.texels.as_ref().unwrap().texels(), &[0.5, 0.5, 1.0]);
    }
}

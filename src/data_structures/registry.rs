//! Name-keyed store of shared texture handles.

use std::{collections::HashMap, rc::Rc};

/// Holds textures by name.
///
/// Handles are reference counted: a texture stays alive while the registry or
/// any in-flight draw still holds it.
#[derive(Debug)]
pub struct TextureRegistry<T> {
    textures: HashMap<String, Rc<T>>,
}

impl<T> Default for TextureRegistry<T> {
    fn default() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }
}

impl<T> TextureRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the texture previously stored under `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, texture: Rc<T>) -> Option<Rc<T>> {
        self.textures.insert(name.into(), texture)
    }

    pub fn get(&self, name: &str) -> Option<&Rc<T>> {
        self.textures.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Rc<T>> {
        self.textures.remove(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Moves every texture of `other` in, replacing same-named entries.
    pub fn merge(&mut self, other: TextureRegistry<T>) {
        for (name, texture) in other.textures {
            if self.textures.insert(name.clone(), texture).is_some() {
                log::debug!("texture {} replaced an earlier registration", name);
            }
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.textures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut registry = TextureRegistry::new();
        assert!(registry.insert("Display", Rc::new(1)).is_none());
        let previous = registry.insert("Display", Rc::new(2)).unwrap();
        assert_eq!(*previous, 1);
        assert_eq!(**registry.get("Display").unwrap(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn merge_overrides_same_names_and_keeps_the_rest() {
        let mut registry = TextureRegistry::new();
        registry.insert("stoneDiffuse", Rc::new(1));
        registry.insert("Display", Rc::new(9));
        let mut incoming = TextureRegistry::new();
        incoming.insert("stoneDiffuse", Rc::new(2));
        incoming.insert("brickDiffuse", Rc::new(3));

        registry.merge(incoming);

        assert_eq!(registry.names(), vec!["Display", "brickDiffuse", "stoneDiffuse"]);
        assert_eq!(**registry.get("stoneDiffuse").unwrap(), 2);
        assert_eq!(**registry.get("Display").unwrap(), 9);
    }

    #[test]
    fn handles_outlive_removal() {
        let mut registry = TextureRegistry::new();
        let texture = Rc::new("target");
        registry.insert("Display", texture.clone());
        assert_eq!(Rc::strong_count(&texture), 2);
        registry.remove("Display");
        assert_eq!(Rc::strong_count(&texture), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = TextureRegistry::new();
        registry.insert("redRoughness", Rc::new(()));
        registry.insert("redDiffuse", Rc::new(()));
        registry.insert("Display", Rc::new(()));
        assert_eq!(registry.names(), vec!["Display", "redDiffuse", "redRoughness"]);
        assert!(registry.contains("redDiffuse"));
        assert!(!registry.contains("blueDiffuse"));
    }
}

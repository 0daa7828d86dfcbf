use std::path::{Path, PathBuf};

use sgl_scene::Config;
use tempfile::TempDir;

/// A throwaway assets directory holding model, material and image files.
pub(crate) struct Assets {
    dir: TempDir,
}

impl Assets {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temporary assets dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write asset");
        path
    }

    /// Writes a single-coloured PNG.
    pub fn write_png(&self, name: &str, width: u32, height: u32, rgba: [u8; 4]) -> PathBuf {
        let path = self.dir.path().join(name);
        image::RgbaImage::from_pixel(width, height, image::Rgba(rgba))
            .save(&path)
            .expect("write png");
        path
    }

    /// A config whose startup scene is `scene` inside this directory.
    pub fn config(&self, scene: &str) -> Config {
        Config {
            assets_dir: self.path().to_path_buf(),
            scene: scene.to_string(),
            ..Config::default()
        }
    }
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) const CUBE_MTL: &str = "\
# two materials, one constant and one textured
newmtl stone
Ka 0.1 0.1 0.1
Kd 0.5 0.5 0.5
Pm 0.0
Pr 0.8
d 1.0
illum 2

newmtl brick
map_Kd brick.png
Pr 0.4
";

pub(crate) const TWO_QUADS_OBJ: &str = "\
mtllib cube.mtl
o floor
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
usemtl stone
f 1/1/1 2/2/1 3/3/1 4/4/1
o wall
v -1 0 -1
v 1 0 -1
v 1 2 -1
v -1 2 -1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl brick
f 5/5/2 6/6/2 7/7/2 8/8/2
";

/// Writes the two-quad scene with its material library and brick texture.
pub(crate) fn two_quad_assets() -> Assets {
    let assets = Assets::new();
    assets.write("cube.mtl", CUBE_MTL);
    assets.write_png("brick.png", 2, 2, [200, 80, 40, 255]);
    assets.write("scene.obj", TWO_QUADS_OBJ);
    assets
}

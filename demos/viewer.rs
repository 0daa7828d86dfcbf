//! Opens a window and shows `assets/models/scene.obj`.
//!
//! Pass a TOML config path as the first argument to override the defaults.

use sgl_scene::{Config, flow};

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    flow::run(config)
}

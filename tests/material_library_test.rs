use sgl_scene::{
    Error,
    data_structures::{material::TextureSlot, texture::Channels},
    resources::load_materials,
};

use crate::common::test_utils::{Assets, CUBE_MTL};

mod common;

#[test]
fn should_read_constants_and_images() {
    let assets = Assets::new();
    assets.write_png("brick.png", 3, 2, [255, 0, 0, 255]);
    let path = assets.write("cube.mtl", CUBE_MTL);

    let materials = load_materials(path).unwrap();

    assert_eq!(materials.len(), 2);
    let stone = &materials["stone"];
    assert_eq!(stone.illum(), 2.0);
    assert_eq!(stone.alpha(), 1.0);
    let roughness = stone.texture(TextureSlot::Roughness).unwrap();
    assert_eq!(roughness.channels(), Channels::R);
    assert_eq!(roughness.texels(), &[0.8]);
    assert!(stone.texture(TextureSlot::Normal).is_none());

    let brick = &materials["brick"].texture(TextureSlot::Diffuse).unwrap();
    assert_eq!(brick.dimensions(), (3, 2));
    assert_eq!(brick.to_rgba()[..4], [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn should_resolve_images_next_to_the_library() {
    let assets = Assets::new();
    std::fs::create_dir(assets.path().join("materials")).unwrap();
    assets.write_png("materials/grain.png", 1, 1, [0, 0, 255, 255]);
    let path = assets.write("materials/wood.mtl", "newmtl wood\nmap_Kd grain.png\n");

    let materials = load_materials(path).unwrap();

    assert!(materials["wood"].texture(TextureSlot::Diffuse).is_some());
}

#[test]
fn should_fail_on_an_unreadable_image() {
    let assets = Assets::new();
    assets.write("brick.png", "not a png");
    let path = assets.write("cube.mtl", "newmtl brick\nmap_Kd brick.png\n");

    let err = load_materials(path).unwrap_err();

    assert!(matches!(err, Error::Image { .. }), "unexpected error {err:?}");
}

#[test]
fn should_fail_on_a_missing_library() {
    let assets = Assets::new();

    let err = load_materials(assets.path().join("absent.mtl")).unwrap_err();

    assert!(matches!(err, Error::FileOpen { .. }));
}

use std::rc::Rc;

use cgmath::{Matrix4, SquareMatrix};
use sgl_scene::{
    Device, Error, FrameState, Headless, RenderBackend,
    data_structures::material::TextureSlot,
    device::DISPLAY_TEXTURE,
    render::{Command, Viewport},
};

use crate::common::test_utils::{Assets, two_quad_assets};

mod common;

fn started_device(assets: &Assets) -> Device<Headless> {
    let mut device = Device::new(Headless::new(64, 48), assets.config("scene.obj"));
    device.startup(65.0).unwrap();
    device
}

#[test]
fn should_upload_the_scene_on_startup() {
    let assets = two_quad_assets();
    let mut device = started_device(&assets);

    let commands = device.backend_mut().take_commands();
    let created: Vec<_> = commands
        .iter()
        .filter_map(|command| match command {
            Command::CreateMesh { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec!["floor", "wall"]);
    assert_eq!(
        commands.iter().filter(|command| matches!(command, Command::CreateTexture { .. })).count(),
        6
    );
    assert_eq!(device.scene().mesh_count(), 2);
    assert_eq!(device.state(), FrameState::Idle);
}

#[test]
fn should_draw_every_mesh_and_present() {
    let assets = two_quad_assets();
    let mut device = started_device(&assets);
    device.backend_mut().take_commands();

    device.draw(1.0 / 60.0).unwrap();

    let commands = device.backend_mut().take_commands();
    assert_eq!(commands.len(), 7);
    assert_eq!(
        commands[0],
        Command::CreateTarget {
            label: "frame".to_string(),
            size: (64, 48)
        }
    );
    assert_eq!(
        commands[1],
        Command::BindTargets {
            labels: vec!["frame".to_string()],
            viewport: Viewport::new(64, 48)
        }
    );
    assert_eq!(commands[2], Command::Clear(device.config().clear_colour()));
    match &commands[3] {
        Command::DrawMesh { mesh, uniforms, textures } => {
            assert_eq!(mesh, "floor");
            let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
            assert_eq!(uniforms.model, identity);
            assert_eq!(textures[1], (TextureSlot::Diffuse, "stoneDiffuse".to_string()));
        }
        other => panic!("expected the floor draw, got {other:?}"),
    }
    assert!(matches!(&commands[4], Command::DrawMesh { mesh, .. } if mesh == "wall"));
    assert_eq!(commands[5], Command::EndFrame);
    assert_eq!(
        commands[6],
        Command::Present {
            label: "frame".to_string()
        }
    );

    assert!(device.textures().contains(DISPLAY_TEXTURE));
    assert_eq!(device.state(), FrameState::Idle);
}

#[test]
fn should_bind_all_given_targets_in_order() {
    let assets = two_quad_assets();
    let mut device = started_device(&assets);
    let targets: Vec<_> = ["albedo", "normal", "depth"]
        .into_iter()
        .map(|label| Rc::new(device.backend_mut().create_target(label, (64, 48)).unwrap()))
        .collect();
    device.backend_mut().take_commands();

    device.draw_multi_textures(&targets, 0.5).unwrap();

    let commands = device.backend().commands();
    assert_eq!(
        commands[0],
        Command::BindTargets {
            labels: vec!["albedo".to_string(), "normal".to_string(), "depth".to_string()],
            viewport: Viewport::new(64, 48)
        }
    );
    assert_eq!(device.backend().draws().count(), 2);
    assert_eq!(device.elapsed(), 0.5);
}

#[test]
fn should_reject_empty_and_oversized_target_lists() {
    let assets = two_quad_assets();
    let mut device = started_device(&assets);
    device.backend_mut().take_commands();

    let err = device.draw_multi_textures(&[], 0.1).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));

    let target = Rc::new(device.backend_mut().create_target("t", (1, 1)).unwrap());
    device.backend_mut().take_commands();
    let targets = vec![target; 5];
    let err = device.draw_multi_textures(&targets, 0.1).unwrap_err();
    assert!(matches!(err, Error::TooManyTargets { requested: 5, max: 4 }));

    assert!(device.backend().commands().is_empty());
    assert_eq!(device.elapsed(), 0.0);
    assert_eq!(device.state(), FrameState::Idle);
}

#[test]
fn should_keep_the_active_scene_when_a_reload_fails() {
    let assets = two_quad_assets();
    let mut device = started_device(&assets);
    assets.write("broken.obj", "o bad\nv 0 0 0\nf 1 2\n");

    let err = device.load_from_file(assets.path().join("broken.obj")).unwrap_err();

    assert!(matches!(err, Error::Parse { line: 3, .. }), "unexpected error {err:?}");
    assert_eq!(device.scene().mesh_count(), 2);
}

#[test]
fn should_keep_registered_textures_when_a_reload_fails() {
    let assets = Assets::new();
    assets.write("good.mtl", "newmtl stone\nKd 1 0 0\n");
    assets.write("good.obj", "mtllib good.mtl\nusemtl stone\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    assets.write("bad.mtl", "newmtl stone\nKd 0 0 1\n");
    assets.write("bad.obj", "mtllib bad.mtl\nusemtl stone\nv 0 0 0\nv 1 0 0\nf 1 2\n");
    let mut device = Device::new(Headless::new(8, 8), assets.config("good.obj"));
    device.startup(65.0).unwrap();

    let diffuse = |device: &Device<Headless>| {
        let texture = device.textures().get("stoneDiffuse").unwrap();
        texture.texels.as_ref().unwrap().texels().to_vec()
    };
    assert_eq!(diffuse(&device), vec![1.0, 0.0, 0.0]);

    let err = device.load_from_file(assets.path().join("bad.obj")).unwrap_err();

    assert!(matches!(err, Error::Parse { line: 5, .. }), "unexpected error {err:?}");
    assert_eq!(device.scene().mesh_count(), 1);
    assert_eq!(diffuse(&device), vec![1.0, 0.0, 0.0]);
}

#[test]
fn should_fail_startup_without_a_scene_file() {
    let assets = Assets::new();
    let mut device = Device::new(Headless::new(8, 8), assets.config("missing.obj"));

    let err = device.startup(45.0).unwrap_err();

    assert!(matches!(err, Error::FileOpen { .. }));
    assert_eq!(device.config().fov, 45.0);
    assert!(device.scene().is_empty());
}

#[test]
fn should_follow_resizes() {
    let assets = two_quad_assets();
    let mut device = started_device(&assets);

    device.resize(320, 200);
    device.backend_mut().take_commands();
    device.draw(0.0).unwrap();

    assert_eq!(
        device.backend().commands()[0],
        Command::CreateTarget {
            label: "frame".to_string(),
            size: (320, 200)
        }
    );
    assert_eq!(device.projection().aspect(), 320.0 / 200.0);
}

//! The frame driver.
//!
//! A [`Device`] ties the loaders, the scene graph and a [`RenderBackend`]
//! together. Each frame walks through a fixed sequence of states:
//!
//! ```text
//! Idle -> CameraSetup -> TargetBind -> Clear -> Draw -> Idle
//! Idle -> Composite -> Idle
//! ```
//!
//! The first sequence renders every mesh of the active scene into up to
//! [`MAX_COLOR_TARGETS`] off-screen targets, the second shows one of them on
//! screen. A failure anywhere returns the device to `Idle` before the error is
//! handed back.

use std::{path::Path, rc::Rc};

use cgmath::{Deg, Matrix4};

use crate::{
    camera::{Camera, Projection},
    config::Config,
    data_structures::{
        material::TextureBinding,
        registry::TextureRegistry,
        scene_graph::SceneGraph,
    },
    error::{Error, Result},
    render::{MAX_COLOR_TARGETS, MeshUniforms, RenderBackend, SlotTexture, Viewport},
    resources::model::load_scene,
};

/// Registry name of the texture last handed to [`Device::display`].
pub const DISPLAY_TEXTURE: &str = "Display";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    CameraSetup,
    TargetBind,
    Clear,
    Draw,
    Composite,
}

/// A mesh ready to draw: backend buffers plus the textures to bind.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawMesh<H> {
    pub name: String,
    pub textures: Vec<TextureBinding>,
    pub buffers: H,
}

pub struct Device<B: RenderBackend> {
    backend: B,
    config: Config,
    camera: Camera,
    projection: Projection,
    perspective: Matrix4<f32>,
    view: Matrix4<f32>,
    scene: SceneGraph<DrawMesh<B::Mesh>>,
    textures: TextureRegistry<B::Texture>,
    elapsed: f64,
    state: FrameState,
}

impl<B: RenderBackend> Device<B> {
    pub fn new(backend: B, config: Config) -> Self {
        let (width, height) = backend.output_size();
        let camera = Camera::from(&config.camera);
        let projection = Projection::new(width, height, Deg(config.fov), config.znear, config.zfar);
        Self {
            perspective: projection.calc_matrix(),
            view: camera.look_at(),
            backend,
            config,
            camera,
            projection,
            scene: SceneGraph::new(),
            textures: TextureRegistry::new(),
            elapsed: 0.0,
            state: FrameState::Idle,
        }
    }

    /// Sets the field of view, sets up the camera and loads the configured scene.
    pub fn startup(&mut self, fov: f32) -> Result<()> {
        self.config.fov = fov;
        self.projection.set_fovy(Deg(fov));
        self.setup_camera();
        let path = self.config.scene_path();
        self.load_from_file(path)
    }

    /// Renders the scene into a fresh target and shows it.
    pub fn draw(&mut self, dt: f64) -> Result<()> {
        let texture = self.draw_texture(dt)?;
        self.display(texture)
    }

    /// Renders the scene into a fresh target of the output size.
    pub fn draw_texture(&mut self, dt: f64) -> Result<Rc<B::Texture>> {
        let size = self.backend.output_size();
        let texture = Rc::new(self.backend.create_target("frame", size)?);
        self.draw_multi_textures(&[texture.clone()], dt)?;
        Ok(texture)
    }

    /// Renders the scene into `targets`, target `i` receiving output `i` of
    /// the mesh shader.
    pub fn draw_multi_textures(&mut self, targets: &[Rc<B::Texture>], dt: f64) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::EmptyInput);
        }
        if targets.len() > MAX_COLOR_TARGETS {
            return Err(Error::TooManyTargets {
                requested: targets.len(),
                max: MAX_COLOR_TARGETS,
            });
        }
        let result = self.render_frame(targets, dt);
        self.transition(FrameState::Idle);
        result
    }

    fn render_frame(&mut self, targets: &[Rc<B::Texture>], dt: f64) -> Result<()> {
        self.elapsed += dt;

        self.transition(FrameState::CameraSetup);
        self.setup_camera();

        self.transition(FrameState::TargetBind);
        let (width, height) = self.backend.output_size();
        self.backend
            .bind_targets(targets, Viewport::new(width, height))?;

        self.transition(FrameState::Clear);
        self.backend.clear(self.config.clear_colour())?;

        self.transition(FrameState::Draw);
        let mut result = Ok(());
        let (backend, textures) = (&mut self.backend, &self.textures);
        let (perspective, view) = (self.perspective, self.view);
        self.scene.traverse(self.elapsed as f32, |_, mesh, world| {
            if result.is_err() {
                return;
            }
            let bound = resolve_textures(textures, mesh);
            let uniforms = MeshUniforms::new(perspective, view, world);
            result = backend.draw_mesh(&mesh.buffers, &uniforms, &bound);
        });
        result?;

        self.backend.end_frame()
    }

    /// Registers `texture` as the display texture and presents it.
    pub fn display(&mut self, texture: Rc<B::Texture>) -> Result<()> {
        self.transition(FrameState::Composite);
        self.textures.insert(DISPLAY_TEXTURE, texture.clone());
        let result = self.backend.present(&texture);
        self.transition(FrameState::Idle);
        result
    }

    /// Loads a model file, uploads its meshes and makes it the active scene.
    ///
    /// The active scene and the registered textures are left untouched when
    /// loading fails.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut textures = TextureRegistry::new();
        let scene = load_scene(path, &self.config.assets_dir, &mut textures, &mut self.backend)?;
        let backend = &mut self.backend;
        let scene = scene.try_map(|mesh| {
            Ok::<_, Error>(DrawMesh {
                buffers: backend.create_mesh(&mesh)?,
                name: mesh.name,
                textures: mesh.textures,
            })
        })?;
        log::info!("scene {} active with {} mesh(es)", path.display(), scene.mesh_count());
        self.textures.merge(textures);
        self.set_scene(scene);
        Ok(())
    }

    pub fn set_scene(&mut self, scene: SceneGraph<DrawMesh<B::Mesh>>) {
        self.scene = scene;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
        self.projection.resize(width, height);
    }

    fn setup_camera(&mut self) {
        let (width, height) = self.backend.output_size();
        self.projection.resize(width, height);
        self.perspective = self.projection.calc_matrix();
        self.view = self.camera.look_at();
    }

    fn transition(&mut self, next: FrameState) {
        log::trace!("frame state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scene(&self) -> &SceneGraph<DrawMesh<B::Mesh>> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph<DrawMesh<B::Mesh>> {
        &mut self.scene
    }

    pub fn textures(&self) -> &TextureRegistry<B::Texture> {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureRegistry<B::Texture> {
        &mut self.textures
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Perspective and view matrices of the last camera setup.
    pub fn matrices(&self) -> (Matrix4<f32>, Matrix4<f32>) {
        (self.perspective, self.view)
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Seconds accumulated over every rendered frame.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

fn resolve_textures<T, H>(textures: &TextureRegistry<T>, mesh: &DrawMesh<H>) -> Vec<SlotTexture<T>> {
    mesh.textures
        .iter()
        .filter_map(|binding| match textures.get(&binding.name) {
            Some(texture) => Some((binding.slot, texture.clone())),
            None => {
                log::warn!("texture {} of {} is not registered", binding.name, mesh.name);
                None
            }
        })
        .collect()
}

impl<B: RenderBackend + Default> Default for Device<B> {
    fn default() -> Self {
        Self::new(B::default(), Config::default())
    }
}

impl<B: RenderBackend> std::fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("state", &self.state)
            .field("elapsed", &self.elapsed)
            .field("meshes", &self.scene.mesh_count())
            .field("textures", &self.textures.names())
            .finish()
    }
}

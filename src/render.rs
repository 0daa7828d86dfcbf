//! The seam between the frame driver and the GPU.
//!
//! [`RenderBackend`] is everything the [`Device`](crate::device::Device) asks of
//! a graphics API during a frame: creating textures, render targets and mesh
//! buffers, binding up to [`MAX_COLOR_TARGETS`] colour targets, clearing,
//! drawing meshes with their uniforms and textures, and presenting a finished
//! texture on screen.
//!
//! Two backends exist:
//!
//! - [`Context`](crate::context::Context) drives wgpu
//! - [`Headless`] records every call and keeps textures on the CPU, which is
//!   what the tests and tooling without a window use
//!

use std::rc::Rc;

use cgmath::Matrix4;

use crate::{
    data_structures::{material::TextureSlot, mesh::Mesh, texture::TexelBuffer},
    error::Result,
};

/// Colour targets a single draw can write to at once.
pub const MAX_COLOR_TARGETS: usize = 4;

/// Per-draw matrices, laid out for a uniform buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

impl MeshUniforms {
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>, model: Matrix4<f32>) -> Self {
        Self {
            projection: projection.into(),
            view: view.into(),
            model: model.into(),
        }
    }
}

/// Pixel area drawn into, anchored at the top left corner of the targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A texture handed to [`RenderBackend::draw_mesh`] together with its slot.
pub type SlotTexture<T> = (TextureSlot, Rc<T>);

pub trait RenderBackend {
    type Texture;
    type Mesh;

    /// Size of the presentation surface in pixels.
    fn output_size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Uploads a material texture.
    fn create_texture(&mut self, label: &str, texels: &TexelBuffer) -> Result<Self::Texture>;

    /// Creates an off-screen colour target that can be drawn into and sampled.
    fn create_target(&mut self, label: &str, size: (u32, u32)) -> Result<Self::Texture>;

    fn create_mesh(&mut self, mesh: &Mesh) -> Result<Self::Mesh>;

    /// Starts a frame writing to `targets`, in order.
    fn bind_targets(&mut self, targets: &[Rc<Self::Texture>], viewport: Viewport) -> Result<()>;

    /// Clears every bound target to `colour` and the depth buffer to 1.0.
    fn clear(&mut self, colour: wgpu::Color) -> Result<()>;

    /// Draws one mesh. Slots missing from `textures` fall back to defaults.
    fn draw_mesh(
        &mut self,
        mesh: &Self::Mesh,
        uniforms: &MeshUniforms,
        textures: &[SlotTexture<Self::Texture>],
    ) -> Result<()>;

    /// Finishes the frame started by [`RenderBackend::bind_targets`].
    fn end_frame(&mut self) -> Result<()>;

    /// Shows `texture` on a full-screen quad.
    fn present(&mut self, texture: &Rc<Self::Texture>) -> Result<()>;
}

/// Texture kept on the CPU by [`Headless`].
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessTexture {
    pub label: String,
    pub size: (u32, u32),
    /// `None` for render targets.
    pub texels: Option<TexelBuffer>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessMesh {
    pub name: String,
    pub vertices: usize,
    pub indices: usize,
}

/// One recorded [`RenderBackend`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTexture { label: String },
    CreateTarget { label: String, size: (u32, u32) },
    CreateMesh { name: String },
    BindTargets { labels: Vec<String>, viewport: Viewport },
    Clear(wgpu::Color),
    DrawMesh {
        mesh: String,
        uniforms: MeshUniforms,
        textures: Vec<(TextureSlot, String)>,
    },
    EndFrame,
    Present { label: String },
}

/// A backend without a GPU that records every call it receives.
#[derive(Debug, Default)]
pub struct Headless {
    size: (u32, u32),
    commands: Vec<Command>,
}

impl Headless {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the recorded commands and starts a fresh recording.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Recorded draws in submission order.
    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::DrawMesh { .. }))
    }
}

impl RenderBackend for Headless {
    type Texture = HeadlessTexture;
    type Mesh = HeadlessMesh;

    fn output_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn create_texture(&mut self, label: &str, texels: &TexelBuffer) -> Result<Self::Texture> {
        self.commands.push(Command::CreateTexture {
            label: label.to_string(),
        });
        Ok(HeadlessTexture {
            label: label.to_string(),
            size: texels.dimensions(),
            texels: Some(texels.clone()),
        })
    }

    fn create_target(&mut self, label: &str, size: (u32, u32)) -> Result<Self::Texture> {
        self.commands.push(Command::CreateTarget {
            label: label.to_string(),
            size,
        });
        Ok(HeadlessTexture {
            label: label.to_string(),
            size,
            texels: None,
        })
    }

    fn create_mesh(&mut self, mesh: &Mesh) -> Result<Self::Mesh> {
        self.commands.push(Command::CreateMesh {
            name: mesh.name.clone(),
        });
        Ok(HeadlessMesh {
            name: mesh.name.clone(),
            vertices: mesh.data.vertices.len(),
            indices: mesh.data.indices.len(),
        })
    }

    fn bind_targets(&mut self, targets: &[Rc<Self::Texture>], viewport: Viewport) -> Result<()> {
        self.commands.push(Command::BindTargets {
            labels: targets.iter().map(|target| target.label.clone()).collect(),
            viewport,
        });
        Ok(())
    }

    fn clear(&mut self, colour: wgpu::Color) -> Result<()> {
        self.commands.push(Command::Clear(colour));
        Ok(())
    }

    fn draw_mesh(
        &mut self,
        mesh: &Self::Mesh,
        uniforms: &MeshUniforms,
        textures: &[SlotTexture<Self::Texture>],
    ) -> Result<()> {
        self.commands.push(Command::DrawMesh {
            mesh: mesh.name.clone(),
            uniforms: *uniforms,
            textures: textures
                .iter()
                .map(|(slot, texture)| (*slot, texture.label.clone()))
                .collect(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.commands.push(Command::EndFrame);
        Ok(())
    }

    fn present(&mut self, texture: &Rc<Self::Texture>) -> Result<()> {
        self.commands.push(Command::Present {
            label: texture.label.clone(),
        });
        Ok(())
    }
}

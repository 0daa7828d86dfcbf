//! The wgpu rendering backend.
//!
//! [`Context`] owns the surface, device and queue plus every pipeline the frame
//! driver needs. Draws are recorded between `bind_targets` and `end_frame` and
//! replayed in a single render pass when the frame ends.

use std::{collections::HashMap, iter, rc::Rc, sync::Arc};

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    data_structures::{
        material::TextureSlot,
        mesh::{GpuMesh, Mesh},
        texture::{self, TexelBuffer, Texture},
    },
    error::Result,
    pipelines::{
        display::{self, Quad},
        mesh,
    },
    render::{MeshUniforms, RenderBackend, SlotTexture, Viewport},
};

/// Colours of the 1x1 textures bound to slots a material leaves empty.
const SLOT_DEFAULTS: [(TextureSlot, [f32; 4]); TextureSlot::COUNT] = [
    (TextureSlot::Ambient, [0.0, 0.0, 0.0, 1.0]),
    (TextureSlot::Diffuse, [1.0, 1.0, 1.0, 1.0]),
    (TextureSlot::Normal, [0.5, 0.5, 1.0, 1.0]),
    (TextureSlot::Metallic, [0.0, 0.0, 0.0, 1.0]),
    (TextureSlot::Roughness, [1.0, 0.0, 0.0, 1.0]),
];

#[derive(Debug)]
struct PendingDraw {
    mesh: GpuMesh,
    uniforms: wgpu::BindGroup,
    material: wgpu::BindGroup,
}

#[derive(Debug)]
struct Frame {
    targets: Vec<Rc<Texture>>,
    viewport: Viewport,
    clear: Option<wgpu::Color>,
    draws: Vec<PendingDraw>,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    is_surface_configured: bool,
    depth_texture: Texture,
    uniform_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    display_layout: wgpu::BindGroupLayout,
    mesh_pipelines: HashMap<usize, wgpu::RenderPipeline>,
    display_pipeline: wgpu::RenderPipeline,
    quad: Quad,
    defaults: Vec<Rc<Texture>>,
    material_sampler: wgpu::Sampler,
    display_sampler: wgpu::Sampler,
    frame: Option<Frame>,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::warn!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::warn!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        // GPU call failures are reported here instead of unwinding
        device.on_uncaptured_error(Box::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        log::warn!("Surface");
        let surface_caps = surface.get_capabilities(&adapter);
        // The display shader outputs linear colour, an sRGB surface does the conversion.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no supported formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let uniform_layout = mesh::uniform_layout(&device);
        let material_layout = mesh::material_layout(&device);
        let display_layout = display::display_layout(&device);
        let display_pipeline =
            display::mk_display_pipeline(&device, config.format, &display_layout);
        let quad = Quad::new(&device);

        let defaults = SLOT_DEFAULTS
            .iter()
            .map(|(slot, rgba)| {
                Rc::new(Texture::create_constant(
                    &device,
                    &queue,
                    *rgba,
                    &format!("default {} texture", slot.suffix()),
                ))
            })
            .collect();
        let material_sampler = texture::create_nearest_sampler(&device);
        let display_sampler = texture::create_linear_sampler(&device);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            is_surface_configured,
            depth_texture,
            uniform_layout,
            material_layout,
            display_layout,
            mesh_pipelines: HashMap::new(),
            display_pipeline,
            quad,
            defaults,
            material_sampler,
            display_sampler,
            frame: None,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Pipelines are built the first time a target count is used.
    fn ensure_mesh_pipeline(&mut self, target_count: usize) {
        if !self.mesh_pipelines.contains_key(&target_count) {
            log::debug!("building mesh pipeline for {} target(s)", target_count);
            let pipeline = mesh::mk_mesh_pipeline(
                &self.device,
                target_count,
                &self.uniform_layout,
                &self.material_layout,
            );
            self.mesh_pipelines.insert(target_count, pipeline);
        }
    }

    fn ensure_depth_texture(&mut self, width: u32, height: u32) {
        let size = self.depth_texture.texture.size();
        if size.width != width || size.height != height {
            self.depth_texture =
                Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        }
    }

    fn material_bind_group(&self, textures: &[SlotTexture<Texture>]) -> wgpu::BindGroup {
        let mut views: Vec<&wgpu::TextureView> =
            self.defaults.iter().map(|texture| &texture.view).collect();
        for (slot, texture) in textures {
            views[slot.index()] = &texture.view;
        }
        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .into_iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: TextureSlot::COUNT as u32,
            resource: wgpu::BindingResource::Sampler(&self.material_sampler),
        });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &entries,
            label: Some("material_bind_group"),
        })
    }
}

impl RenderBackend for Context {
    type Texture = Texture;
    type Mesh = GpuMesh;

    fn output_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.is_surface_configured = true;
        }
    }

    fn create_texture(&mut self, label: &str, texels: &TexelBuffer) -> Result<Self::Texture> {
        Ok(Texture::from_texels(&self.device, &self.queue, texels, label))
    }

    fn create_target(&mut self, label: &str, size: (u32, u32)) -> Result<Self::Texture> {
        Ok(Texture::create_target(&self.device, [size.0, size.1], label))
    }

    fn create_mesh(&mut self, mesh: &Mesh) -> Result<Self::Mesh> {
        Ok(GpuMesh::new(&self.device, mesh))
    }

    fn bind_targets(&mut self, targets: &[Rc<Self::Texture>], viewport: Viewport) -> Result<()> {
        if self.frame.is_some() {
            log::warn!("targets bound while a frame was still open, dropping its draws");
        }
        self.frame = Some(Frame {
            targets: targets.to_vec(),
            viewport,
            clear: None,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn clear(&mut self, colour: wgpu::Color) -> Result<()> {
        match self.frame.as_mut() {
            Some(frame) => frame.clear = Some(colour),
            None => log::warn!("clear without bound targets ignored"),
        }
        Ok(())
    }

    fn draw_mesh(
        &mut self,
        mesh: &Self::Mesh,
        uniforms: &MeshUniforms,
        textures: &[SlotTexture<Self::Texture>],
    ) -> Result<()> {
        if self.frame.is_none() {
            log::warn!("draw of {} without bound targets ignored", mesh.name);
            return Ok(());
        }
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Uniform Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&[*uniforms]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniforms = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("mesh_uniform_bind_group"),
        });
        let material = self.material_bind_group(textures);
        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(PendingDraw {
                mesh: mesh.clone(),
                uniforms,
                material,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        let Some(frame) = self.frame.take() else {
            log::warn!("end_frame without bound targets");
            return Ok(());
        };
        let Some(first) = frame.targets.first() else {
            return Ok(());
        };
        let (width, height) = (first.texture.width(), first.texture.height());
        self.ensure_mesh_pipeline(frame.targets.len());
        self.ensure_depth_texture(width, height);
        let Some(pipeline) = self.mesh_pipelines.get(&frame.targets.len()) else {
            return Ok(());
        };

        let load = frame.clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear);
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = frame
            .targets
            .iter()
            .map(|target| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: if frame.clear.is_some() {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_viewport(
                0.0,
                0.0,
                frame.viewport.width.clamp(1, width) as f32,
                frame.viewport.height.clamp(1, height) as f32,
                0.0,
                1.0,
            );
            render_pass.set_pipeline(pipeline);
            for draw in &frame.draws {
                render_pass.set_bind_group(0, &draw.uniforms, &[]);
                render_pass.set_bind_group(1, &draw.material, &[]);
                render_pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.mesh.num_elements, 0, 0..1);
            }
        }
        self.queue.submit(iter::once(encoder.finish()));
        Ok(())
    }

    fn present(&mut self, texture: &Rc<Self::Texture>) -> Result<()> {
        self.window.request_redraw();
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }
        if texture.texture.format() != Texture::TARGET_FORMAT {
            log::warn!(
                "cannot display a {:?} texture, expected a render target",
                texture.texture.format()
            );
            return Ok(());
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = texture.sampler.as_ref().unwrap_or(&self.display_sampler);
        let bind_group =
            display::mk_bind_group(&self.device, &self.display_layout, &texture.view, sampler);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Display Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Display Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.display_pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.quad.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.quad.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..self.quad.num_indices, 0, 0..1);
        }
        self.queue.submit(iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

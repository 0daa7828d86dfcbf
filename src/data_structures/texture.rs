//! CPU texel buffers and GPU textures.
//!
//! [`TexelBuffer`] is what the material parser produces: either a decoded image
//! or a synthesized single-pixel constant. [`Texture`] wraps the WGPU resources
//! a texel buffer or a render target ends up as.

use image::DynamicImage;

/// Channel layout of a [`TexelBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channels {
    R,
    Rgb,
    Rgba,
}

/// Floating point pixel data kept on the CPU until it is uploaded.
#[derive(Clone, Debug, PartialEq)]
pub struct TexelBuffer {
    width: u32,
    height: u32,
    channels: Channels,
    texels: Vec<f32>,
}

impl TexelBuffer {
    /// A 1x1 RGB texture holding a constant colour.
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            width: 1,
            height: 1,
            channels: Channels::Rgb,
            texels: vec![r, g, b],
        }
    }

    /// A 1x1 single channel texture holding a constant value.
    pub fn scalar(value: f32) -> Self {
        Self {
            width: 1,
            height: 1,
            channels: Channels::R,
            texels: vec![value],
        }
    }

    pub fn from_image(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            channels: Channels::Rgba,
            texels: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    /// Expands the buffer to four channels, the layout the GPU textures use.
    ///
    /// Single channel data lands in the red channel.
    pub fn to_rgba(&self) -> Vec<f32> {
        match self.channels {
            Channels::Rgba => self.texels.clone(),
            Channels::Rgb => self
                .texels
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 1.0])
                .collect(),
            Channels::R => self.texels.iter().flat_map(|&v| [v, 0.0, 0.0, 1.0]).collect(),
        }
    }
}

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Format of material textures. Not filterable, sampled with [`create_nearest_sampler`].
    pub const MATERIAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
    /// Format of off-screen colour targets. Blendable and filterable.
    pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// Create an off-screen colour target that can later be sampled by the
    /// display pass.
    pub fn create_target(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_linear_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload a texel buffer as a material texture.
    pub fn from_texels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texels: &TexelBuffer,
        label: &str,
    ) -> Self {
        let (width, height) = texels.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::MATERIAL_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let rgba = texels.to_rgba();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            bytemuck::cast_slice(&rgba),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // Rgba32Float: 16 bytes per texel
                bytes_per_row: Some(16 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_nearest_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Create a 1x1 material texture of a constant colour.
    ///
    /// Used for slots a material leaves empty so the mesh pipeline never has to
    /// change its bind group layout.
    pub fn create_constant(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [f32; 4],
        label: &str,
    ) -> Self {
        let texels = TexelBuffer {
            width: 1,
            height: 1,
            channels: Channels::Rgba,
            texels: rgba.to_vec(),
        };
        Self::from_texels(device, queue, &texels, label)
    }
}

pub fn create_nearest_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

pub fn create_linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

use crate::{
    data_structures::{material::TextureSlot, mesh::ModelVertex, texture::Texture},
    pipelines::mk_render_pipeline,
    render::MAX_COLOR_TARGETS,
};

/// Layout of the per-draw `MeshUniforms` buffer.
pub fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("mesh_uniform_bind_group_layout"),
    })
}

/// One texture per [`TextureSlot`] in slot order, then a shared sampler.
///
/// Material textures are 32-bit float and therefore not filterable.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = TextureSlot::ALL
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.index() as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: TextureSlot::COUNT as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
        count: None,
    });
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("material_bind_group_layout"),
    })
}

/// Mesh pipeline writing to `target_count` colour targets.
///
/// Target 0 receives the lit colour; further targets get the world normal,
/// the albedo and the metallic/roughness pair, in that order.
pub fn mk_mesh_pipeline(
    device: &wgpu::Device,
    target_count: usize,
    uniform_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let target_count = target_count.clamp(1, MAX_COLOR_TARGETS);
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts: &[uniform_layout, material_layout],
        push_constant_ranges: &[],
    });

    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("mesh_shader.wgsl").into()),
    };

    // Source-alpha blending on every target
    let blend = Some(wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent::OVER,
    });
    let targets: Vec<Option<wgpu::ColorTargetState>> = (0..target_count)
        .map(|_| {
            Some(wgpu::ColorTargetState {
                format: Texture::TARGET_FORMAT,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    mk_render_pipeline(
        device,
        &format!("Mesh Pipeline ({} targets)", target_count),
        &render_pipeline_layout,
        &targets,
        Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        None,
        &[ModelVertex::desc()],
        &format!("fs_main_{}", target_count),
        shader,
    )
}

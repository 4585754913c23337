use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::device::objects::LinkedProgram;
use crate::vertex::{PrimitiveTopology, VertexLayout};

/// Pipelines are cached per vertex layout + topology.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct PipelineKey {
    pub layout: VertexLayout,
    pub topology: PrimitiveTopology,
}

/// GPU-side objects of one linked program.
pub(crate) struct GpuProgram {
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    /// One buffer per uniform block, same order as the uniform table.
    uniform_buffers: Vec<wgpu::Buffer>,
    /// Indexed by group number.
    pub bind_groups: Vec<wgpu::BindGroup>,
    pub pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, linked: &LinkedProgram) -> Self {
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("glint vertex stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(linked.vertex.module.clone())),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("glint fragment stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(linked.fragment.module.clone())),
        });

        let blocks = &linked.uniforms.table().blocks;

        let uniform_buffers: Vec<wgpu::Buffer> = blocks
            .iter()
            .map(|b| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: b.name.as_deref().or(Some("glint uniform block")),
                    size: (b.size as u64).max(16).next_multiple_of(16),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let group_count = blocks.iter().map(|b| b.group + 1).max().unwrap_or(0);
        let mut bind_group_layouts = Vec::with_capacity(group_count as usize);
        let mut bind_groups = Vec::with_capacity(group_count as usize);

        for group in 0..group_count {
            let members: Vec<usize> = (0..blocks.len())
                .filter(|&i| blocks[i].group == group)
                .collect();

            let entries: Vec<wgpu::BindGroupLayoutEntry> = members
                .iter()
                .map(|&i| wgpu::BindGroupLayoutEntry {
                    binding: blocks[i].binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(blocks[i].size as u64),
                    },
                    count: None,
                })
                .collect();

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("glint uniform layout"),
                entries: &entries,
            });

            let resources: Vec<wgpu::BindGroupEntry> = members
                .iter()
                .map(|&i| wgpu::BindGroupEntry {
                    binding: blocks[i].binding,
                    resource: uniform_buffers[i].as_entire_binding(),
                })
                .collect();

            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("glint uniform bind group"),
                layout: &layout,
                entries: &resources,
            }));
            bind_group_layouts.push(layout);
        }

        let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glint pipeline layout"),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        Self {
            vertex_module,
            fragment_module,
            pipeline_layout,
            uniform_buffers,
            bind_groups,
            pipelines: HashMap::new(),
        }
    }

    /// Writes dirty uniform blocks to their buffers. Returns the number written.
    ///
    /// Writes land when the queue is next submitted, so every draw recorded in
    /// a frame sees the last values written during that frame.
    pub fn upload_uniforms(&self, queue: &wgpu::Queue, linked: &mut LinkedProgram) -> u32 {
        let mut written = 0;
        for (i, buffer) in self.uniform_buffers.iter().enumerate() {
            if linked.uniforms.take_dirty(i) {
                queue.write_buffer(buffer, 0, linked.uniforms.block_bytes(i));
                written += 1;
            }
        }
        written
    }

    pub fn ensure_pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        linked: &LinkedProgram,
        key: &PipelineKey,
    ) {
        if self.pipelines.contains_key(key) {
            return;
        }

        let attributes: Vec<wgpu::VertexAttribute> = key
            .layout
            .attributes()
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format.to_wgpu(),
                offset: a.offset as u64,
                shader_location: a.location,
            })
            .collect();

        log::debug!(
            "creating pipeline: stride {} with {} attributes, {:?}",
            key.layout.stride(),
            attributes.len(),
            key.topology
        );

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glint pipeline"),
            layout: Some(&self.pipeline_layout),

            vertex: wgpu::VertexState {
                module: &self.vertex_module,
                entry_point: Some(&linked.vertex.entry_point),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: key.layout.stride() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &self.fragment_module,
                entry_point: Some(&linked.fragment.entry_point),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: key.topology.to_wgpu(),
                strip_index_format: match key.topology {
                    PrimitiveTopology::TriangleStrip => Some(wgpu::IndexFormat::Uint32),
                    PrimitiveTopology::TriangleList => None,
                },
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(key.clone(), pipeline);
    }
}

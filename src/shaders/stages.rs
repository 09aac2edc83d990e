// SPDX-License-Identifier: GPL-3.0-only

//! Compiled render pipelines for the five stage programs

use super::StageKind;
use crate::gpu::wgpu;
use tracing::debug;

/// A sampled input: a texture view and the sampler it is read through
#[derive(Clone, Copy)]
pub struct StageInput<'a> {
    pub view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

/// One compiled program with its bind group layout
pub struct Stage {
    kind: StageKind,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
}

impl Stage {
    fn new(device: &wgpu::Device, kind: StageKind) -> Self {
        let label = kind.label();
        let source = kind.source();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let entries = layout_entries(kind);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: kind.target_format(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        debug!(stage = label, inputs = kind.input_count(), "Stage program compiled");

        Self {
            kind,
            bind_group_layout,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// Bind inputs in order, then the params uniform if the stage has one
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        inputs: &[StageInput<'_>],
        params: Option<&wgpu::Buffer>,
    ) -> wgpu::BindGroup {
        debug_assert_eq!(inputs.len(), self.kind.input_count());
        debug_assert_eq!(params.is_some(), self.kind.uses_params());

        let mut entries = Vec::with_capacity(inputs.len() * 2 + 1);
        for (i, input) in inputs.iter().enumerate() {
            let binding = (i * 2) as u32;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(input.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(input.sampler),
            });
        }
        if let Some(buffer) = params {
            entries.push(wgpu::BindGroupEntry {
                binding: (inputs.len() * 2) as u32,
                resource: buffer.as_entire_binding(),
            });
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.kind.label()),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }
}

/// Texture/sampler pairs at 2k/2k+1, uniform after the last pair
fn layout_entries(kind: StageKind) -> Vec<wgpu::BindGroupLayoutEntry> {
    let inputs = kind.input_count() as u32;
    let mut entries = Vec::with_capacity(inputs as usize * 2 + 1);

    for i in 0..inputs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: i * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: i * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    if kind.uses_params() {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: inputs * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    entries
}

/// All five programs, compiled once per device
pub struct StagePrograms {
    stages: [Stage; 5],
}

impl StagePrograms {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            stages: StageKind::ALL.map(|kind| Stage::new(device, kind)),
        }
    }

    pub fn get(&self, kind: StageKind) -> &Stage {
        &self.stages[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_bindings_are_contiguous() {
        for kind in StageKind::ALL {
            let entries = layout_entries(kind);
            let expected = kind.input_count() * 2 + usize::from(kind.uses_params());
            assert_eq!(entries.len(), expected, "{:?}", kind);
            for (i, entry) in entries.iter().enumerate() {
                assert_eq!(entry.binding as usize, i);
            }
        }
    }

    #[test]
    fn test_covariance_uniform_follows_both_inputs() {
        let entries = layout_entries(StageKind::Covariance);
        assert!(matches!(
            entries[4].ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                ..
            }
        ));
    }
}

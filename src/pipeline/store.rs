// SPDX-License-Identifier: GPL-3.0-only

//! Texture store: typed render targets, uploads and full-screen draws
//!
//! Every texture carries its own sampler so a target keeps the filter mode
//! it was allocated with, no matter which stage reads it.

use crate::config::{FilterConfig, WorkingResolution};
use crate::constants::{FULLSCREEN_QUAD_VERTICES, INPUT_FORMAT, OUTPUT_FORMAT, WORKING_FORMAT};
use crate::gpu::wgpu;
use crate::shaders::{Stage, StageInput};
use std::ops::Index;
use tracing::debug;

/// Which of the two resolutions a texture or viewport uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Sub-resolution of the statistics passes
    Working,
    /// Output resolution
    Full,
}

impl Resolution {
    /// Pixel size under a configuration
    pub fn extent(self, config: &FilterConfig, working: &WorkingResolution) -> (u32, u32) {
        match self {
            Resolution::Working => (working.width, working.height),
            Resolution::Full => (config.width, config.height),
        }
    }
}

/// Sampler filter applied when a texture is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

impl Filter {
    fn wgpu(self) -> wgpu::FilterMode {
        match self {
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// The seven render targets of one configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    /// Pass 1 output: (I, p, Ip, II)
    Products,
    /// Scratch target between the two axes of a box filter
    PingPong,
    /// Box means of the products
    Means,
    /// Hadamard-2 output, smoothed in place when enabled
    MeanProducts,
    /// Per-window (a, b)
    Coefficients,
    /// Averaged (a, b) upsampled to output resolution
    SmoothedCoefficients,
    /// Final intensity
    Output,
}

/// Allocation parameters of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub resolution: Resolution,
    pub filter: Filter,
    pub format: wgpu::TextureFormat,
}

impl TargetId {
    pub const ALL: [TargetId; 7] = [
        TargetId::Products,
        TargetId::PingPong,
        TargetId::Means,
        TargetId::MeanProducts,
        TargetId::Coefficients,
        TargetId::SmoothedCoefficients,
        TargetId::Output,
    ];

    pub fn spec(self) -> TargetSpec {
        use Filter::*;
        use Resolution::*;
        let (resolution, filter) = match self {
            TargetId::Products => (Working, Nearest),
            TargetId::PingPong => (Working, Linear),
            TargetId::Means => (Working, Linear),
            TargetId::MeanProducts => (Working, Nearest),
            TargetId::Coefficients => (Working, Nearest),
            TargetId::SmoothedCoefficients => (Full, Linear),
            TargetId::Output => (Full, Linear),
        };
        let format = match self {
            TargetId::Output => OUTPUT_FORMAT,
            _ => WORKING_FORMAT,
        };
        TargetSpec {
            resolution,
            filter,
            format,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetId::Products => "guided-filter products",
            TargetId::PingPong => "guided-filter ping-pong",
            TargetId::Means => "guided-filter means",
            TargetId::MeanProducts => "guided-filter mean products",
            TargetId::Coefficients => "guided-filter coefficients",
            TargetId::SmoothedCoefficients => "guided-filter smoothed coefficients",
            TargetId::Output => "guided-filter output",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// A texture with its default view and sampler
pub struct StoredTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl StoredTexture {
    /// Allocate a 2D texture with a clamp-to-edge sampler
    pub fn allocate(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        filter: Filter,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter.wgpu(),
            min_filter: filter.wgpu(),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// Allocate a single-channel input texture for a mask or guide plane
    pub fn input(device: &wgpu::Device, label: &str, width: u32, height: u32, filter: Filter) -> Self {
        Self::allocate(
            device,
            label,
            width,
            height,
            INPUT_FORMAT,
            filter,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Write tightly packed 8-bit rows; rows are not padded
    pub fn upload(&self, queue: &wgpu::Queue, data: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn as_input(&self) -> StageInput<'_> {
        StageInput {
            view: &self.view,
            sampler: &self.sampler,
        }
    }
}

/// All render targets of one configuration, indexed by [`TargetId`]
pub struct RenderTargets {
    targets: [StoredTexture; 7],
}

impl RenderTargets {
    pub fn allocate(
        device: &wgpu::Device,
        config: &FilterConfig,
        working: &WorkingResolution,
    ) -> Self {
        let targets = TargetId::ALL.map(|id| {
            let spec = id.spec();
            let (width, height) = spec.resolution.extent(config, working);
            let mut usage =
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
            if id == TargetId::Output {
                usage |= wgpu::TextureUsages::COPY_SRC;
            }
            debug!(texture = id.label(), width, height, "Allocating render target");
            StoredTexture::allocate(device, id.label(), width, height, spec.format, spec.filter, usage)
        });
        Self { targets }
    }
}

impl Index<TargetId> for RenderTargets {
    type Output = StoredTexture;

    fn index(&self, id: TargetId) -> &StoredTexture {
        &self.targets[id.index()]
    }
}

/// Record one full-screen quad draw into `target`
pub fn draw_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    stage: &Stage,
    bind_group: &wgpu::BindGroup,
    target: &StoredTexture,
    viewport: (u32, u32),
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &target.view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    render_pass.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);
    render_pass.set_pipeline(stage.pipeline());
    render_pass.set_bind_group(0, bind_group, &[]);
    render_pass.draw(0..FULLSCREEN_QUAD_VERTICES, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_table() {
        assert_eq!(TargetId::Products.spec().filter, Filter::Nearest);
        assert_eq!(TargetId::Means.spec().filter, Filter::Linear);
        assert_eq!(TargetId::SmoothedCoefficients.spec().resolution, Resolution::Full);
        assert_eq!(TargetId::Output.spec().format, OUTPUT_FORMAT);
        let working_only = TargetId::ALL
            .iter()
            .filter(|id| id.spec().resolution == Resolution::Working)
            .count();
        assert_eq!(working_only, 5);
    }

    #[test]
    fn test_resolution_extent() {
        let config = FilterConfig::default();
        let working = config.working_resolution();
        assert_eq!(Resolution::Working.extent(&config, &working), (128, 128));
        assert_eq!(Resolution::Full.extent(&config, &working), (513, 513));
    }

    #[test]
    fn test_target_indices_are_dense() {
        for (i, id) in TargetId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }
}

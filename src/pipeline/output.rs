// SPDX-License-Identifier: GPL-3.0-only

//! Handle to the composed output texture

use super::store::StoredTexture;
use crate::errors::GpuError;
use crate::gpu::{GpuContext, padded_bytes_per_row, read_buffer_async, strip_row_padding, wgpu};
use image::{GrayImage, RgbaImage};

/// Output of one `apply`.
///
/// Borrows the pipeline, so it cannot outlive the next `apply` or
/// `configure`. The texture is stored bottom-up; the readback helpers return
/// images in top-down order.
pub struct FilterOutput<'a> {
    ctx: &'a GpuContext,
    target: &'a StoredTexture,
}

impl<'a> FilterOutput<'a> {
    pub(crate) fn new(ctx: &'a GpuContext, target: &'a StoredTexture) -> Self {
        Self { ctx, target }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.target.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    pub fn width(&self) -> u32 {
        self.target.width
    }

    pub fn height(&self) -> u32 {
        self.target.height
    }

    /// Copy the RGBA8 output to the CPU
    pub async fn read_rgba(&self) -> Result<RgbaImage, GpuError> {
        let (width, height) = (self.width(), self.height());
        let padded_row = padded_bytes_per_row(width, 4);
        let device = &self.ctx.device;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided-filter readback buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("guided-filter readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let padded = read_buffer_async(device, &buffer).await?;
        let pixels = strip_row_padding(
            &padded,
            padded_row as usize,
            width as usize * 4,
            height as usize,
            true,
        );

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| GpuError::Readback("readback size mismatch".to_string()))
    }

    /// Refined intensity (the red channel) as a grayscale image
    pub async fn read_intensity(&self) -> Result<GrayImage, GpuError> {
        let rgba = self.read_rgba().await?;
        let (width, height) = rgba.dimensions();
        let intensity = rgba.pixels().map(|p| p[0]).collect();
        GrayImage::from_raw(width, height, intensity)
            .ok_or_else(|| GpuError::Readback("readback size mismatch".to_string()))
    }

    pub fn read_rgba_blocking(&self) -> Result<RgbaImage, GpuError> {
        pollster::block_on(self.read_rgba())
    }

    pub fn read_intensity_blocking(&self) -> Result<GrayImage, GpuError> {
        pollster::block_on(self.read_intensity())
    }
}

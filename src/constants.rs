// SPDX-License-Identifier: GPL-3.0-only

//! Filter-wide constants

use crate::gpu::wgpu;

/// Default smoothing window half-width (full-resolution pixels)
pub const DEFAULT_RADIUS: u32 = 16;

/// Default regularisation added to the local guide variance
pub const DEFAULT_EPSILON: f32 = 1e-6;

/// Default output width
pub const DEFAULT_WIDTH: u32 = 513;

/// Default output height
pub const DEFAULT_HEIGHT: u32 = 513;

/// Default downsampling factor for the statistics passes
pub const DEFAULT_SUBSAMPLE_FACTOR: u32 = 4;

/// Radii below this run every pass at full resolution.
///
/// Subsampling a small radius would leave a box window wider than the
/// downsampled image can represent.
pub const SUBSAMPLE_MIN_RADIUS: u32 = 4;

/// Scale applied to the mask coordinate in the first pass.
///
/// Pulls samples slightly inside the mask so the nearest-filtered lookup
/// never lands on the far edge row/column.
pub const MASK_COORD_SCALE: f32 = 0.99;

/// Format of every intermediate render target (products, means, coefficients)
pub const WORKING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Format of the final composed output
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Format of the uploaded mask and guide planes (one byte per pixel)
pub const INPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Vertices in the full-screen quad (two triangles)
pub const FULLSCREEN_QUAD_VERTICES: u32 = 6;

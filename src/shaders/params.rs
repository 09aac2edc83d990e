// SPDX-License-Identifier: GPL-3.0-only

//! Uniform block shared by the box-filter and covariance stages
//!
//! Mirrors `StageParams` in fullscreen.wgsl; the size assertion below
//! catches layout drift between the two.

/// Direction of one box-filter sub-pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxAxis {
    /// First sub-pass, offsets along x
    Horizontal,
    /// Second sub-pass, offsets along y
    Vertical,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StageParams {
    /// Box half-width in texels of the source
    pub radius: u32,
    /// 1 for the horizontal sub-pass, 0 for the vertical one
    pub first_pass: u32,
    /// Variance regulariser (covariance stage only)
    pub epsilon: f32,
    pub _padding: u32,
}

impl StageParams {
    /// Parameters for one box-filter sub-pass
    pub fn box_filter(radius: u32, axis: BoxAxis) -> Self {
        Self {
            radius,
            first_pass: u32::from(axis == BoxAxis::Horizontal),
            epsilon: 0.0,
            _padding: 0,
        }
    }

    /// Parameters for the covariance/regression stage
    pub fn covariance(epsilon: f32) -> Self {
        Self {
            radius: 0,
            first_pass: 0,
            epsilon,
            _padding: 0,
        }
    }
}

const _: () = assert!(std::mem::size_of::<StageParams>() == 16);

// SPDX-License-Identifier: GPL-3.0-only

//! Guided filter stage programs
//!
//! Five fragment programs share one full-screen vertex stage. Each program
//! samples its inputs as (texture, sampler) pairs at consecutive bindings,
//! followed by an optional [`StageParams`] uniform.

pub mod params;
mod stages;

pub use params::{BoxAxis, StageParams};
pub use stages::{Stage, StageInput, StagePrograms};

use crate::constants::{MASK_COORD_SCALE, OUTPUT_FORMAT, WORKING_FORMAT};
use crate::gpu::wgpu;

/// Full-screen quad vertex stage plus the shared uniform struct
pub const FULLSCREEN_VERTEX: &str = include_str!("fullscreen.wgsl");
/// Pass 1: (I, p, I*p, I*I)
pub const HADAMARD4_SHADER: &str = include_str!("hadamard4.wgsl");
/// Passes 2, 4, 6: separable box mean
pub const BOX_FILTER_SHADER: &str = include_str!("box_filter.wgsl");
/// Pass 3: (mean_I * mean_p, mean_I * mean_I)
pub const HADAMARD2_SHADER: &str = include_str!("hadamard2.wgsl");
/// Pass 5: regression coefficients (a, b)
pub const COVARIANCE_SHADER: &str = include_str!("covariance.wgsl");
/// Pass 7: a * I + b
pub const COMPOSE_SHADER: &str = include_str!("compose.wgsl");

/// One of the five programs of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Hadamard4,
    BoxFilter,
    Hadamard2,
    Covariance,
    Compose,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Hadamard4,
        StageKind::BoxFilter,
        StageKind::Hadamard2,
        StageKind::Covariance,
        StageKind::Compose,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StageKind::Hadamard4 => "hadamard4",
            StageKind::BoxFilter => "box_filter",
            StageKind::Hadamard2 => "hadamard2",
            StageKind::Covariance => "covariance",
            StageKind::Compose => "compose",
        }
    }

    /// Number of sampled inputs, in binding order
    pub fn input_count(self) -> usize {
        match self {
            StageKind::BoxFilter | StageKind::Hadamard2 => 1,
            StageKind::Hadamard4 | StageKind::Covariance | StageKind::Compose => 2,
        }
    }

    /// Whether the stage reads a `StageParams` uniform
    pub fn uses_params(self) -> bool {
        matches!(self, StageKind::BoxFilter | StageKind::Covariance)
    }

    /// Format of the colour attachment the stage renders into
    pub fn target_format(self) -> wgpu::TextureFormat {
        match self {
            StageKind::Compose => OUTPUT_FORMAT,
            _ => WORKING_FORMAT,
        }
    }

    /// Complete WGSL module: vertex stage, constants and fragment stage
    pub fn source(self) -> String {
        let fragment = match self {
            StageKind::Hadamard4 => HADAMARD4_SHADER,
            StageKind::BoxFilter => BOX_FILTER_SHADER,
            StageKind::Hadamard2 => HADAMARD2_SHADER,
            StageKind::Covariance => COVARIANCE_SHADER,
            StageKind::Compose => COMPOSE_SHADER,
        };
        format!(
            "{}\nconst MASK_COORD_SCALE: f32 = {:?};\n\n{}",
            FULLSCREEN_VERTEX, MASK_COORD_SCALE, fragment
        )
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    #[test]
    fn test_hadamard4_shader_validates() {
        validate_shader("hadamard4", &StageKind::Hadamard4.source());
    }

    #[test]
    fn test_box_filter_shader_validates() {
        validate_shader("box_filter", &StageKind::BoxFilter.source());
    }

    #[test]
    fn test_hadamard2_shader_validates() {
        validate_shader("hadamard2", &StageKind::Hadamard2.source());
    }

    #[test]
    fn test_covariance_shader_validates() {
        validate_shader("covariance", &StageKind::Covariance.source());
    }

    #[test]
    fn test_compose_shader_validates() {
        validate_shader("compose", &StageKind::Compose.source());
    }

    #[test]
    fn test_mask_scale_is_injected() {
        let source = StageKind::Hadamard4.source();
        assert!(source.contains("const MASK_COORD_SCALE: f32 = 0.99;"));
    }

    #[test]
    fn test_stage_indices_are_dense() {
        for (i, kind) in StageKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}

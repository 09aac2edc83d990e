// SPDX-License-Identifier: GPL-3.0-only

//! CPU reference implementation
//!
//! Walks the same draw plan as the GPU pipeline over `f32` planes. Sampling
//! follows wgpu's rules for clamp-to-edge samplers: nearest picks the texel
//! containing the coordinate, linear blends the four texels around it with
//! texel centres at half-integer positions. Targets are stored bottom-up
//! exactly like their GPU counterparts.
//!
//! Used as the numeric oracle for tests and as a fallback when no suitable
//! GPU is present.

use crate::config::{FilterConfig, WorkingResolution};
use crate::constants::MASK_COORD_SCALE;
use crate::errors::ConfigurationError;
use crate::pipeline::{DrawStep, Filter, Plane, Source, TargetId, draw_plan};
use crate::shaders::{StageKind, StageParams};
use image::GrayImage;
use std::time::Instant;
use tracing::debug;

/// Refined intensities, rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityPlane {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl IntensityPlane {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Intensity at (x, y), or `None` outside the plane
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Quantise to 8 bits the way an `Rgba8Unorm` target does
    pub fn to_gray_image(&self) -> GrayImage {
        let pixels = self
            .data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        GrayImage::from_raw(self.width, self.height, pixels)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }
}

/// A CPU texture with the sampler it is read through
#[derive(Debug, Clone)]
struct CpuTexture {
    width: u32,
    height: u32,
    filter: Filter,
    texels: Vec<[f32; 4]>,
}

impl CpuTexture {
    fn from_plane(plane: &Plane<'_>, filter: Filter) -> Self {
        let texels = plane
            .data()
            .iter()
            .map(|&v| [f32::from(v) / 255.0, 0.0, 0.0, 1.0])
            .collect();
        Self {
            width: plane.width(),
            height: plane.height(),
            filter,
            texels,
        }
    }

    fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, i64::from(self.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.height) - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    fn sample(&self, coord: [f32; 2]) -> [f32; 4] {
        let (w, h) = (self.width as f32, self.height as f32);
        match self.filter {
            Filter::Nearest => {
                let x = (coord[0] * w).floor() as i64;
                let y = (coord[1] * h).floor() as i64;
                self.texel(x, y)
            }
            Filter::Linear => {
                let fx = coord[0] * w - 0.5;
                let fy = coord[1] * h - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);

                let top = lerp(self.texel(x0, y0), self.texel(x0 + 1, y0), tx);
                let bottom = lerp(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), tx);
                lerp(top, bottom, ty)
            }
        }
    }
}

fn lerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

fn add(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + b[i])
}

/// Fragment coordinates of one pixel, as produced by the vertex stage
#[derive(Clone, Copy)]
struct Fragment {
    texcoord: [f32; 2],
    flipcoord: [f32; 2],
}

fn shade(
    stage: StageKind,
    inputs: &[&CpuTexture],
    params: &StageParams,
    frag: Fragment,
) -> [f32; 4] {
    match stage {
        StageKind::Hadamard4 => {
            let guide = inputs[1].sample(frag.flipcoord)[0];
            let mask_coord = frag.flipcoord.map(|c| c * MASK_COORD_SCALE);
            let mask = inputs[0].sample(mask_coord)[0];
            [guide, mask, guide * mask, guide * guide]
        }
        StageKind::BoxFilter => {
            let source = inputs[0];
            let step = if params.first_pass != 0 {
                [1.0 / source.width as f32, 0.0]
            } else {
                [0.0, 1.0 / source.height as f32]
            };
            let mut sum = source.sample(frag.texcoord);
            for i in 1..=params.radius {
                let offset = [step[0] * i as f32, step[1] * i as f32];
                let ahead = [frag.texcoord[0] + offset[0], frag.texcoord[1] + offset[1]];
                let behind = [frag.texcoord[0] - offset[0], frag.texcoord[1] - offset[1]];
                sum = add(sum, source.sample(ahead));
                sum = add(sum, source.sample(behind));
            }
            let norm = 2.0 * params.radius as f32 + 1.0;
            sum.map(|v| v / norm)
        }
        StageKind::Hadamard2 => {
            let means = inputs[0].sample(frag.texcoord);
            [means[0] * means[1], means[0] * means[0], 0.0, 0.0]
        }
        StageKind::Covariance => {
            let means = inputs[0].sample(frag.texcoord);
            let products = inputs[1].sample(frag.texcoord);
            let cov_ip = means[2] - products[0];
            let var_i = means[3] - products[1];
            let a = cov_ip / (var_i + params.epsilon);
            let b = means[1] - a * means[0];
            [a, b, 0.0, 0.0]
        }
        StageKind::Compose => {
            let coefficients = inputs[0].sample(frag.texcoord);
            let guide = inputs[1].sample(frag.flipcoord)[0];
            let q = (coefficients[0] * guide + coefficients[1]).clamp(0.0, 1.0);
            [q, q, q, q]
        }
    }
}

/// CPU guided filter with the same configuration surface as the GPU one
#[derive(Debug, Clone)]
pub struct ReferenceFilter {
    config: FilterConfig,
    working: WorkingResolution,
    plan: Vec<DrawStep>,
}

impl ReferenceFilter {
    pub fn new(config: FilterConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            working: config.working_resolution(),
            plan: draw_plan(&config),
        })
    }

    pub fn configure(
        &mut self,
        radius: u32,
        epsilon: f32,
        width: u32,
        height: u32,
    ) -> Result<(), ConfigurationError> {
        let config = self.config.with_parameters(radius, epsilon, width, height);
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn working_resolution(&self) -> WorkingResolution {
        self.working
    }

    /// Filter `mask` guided by `guide`; the result has the configured size
    pub fn apply(&self, guide: &Plane<'_>, mask: &Plane<'_>) -> IntensityPlane {
        let targets = self.run(guide, mask);
        Self::read_channel(&targets[TargetId::Output.index()], 0)
    }

    /// Averaged (a, b) at output resolution, top-down
    pub fn coefficients(
        &self,
        guide: &Plane<'_>,
        mask: &Plane<'_>,
    ) -> (IntensityPlane, IntensityPlane) {
        let targets = self.run(guide, mask);
        let smoothed = &targets[TargetId::SmoothedCoefficients.index()];
        (Self::read_channel(smoothed, 0), Self::read_channel(smoothed, 1))
    }

    fn run(&self, guide: &Plane<'_>, mask: &Plane<'_>) -> Vec<CpuTexture> {
        let start = Instant::now();
        let mask_texture = CpuTexture::from_plane(mask, Filter::Nearest);
        let guide_texture = CpuTexture::from_plane(guide, Filter::Linear);

        let mut targets: Vec<CpuTexture> = TargetId::ALL
            .iter()
            .map(|id| {
                let spec = id.spec();
                let (width, height) = spec.resolution.extent(&self.config, &self.working);
                CpuTexture {
                    width,
                    height,
                    filter: spec.filter,
                    texels: vec![[0.0; 4]; (width * height) as usize],
                }
            })
            .collect();

        for step in &self.plan {
            let texels = {
                let inputs: Vec<&CpuTexture> = step
                    .inputs
                    .iter()
                    .map(|source| match source {
                        Source::Mask => &mask_texture,
                        Source::Guide => &guide_texture,
                        Source::Target(id) => &targets[id.index()],
                    })
                    .collect();
                let params = step
                    .params
                    .map(|slot| slot.values(&self.config, &self.working))
                    .unwrap_or_else(bytemuck::Zeroable::zeroed);
                let (width, height) = step.viewport.extent(&self.config, &self.working);
                render(step.stage, &inputs, &params, width, height)
            };
            targets[step.target.index()].texels = texels;
        }

        debug!(
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            width = self.config.width,
            height = self.config.height,
            "Reference guided filter time"
        );
        targets
    }

    /// One channel of a bottom-up target, returned top-down
    fn read_channel(texture: &CpuTexture, channel: usize) -> IntensityPlane {
        let (width, height) = (texture.width as usize, texture.height as usize);
        let mut data = Vec::with_capacity(width * height);
        for row in texture.texels.chunks(width).rev() {
            data.extend(row.iter().map(|t| t[channel]));
        }
        debug_assert_eq!(data.len(), width * height);
        IntensityPlane {
            width: texture.width,
            height: texture.height,
            data,
        }
    }
}

fn render(
    stage: StageKind,
    inputs: &[&CpuTexture],
    params: &StageParams,
    width: u32,
    height: u32,
) -> Vec<[f32; 4]> {
    let mut texels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let v = (y as f32 + 0.5) / height as f32;
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let frag = Fragment {
                texcoord: [u, v],
                flipcoord: [u, 1.0 - v],
            };
            texels.push(shade(stage, inputs, params, frag));
        }
    }
    texels
}

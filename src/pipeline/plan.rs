// SPDX-License-Identifier: GPL-3.0-only

//! The fixed draw order of the filter
//!
//! Each logical pass becomes one draw, or two for the separable box filter.
//! The plan is plain data so both the GPU pipeline and the CPU reference
//! walk exactly the same sequence.

use super::store::{Resolution, TargetId};
use crate::config::{FilterConfig, WorkingResolution};
use crate::shaders::{BoxAxis, StageKind, StageParams};

/// The seven logical passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Hadamard4,
    MeanBox,
    Hadamard2,
    ProductBox,
    Covariance,
    CoefficientBox,
    Compose,
}

impl Pass {
    pub fn label(self) -> &'static str {
        match self {
            Pass::Hadamard4 => "hadamard4 pass",
            Pass::MeanBox => "mean box pass",
            Pass::Hadamard2 => "hadamard2 pass",
            Pass::ProductBox => "product box pass",
            Pass::Covariance => "covariance pass",
            Pass::CoefficientBox => "coefficient box pass",
            Pass::Compose => "compose pass",
        }
    }
}

/// Where a draw reads one of its inputs from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Mask,
    Guide,
    Target(TargetId),
}

/// Uniform buffer a draw binds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSlot {
    Box(BoxAxis),
    Covariance,
}

impl ParamSlot {
    pub const ALL: [ParamSlot; 3] = [
        ParamSlot::Box(BoxAxis::Horizontal),
        ParamSlot::Box(BoxAxis::Vertical),
        ParamSlot::Covariance,
    ];

    /// Uniform contents under a configuration
    pub fn values(self, config: &FilterConfig, working: &WorkingResolution) -> StageParams {
        match self {
            ParamSlot::Box(axis) => StageParams::box_filter(working.radius, axis),
            ParamSlot::Covariance => StageParams::covariance(config.epsilon),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ParamSlot::Box(BoxAxis::Horizontal) => 0,
            ParamSlot::Box(BoxAxis::Vertical) => 1,
            ParamSlot::Covariance => 2,
        }
    }
}

/// One full-screen draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStep {
    pub pass: Pass,
    pub stage: StageKind,
    pub target: TargetId,
    /// Inputs in binding order
    pub inputs: &'static [Source],
    pub params: Option<ParamSlot>,
    pub viewport: Resolution,
}

impl DrawStep {
    fn new(pass: Pass, stage: StageKind, target: TargetId, inputs: &'static [Source]) -> Self {
        Self {
            pass,
            stage,
            target,
            inputs,
            params: None,
            viewport: target.spec().resolution,
        }
    }

    fn with_params(mut self, slot: ParamSlot) -> Self {
        self.params = Some(slot);
        self
    }
}

/// Horizontal then vertical box sub-passes from `source` into `target`
fn box_filter(pass: Pass, source: &'static [Source], target: TargetId) -> [DrawStep; 2] {
    [
        DrawStep::new(pass, StageKind::BoxFilter, TargetId::PingPong, source)
            .with_params(ParamSlot::Box(BoxAxis::Horizontal)),
        DrawStep::new(
            pass,
            StageKind::BoxFilter,
            target,
            &[Source::Target(TargetId::PingPong)],
        )
        .with_params(ParamSlot::Box(BoxAxis::Vertical)),
    ]
}

/// Draws for one `apply`, in submission order.
///
/// The product box pass runs only with `smooth_mean_products`. Covariance
/// subtracts mean_I * mean_p from mean_Ip of the same window; smoothing the
/// product again mixes in neighbouring windows, so near a guide edge a
/// uniform mask no longer yields zero covariance and the output picks up
/// the edge. Without it the plan is eight draws, with it ten.
pub fn draw_plan(config: &FilterConfig) -> Vec<DrawStep> {
    let mut plan = Vec::with_capacity(10);

    plan.push(DrawStep::new(
        Pass::Hadamard4,
        StageKind::Hadamard4,
        TargetId::Products,
        &[Source::Mask, Source::Guide],
    ));
    plan.extend(box_filter(
        Pass::MeanBox,
        &[Source::Target(TargetId::Products)],
        TargetId::Means,
    ));
    plan.push(DrawStep::new(
        Pass::Hadamard2,
        StageKind::Hadamard2,
        TargetId::MeanProducts,
        &[Source::Target(TargetId::Means)],
    ));
    if config.smooth_mean_products {
        plan.extend(box_filter(
            Pass::ProductBox,
            &[Source::Target(TargetId::MeanProducts)],
            TargetId::MeanProducts,
        ));
    }
    plan.push(
        DrawStep::new(
            Pass::Covariance,
            StageKind::Covariance,
            TargetId::Coefficients,
            &[
                Source::Target(TargetId::Means),
                Source::Target(TargetId::MeanProducts),
            ],
        )
        .with_params(ParamSlot::Covariance),
    );
    plan.extend(box_filter(
        Pass::CoefficientBox,
        &[Source::Target(TargetId::Coefficients)],
        TargetId::SmoothedCoefficients,
    ));
    plan.push(DrawStep::new(
        Pass::Compose,
        StageKind::Compose,
        TargetId::Output,
        &[
            Source::Target(TargetId::SmoothedCoefficients),
            Source::Guide,
        ],
    ));

    plan
}

// SPDX-License-Identifier: GPL-3.0-only

//! GPU guided filter pipeline
//!
//! [`GuidedFilterPipeline`] owns the compiled stage programs, the render
//! targets of the current [`FilterConfig`] and the uniform buffers of the
//! parameterised stages. `configure` rebuilds targets and uniforms; `apply`
//! uploads a guide/mask pair and records the whole draw plan into a single
//! command encoder, so queue ordering is the only synchronisation between
//! passes.
//!
//! A pipeline is not reentrant: `apply` takes `&mut self` and the returned
//! [`FilterOutput`] borrows the pipeline until it is dropped.

mod inputs;
mod output;
mod plan;
mod store;

pub use inputs::{CachedDimensions, InputStrategy, Plane};
pub use output::FilterOutput;
pub use plan::{DrawStep, ParamSlot, Pass, Source, draw_plan};
pub use store::{Filter, Resolution, TargetId, TargetSpec};

use crate::config::{FilterConfig, WorkingResolution};
use crate::errors::{ConfigurationError, FilterError, FilterResult, GpuError};
use crate::gpu::{GpuContext, error_scoped, wgpu};
use crate::shaders::{StageInput, StageParams, StagePrograms};
use inputs::InputTextures;
use std::time::Instant;
use store::{RenderTargets, draw_fullscreen};
use tracing::{debug, info, warn};

/// Per-configuration GPU resources
struct PipelineResources {
    targets: RenderTargets,
    params: [wgpu::Buffer; 3],
}

impl PipelineResources {
    fn allocate(ctx: &GpuContext, config: &FilterConfig, working: &WorkingResolution) -> Self {
        let targets = RenderTargets::allocate(&ctx.device, config, working);
        let params = ParamSlot::ALL.map(|slot| {
            let values = slot.values(config, working);
            let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("guided-filter stage params"),
                size: std::mem::size_of::<StageParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            ctx.queue.write_buffer(&buffer, 0, bytemuck::bytes_of(&values));
            buffer
        });

        Self { targets, params }
    }

    fn params(&self, slot: ParamSlot) -> &wgpu::Buffer {
        &self.params[slot.index()]
    }
}

/// Guided filter bound to one GPU context
pub struct GuidedFilterPipeline {
    ctx: GpuContext,
    programs: StagePrograms,
    max_texture_dimension: u32,
    config: FilterConfig,
    working: WorkingResolution,
    plan: Vec<DrawStep>,
    resources: Option<PipelineResources>,
    inputs: InputTextures,
}

impl GuidedFilterPipeline {
    /// Build a pipeline with the default configuration.
    ///
    /// Fails with a capability error if the device cannot render to or
    /// linearly filter 32-bit float textures.
    pub fn new(ctx: GpuContext) -> FilterResult<Self> {
        Self::with_config(ctx, FilterConfig::default())
    }

    /// Build a pipeline and configure it with `config`
    pub fn with_config(ctx: GpuContext, config: FilterConfig) -> FilterResult<Self> {
        let capabilities = ctx.capabilities();
        if let Err(e) = capabilities.require() {
            warn!(
                adapter = %ctx.info.adapter_name,
                error = %e,
                "Guided filter unavailable on this device"
            );
            return Err(e.into());
        }

        let programs = StagePrograms::new(&ctx.device);
        let working = config.working_resolution();

        let mut pipeline = Self {
            ctx,
            programs,
            max_texture_dimension: capabilities.max_texture_dimension,
            config,
            working,
            plan: Vec::new(),
            resources: None,
            inputs: InputTextures::new(InputStrategy::default()),
        };
        pipeline.configure_with(config)?;
        Ok(pipeline)
    }

    /// Change radius, epsilon and output size, keeping the subsample settings
    pub fn configure(
        &mut self,
        radius: u32,
        epsilon: f32,
        width: u32,
        height: u32,
    ) -> FilterResult<()> {
        let config = self.config.with_parameters(radius, epsilon, width, height);
        self.configure_with(config)
    }

    /// Validate `config` and rebuild every render target and uniform.
    ///
    /// Invalid parameters are rejected before anything is allocated and the
    /// previous configuration stays in effect.
    pub fn configure_with(&mut self, config: FilterConfig) -> FilterResult<()> {
        config.validate()?;
        config.check_device_limit(self.max_texture_dimension)?;
        if let Some(reason) = self.ctx.lost_reason() {
            self.invalidate();
            return Err(GpuError::DeviceLost(reason).into());
        }

        let working = config.working_resolution();
        let resources = match error_scoped(&self.ctx.device, || {
            PipelineResources::allocate(&self.ctx, &config, &working)
        }) {
            Ok(resources) => resources,
            Err(e) => {
                warn!(error = %e, "Guided filter allocation failed; resources invalidated");
                self.invalidate();
                return Err(e.into());
            }
        };

        self.config = config;
        self.working = working;
        self.plan = draw_plan(&config);
        self.resources = Some(resources);

        info!(
            radius = config.radius,
            epsilon = config.epsilon,
            width = config.width,
            height = config.height,
            working_width = working.width,
            working_height = working.height,
            working_radius = working.radius,
            draws = self.plan.len(),
            "Guided filter configured"
        );
        Ok(())
    }

    /// Run every pass on a guide/mask pair.
    ///
    /// The output always has the configured size; the mask may have any
    /// size and is resampled by the first pass. Planes larger than the
    /// device texture limit are rejected before anything is uploaded and
    /// leave the pipeline usable.
    pub fn apply(
        &mut self,
        guide: &Plane<'_>,
        mask: &Plane<'_>,
    ) -> FilterResult<FilterOutput<'_>> {
        self.check_inputs(guide, mask)?;
        let start = Instant::now();

        if let Err(e) = self.encode_and_submit(guide, mask) {
            if matches!(
                e,
                FilterError::Gpu(
                    GpuError::DeviceLost(_) | GpuError::Validation(_) | GpuError::OutOfMemory(_)
                )
            ) {
                warn!(error = %e, "Guided filter failed; resources invalidated");
                self.invalidate();
            }
            return Err(e);
        }

        debug!(
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            guide_width = guide.width(),
            guide_height = guide.height(),
            mask_width = mask.width(),
            mask_height = mask.height(),
            "Guided filter time"
        );

        let resources = self
            .resources
            .as_ref()
            .ok_or(GpuError::ResourcesInvalidated)?;
        Ok(FilterOutput::new(
            &self.ctx,
            &resources.targets[TargetId::Output],
        ))
    }

    /// Input planes must fit the device texture limit
    fn check_inputs(&self, guide: &Plane<'_>, mask: &Plane<'_>) -> Result<(), ConfigurationError> {
        guide.check_device_limit(self.max_texture_dimension)?;
        mask.check_device_limit(self.max_texture_dimension)
    }

    fn encode_and_submit(&mut self, guide: &Plane<'_>, mask: &Plane<'_>) -> FilterResult<()> {
        if let Some(reason) = self.ctx.lost_reason() {
            return Err(GpuError::DeviceLost(reason).into());
        }
        let resources = self
            .resources
            .as_ref()
            .ok_or(GpuError::ResourcesInvalidated)?;

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        let inputs = &mut self.inputs;
        let plan = &self.plan;
        let programs = &self.programs;
        let (config, working) = (&self.config, &self.working);

        error_scoped(device, || {
            let (mask_texture, guide_texture) = inputs.upload(device, queue, mask, guide);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("guided-filter encoder"),
            });

            for step in plan {
                let stage = programs.get(step.stage);
                let stage_inputs: Vec<StageInput<'_>> = step
                    .inputs
                    .iter()
                    .map(|source| match source {
                        Source::Mask => mask_texture.as_input(),
                        Source::Guide => guide_texture.as_input(),
                        Source::Target(id) => resources.targets[*id].as_input(),
                    })
                    .collect();
                let params = step.params.map(|slot| resources.params(slot));
                let bind_group = stage.bind_group(device, &stage_inputs, params);
                let viewport = step.viewport.extent(config, working);

                draw_fullscreen(
                    &mut encoder,
                    step.pass.label(),
                    stage,
                    &bind_group,
                    &resources.targets[step.target],
                    viewport,
                );
            }

            queue.submit(std::iter::once(encoder.finish()));
        })?;

        if let Some(reason) = self.ctx.lost_reason() {
            return Err(GpuError::DeviceLost(reason).into());
        }
        Ok(())
    }

    /// Drop all per-configuration resources until the next `configure`
    fn invalidate(&mut self) {
        self.resources = None;
        self.inputs.clear();
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn working_resolution(&self) -> WorkingResolution {
        self.working
    }

    /// Draws issued by each `apply` under the current configuration
    pub fn plan(&self) -> &[DrawStep] {
        &self.plan
    }

    pub fn input_strategy(&self) -> InputStrategy {
        self.inputs.strategy()
    }

    /// Switch between fresh and pooled input textures
    pub fn set_input_strategy(&mut self, strategy: InputStrategy) {
        self.inputs.set_strategy(strategy);
    }

    /// False after a GPU failure until the next successful `configure`
    pub fn is_ready(&self) -> bool {
        self.resources.is_some() && self.ctx.lost_reason().is_none()
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}

impl std::fmt::Debug for GuidedFilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidedFilterPipeline")
            .field("config", &self.config)
            .field("working", &self.working)
            .field("ready", &self.is_ready())
            .finish()
    }
}

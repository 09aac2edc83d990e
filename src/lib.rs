// SPDX-License-Identifier: GPL-3.0-only

//! Guided Filter - edge-aware mask refinement on the GPU
//!
//! Refines a coarse mask (for example a segmentation alpha channel) so that
//! it follows the edges of a full-resolution guide image. The filter runs as
//! a fixed sequence of full-screen render passes on wgpu, with the
//! statistics passes at a reduced working resolution.
//!
//! # Architecture
//!
//! - [`gpu`]: device creation and capability checks
//! - [`shaders`]: the five WGSL stage programs
//! - [`pipeline`]: render targets, draw plan and [`GuidedFilterPipeline`]
//! - [`reference`]: CPU implementation of the same draw plan
//! - [`config`]: [`FilterConfig`] and the derived working resolution
//!
//! # Example
//!
//! ```ignore
//! let ctx = GpuContext::new_blocking("guided-filter")?;
//! let mut filter = GuidedFilterPipeline::new(ctx)?;
//! let output = filter.apply(&guide, &mask)?;
//! let refined = output.read_intensity_blocking()?;
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod pipeline;
pub mod reference;
pub mod shaders;

// Re-export commonly used types
pub use config::{ConfigFile, FilterConfig, WorkingResolution};
pub use errors::{CapabilityError, ConfigurationError, FilterError, FilterResult, GpuError};
pub use gpu::{FilterCapabilities, GpuContext};
pub use pipeline::{FilterOutput, GuidedFilterPipeline, InputStrategy, Plane};
pub use reference::{IntensityPlane, ReferenceFilter};

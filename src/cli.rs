// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - `refine`: run the filter on image files
//! - `info`: report the adapter and its float-texture support

use clap::{Args, ValueEnum};
use guided_filter::{
    ConfigFile, FilterConfig, GpuContext, GuidedFilterPipeline, InputStrategy, Plane, ReferenceFilter,
};
use image::GrayImage;
use std::path::PathBuf;
use std::time::Instant;

/// Which channel of the mask image holds the mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MaskChannel {
    /// Alpha channel (segmentation output with transparency)
    Alpha,
    /// Grayscale value
    Luma,
}

#[derive(Debug, Args)]
pub struct RefineArgs {
    /// Guide image; its luminance steers the filter
    #[arg(short, long)]
    guide: PathBuf,

    /// Mask image to refine
    #[arg(short, long)]
    mask: PathBuf,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,

    /// JSON filter configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window half-width in output pixels
    #[arg(short, long)]
    radius: Option<u32>,

    /// Variance regulariser
    #[arg(short, long)]
    epsilon: Option<f32>,

    /// Output width (default: guide width)
    #[arg(long)]
    width: Option<u32>,

    /// Output height (default: guide height)
    #[arg(long)]
    height: Option<u32>,

    /// Working resolution divisor for radius >= 4
    #[arg(long)]
    subsample: Option<u32>,

    /// Mask channel to read
    #[arg(long, value_enum, default_value_t = MaskChannel::Alpha)]
    mask_channel: MaskChannel,

    /// Reuse input textures between runs
    #[arg(long)]
    pooled: bool,

    /// Run the CPU implementation instead of the GPU
    #[arg(long)]
    cpu: bool,

    /// Box-filter the mean products before the covariance pass
    #[arg(long)]
    smooth_products: bool,
}

impl RefineArgs {
    /// Merge flags, config file and guide size into one configuration.
    ///
    /// Each field comes from the first of: flag, config file key, fallback.
    /// The output size falls back to the guide size, everything else to
    /// the filter defaults.
    fn filter_config(
        &self,
        guide_width: u32,
        guide_height: u32,
    ) -> Result<FilterConfig, Box<dyn std::error::Error>> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        let fallback = FilterConfig {
            width: guide_width,
            height: guide_height,
            ..FilterConfig::default()
        };
        let base = file.resolve(&fallback);

        let config = FilterConfig {
            radius: self.radius.unwrap_or(base.radius),
            epsilon: self.epsilon.unwrap_or(base.epsilon),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            subsample_factor: self.subsample.unwrap_or(base.subsample_factor),
            smooth_mean_products: self.smooth_products || base.smooth_mean_products,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Refine a mask image and save the result
pub fn refine(args: RefineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let guide_image = image::open(&args.guide)?;
    let mask_image = image::open(&args.mask)?;
    let config = args.filter_config(guide_image.width(), guide_image.height())?;

    let guide = Plane::luminance_of(&guide_image)?;
    let mask = match args.mask_channel {
        MaskChannel::Alpha => Plane::alpha_of(&mask_image)?,
        MaskChannel::Luma => Plane::luma_of(&mask_image)?,
    };

    println!(
        "Guide {}x{}, mask {}x{} -> output {}x{}",
        guide.width(),
        guide.height(),
        mask.width(),
        mask.height(),
        config.width,
        config.height
    );

    let start = Instant::now();
    let refined = if args.cpu {
        run_reference(config, &guide, &mask)?
    } else {
        run_gpu(config, &guide, &mask, args.pooled)?
    };
    println!("Filtered in {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);

    refined.save(&args.output)?;
    println!("Refined mask saved: {}", args.output.display());
    Ok(())
}

fn run_gpu(
    config: FilterConfig,
    guide: &Plane<'_>,
    mask: &Plane<'_>,
    pooled: bool,
) -> Result<GrayImage, Box<dyn std::error::Error>> {
    let ctx = GpuContext::new_blocking("guided-filter")?;
    println!("Using adapter: {} ({:?})", ctx.info.adapter_name, ctx.info.backend);

    let mut pipeline = GuidedFilterPipeline::with_config(ctx, config)
        .map_err(|e| format!("{} (use --cpu to run without a capable GPU)", e))?;
    if pooled {
        pipeline.set_input_strategy(InputStrategy::Pooled);
    }

    let output = pipeline.apply(guide, mask)?;
    Ok(output.read_intensity_blocking()?)
}

fn run_reference(
    config: FilterConfig,
    guide: &Plane<'_>,
    mask: &Plane<'_>,
) -> Result<GrayImage, Box<dyn std::error::Error>> {
    println!("Using CPU reference filter");
    let filter = ReferenceFilter::new(config)?;
    Ok(filter.apply(guide, mask).to_gray_image())
}

/// Print the adapter and its capabilities
pub fn info() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = GpuContext::new_blocking("guided-filter info")?;
    let caps = ctx.capabilities();

    println!("Adapter:     {}", ctx.info.adapter_name);
    println!("Backend:     {:?}", ctx.info.backend);
    println!("Device type: {:?}", ctx.info.device_type);
    println!();
    println!("Float32 filterable feature: {}", yes_no(caps.float32_filterable));
    println!("Rgba32Float renderable:     {}", yes_no(caps.working_format_renderable));
    println!("Rgba32Float filterable:     {}", yes_no(caps.working_format_filterable));
    println!("Max texture dimension:      {}", caps.max_texture_dimension);
    println!();

    match caps.require() {
        Ok(()) => println!("Guided filter: supported"),
        Err(e) => println!("Guided filter: unavailable ({})", e),
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(config: Option<PathBuf>) -> RefineArgs {
        RefineArgs {
            guide: PathBuf::from("guide.png"),
            mask: PathBuf::from("mask.png"),
            output: PathBuf::from("out.png"),
            config,
            radius: None,
            epsilon: None,
            width: None,
            height: None,
            subsample: None,
            mask_channel: MaskChannel::Alpha,
            pooled: false,
            cpu: false,
            smooth_products: false,
        }
    }

    fn write_config(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.json", name, std::process::id()));
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_size_defaults_to_guide_without_config() {
        let config = args(None).filter_config(1920, 1080).unwrap();
        assert_eq!((config.width, config.height), (1920, 1080));
        assert_eq!(config.radius, FilterConfig::default().radius);
    }

    #[test]
    fn test_config_without_size_uses_guide_size() {
        let path = write_config("guided-filter-cli-radius", r#"{ "radius": 8 }"#);
        let result = args(Some(path.clone())).filter_config(1920, 1080);
        std::fs::remove_file(&path).ok();

        let config = result.unwrap();
        assert_eq!(config.radius, 8);
        assert_eq!((config.width, config.height), (1920, 1080));
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = write_config(
            "guided-filter-cli-size",
            r#"{ "radius": 8, "width": 640, "height": 480 }"#,
        );
        let mut args = args(Some(path.clone()));
        args.radius = Some(12);
        args.height = Some(360);
        let result = args.filter_config(1920, 1080);
        std::fs::remove_file(&path).ok();

        let config = result.unwrap();
        assert_eq!(config.radius, 12);
        assert_eq!((config.width, config.height), (640, 360));
    }

    #[test]
    fn test_smooth_products_flag_enables_pass() {
        assert!(!args(None).filter_config(64, 64).unwrap().smooth_mean_products);

        let mut args = args(None);
        args.smooth_products = true;
        assert!(args.filter_config(64, 64).unwrap().smooth_mean_products);
    }
}

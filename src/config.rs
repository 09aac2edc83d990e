// SPDX-License-Identifier: GPL-3.0-only

//! Filter configuration and the derived working resolution

use crate::constants::{
    DEFAULT_EPSILON, DEFAULT_HEIGHT, DEFAULT_RADIUS, DEFAULT_SUBSAMPLE_FACTOR, DEFAULT_WIDTH,
    SUBSAMPLE_MIN_RADIUS,
};
use crate::errors::{ConfigurationError, FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Guided filter parameters
///
/// `width`/`height` are the output (guide) resolution. The statistics passes
/// run at [`working_resolution`](Self::working_resolution), which is smaller
/// by `subsample_factor` once the radius is large enough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Smoothing window half-width in full-resolution pixels
    pub radius: u32,
    /// Regularisation against vanishing local variance
    pub epsilon: f32,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Downsampling factor for the statistics passes
    pub subsample_factor: u32,
    /// Box-filter the Hadamard-2 products before the covariance pass.
    ///
    /// Off by default: the covariance pass then sees mean_I * mean_p of the
    /// same window as mean_Ip, so a uniform mask stays uniform. Enabling it
    /// adds the two extra box sub-passes of the seven-pass layout.
    pub smooth_mean_products: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            epsilon: DEFAULT_EPSILON,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            subsample_factor: DEFAULT_SUBSAMPLE_FACTOR,
            smooth_mean_products: false,
        }
    }
}

/// Contents of a JSON config file.
///
/// Every field is optional so callers can tell an absent key from a default
/// value and fill the gap from their own fallback (e.g. the guide size).
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ConfigFile {
    pub radius: Option<u32>,
    pub epsilon: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub subsample_factor: Option<u32>,
    pub smooth_mean_products: Option<bool>,
}

impl ConfigFile {
    /// Read and parse a config file without validating it
    pub fn load(path: impl AsRef<Path>) -> FilterResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::parse(&text)?)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Fill absent fields from `base`
    pub fn resolve(&self, base: &FilterConfig) -> FilterConfig {
        FilterConfig {
            radius: self.radius.unwrap_or(base.radius),
            epsilon: self.epsilon.unwrap_or(base.epsilon),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            subsample_factor: self.subsample_factor.unwrap_or(base.subsample_factor),
            smooth_mean_products: self.smooth_mean_products.unwrap_or(base.smooth_mean_products),
        }
    }
}

/// Resolution and radius used by the sub-resolution passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingResolution {
    pub width: u32,
    pub height: u32,
    pub radius: u32,
}

impl WorkingResolution {
    /// True when the statistics passes run below output resolution
    pub fn is_subsampled(&self, config: &FilterConfig) -> bool {
        self.width != config.width || self.height != config.height
    }
}

impl FilterConfig {
    /// Build a config with the default subsample factor
    pub fn new(radius: u32, epsilon: f32, width: u32, height: u32) -> Self {
        Self {
            radius,
            epsilon,
            width,
            height,
            ..Self::default()
        }
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> FilterResult<Self> {
        let config = ConfigFile::load(path)?.resolve(&Self::default());
        config.validate().map_err(FilterError::from)?;
        Ok(config)
    }

    /// Copy with new radius/epsilon/size, keeping the subsample settings
    pub fn with_parameters(&self, radius: u32, epsilon: f32, width: u32, height: u32) -> Self {
        Self {
            radius,
            epsilon,
            width,
            height,
            ..*self
        }
    }

    /// Check every parameter before anything is allocated
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.radius == 0 {
            return Err(ConfigurationError::NonPositiveRadius);
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigurationError::NonPositiveEpsilon(self.epsilon));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigurationError::NonPositiveDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.subsample_factor == 0 {
            return Err(ConfigurationError::NonPositiveSubsample);
        }

        let working = self.working_resolution();
        if working.width == 0 || working.height == 0 || working.radius == 0 {
            return Err(ConfigurationError::DegenerateSubResolution {
                width: self.width,
                height: self.height,
                subsample_factor: self.subsample_factor,
            });
        }

        Ok(())
    }

    /// Sub-resolution and sub-radius for the statistics passes.
    ///
    /// Radii below [`SUBSAMPLE_MIN_RADIUS`] keep full resolution; otherwise
    /// all three values are divided by the subsample factor, truncating.
    pub fn working_resolution(&self) -> WorkingResolution {
        if self.radius < SUBSAMPLE_MIN_RADIUS || self.subsample_factor == 0 {
            WorkingResolution {
                width: self.width,
                height: self.height,
                radius: self.radius,
            }
        } else {
            WorkingResolution {
                width: self.width / self.subsample_factor,
                height: self.height / self.subsample_factor,
                radius: self.radius / self.subsample_factor,
            }
        }
    }

    /// Reject sizes the device cannot allocate
    pub fn check_device_limit(&self, max_dimension: u32) -> Result<(), ConfigurationError> {
        if self.width > max_dimension || self.height > max_dimension {
            return Err(ConfigurationError::ExceedsDeviceLimit {
                width: self.width,
                height: self.height,
                max: max_dimension,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_radius_keeps_full_resolution() {
        let config = FilterConfig::new(2, 1e-6, 513, 513);
        let working = config.working_resolution();
        assert_eq!(
            working,
            WorkingResolution {
                width: 513,
                height: 513,
                radius: 2
            }
        );
        assert!(!working.is_subsampled(&config));
    }

    #[test]
    fn test_default_radius_subsamples() {
        let config = FilterConfig::default();
        let working = config.working_resolution();
        assert_eq!(
            working,
            WorkingResolution {
                width: 128,
                height: 128,
                radius: 4
            }
        );
        assert!(working.is_subsampled(&config));
    }

    #[test]
    fn test_threshold_radius_subsamples() {
        let working = FilterConfig::new(4, 1e-6, 640, 480).working_resolution();
        assert_eq!((working.width, working.height, working.radius), (160, 120, 1));

        let working = FilterConfig::new(3, 1e-6, 640, 480).working_resolution();
        assert_eq!((working.width, working.height, working.radius), (640, 480, 3));
    }

    #[test]
    fn test_validate_rejects_zero_radius() {
        let config = FilterConfig::new(0, 1e-6, 64, 64);
        assert_eq!(config.validate(), Err(ConfigurationError::NonPositiveRadius));
    }

    #[test]
    fn test_validate_rejects_bad_epsilon() {
        for eps in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = FilterConfig::new(8, eps, 64, 64);
            assert!(matches!(
                config.validate(),
                Err(ConfigurationError::NonPositiveEpsilon(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let config = FilterConfig::new(8, 1e-6, 0, 64);
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::NonPositiveDimensions {
                width: 0,
                height: 64
            })
        );
    }

    #[test]
    fn test_validate_rejects_degenerate_subsampling() {
        // 3 / 4 truncates to zero
        let config = FilterConfig::new(16, 1e-6, 3, 64);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::DegenerateSubResolution { .. })
        ));
    }

    #[test]
    fn test_with_parameters_keeps_subsample_settings() {
        let base = FilterConfig {
            subsample_factor: 2,
            smooth_mean_products: true,
            ..FilterConfig::default()
        };
        let next = base.with_parameters(8, 1e-3, 100, 50);
        assert_eq!(next.subsample_factor, 2);
        assert!(next.smooth_mean_products);
        assert_eq!(next.working_resolution().width, 50);
    }

    #[test]
    fn test_device_limit() {
        let config = FilterConfig::new(8, 1e-6, 4096, 100);
        assert!(config.check_device_limit(8192).is_ok());
        assert!(matches!(
            config.check_device_limit(2048),
            Err(ConfigurationError::ExceedsDeviceLimit { max: 2048, .. })
        ));
    }

    #[test]
    fn test_config_file_keeps_absent_size_open() {
        let file = ConfigFile::parse(r#"{ "radius": 8 }"#).unwrap();
        assert_eq!(file.radius, Some(8));
        assert_eq!((file.width, file.height), (None, None));

        let base = FilterConfig::new(16, 1e-6, 1920, 1080);
        let config = file.resolve(&base);
        assert_eq!(config.radius, 8);
        assert_eq!((config.width, config.height), (1920, 1080));
    }

    #[test]
    fn test_config_file_parse_error() {
        assert!(matches!(
            ConfigFile::parse("radius = 8"),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{ "radius": 8 }"#).unwrap();
        assert_eq!(config.radius, 8);
        assert_eq!(config.width, DEFAULT_WIDTH);
        assert!(!config.smooth_mean_products);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the guided filter

use crate::gpu::wgpu;
use std::fmt;

/// Result type alias using FilterError
pub type FilterResult<T> = Result<T, FilterError>;

/// Top-level error type
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The device cannot run the pipeline at all
    Capability(CapabilityError),
    /// Rejected parameters or inputs; nothing was allocated
    Configuration(ConfigurationError),
    /// Fatal failure while the pipeline was running on the GPU
    Gpu(GpuError),
    /// File or image I/O
    Io(String),
}

/// Missing device features; raised when the pipeline is constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// No GPU adapter was found
    NoAdapter,
    /// The adapter refused to create a device
    DeviceRequest(String),
    /// A required device feature is not enabled
    MissingFeature(&'static str),
    /// A texture format lacks a capability the passes rely on
    FormatUnsupported {
        format: &'static str,
        missing: &'static str,
    },
}

/// Invalid filter parameters or input planes
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Radius must be at least 1
    NonPositiveRadius,
    /// Epsilon must be finite and greater than zero
    NonPositiveEpsilon(f32),
    /// Output dimensions must be at least 1x1
    NonPositiveDimensions { width: u32, height: u32 },
    /// Subsample factor must be at least 1
    NonPositiveSubsample,
    /// Subsampling would shrink the working resolution to nothing
    DegenerateSubResolution {
        width: u32,
        height: u32,
        subsample_factor: u32,
    },
    /// A render target would exceed the device's texture size limit
    ExceedsDeviceLimit { width: u32, height: u32, max: u32 },
    /// Plane data does not match its declared dimensions
    InvalidPlane {
        width: u32,
        height: u32,
        len: usize,
    },
    /// A configuration file could not be parsed
    Parse(String),
}

/// GPU failures surfaced from `apply` or readback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The device was lost; the pipeline must be rebuilt
    DeviceLost(String),
    /// wgpu reported a validation error inside the pass sequence
    Validation(String),
    /// Allocation failed on the device
    OutOfMemory(String),
    /// A previous failure left the render targets unusable
    ResourcesInvalidated,
    /// Mapping the readback buffer failed
    Readback(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Capability(e) => write!(f, "Capability error: {}", e),
            FilterError::Configuration(e) => write!(f, "Configuration error: {}", e),
            FilterError::Gpu(e) => write!(f, "GPU error: {}", e),
            FilterError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::NoAdapter => write!(f, "No suitable GPU adapter found"),
            CapabilityError::DeviceRequest(msg) => write!(f, "Device request failed: {}", msg),
            CapabilityError::MissingFeature(feature) => {
                write!(f, "Required feature not supported: {}", feature)
            }
            CapabilityError::FormatUnsupported { format, missing } => {
                write!(f, "Texture format {} does not support {}", format, missing)
            }
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::NonPositiveRadius => write!(f, "Radius must be positive"),
            ConfigurationError::NonPositiveEpsilon(eps) => {
                write!(f, "Epsilon must be positive, got {}", eps)
            }
            ConfigurationError::NonPositiveDimensions { width, height } => {
                write!(f, "Dimensions must be positive, got {}x{}", width, height)
            }
            ConfigurationError::NonPositiveSubsample => {
                write!(f, "Subsample factor must be positive")
            }
            ConfigurationError::DegenerateSubResolution {
                width,
                height,
                subsample_factor,
            } => write!(
                f,
                "{}x{} subsampled by {} leaves an empty working resolution",
                width, height, subsample_factor
            ),
            ConfigurationError::ExceedsDeviceLimit { width, height, max } => write!(
                f,
                "{}x{} exceeds the device texture limit of {}",
                width, height, max
            ),
            ConfigurationError::InvalidPlane { width, height, len } => write!(
                f,
                "Plane of {}x{} needs {} bytes, got {}",
                width,
                height,
                *width as usize * *height as usize,
                len
            ),
            ConfigurationError::Parse(msg) => write!(f, "Invalid configuration file: {}", msg),
        }
    }
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            GpuError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            GpuError::OutOfMemory(msg) => write!(f, "Out of memory: {}", msg),
            GpuError::ResourcesInvalidated => {
                write!(f, "Pipeline resources are invalid until reconfigured")
            }
            GpuError::Readback(msg) => write!(f, "Readback failed: {}", msg),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::Capability(e) => Some(e),
            FilterError::Configuration(e) => Some(e),
            FilterError::Gpu(e) => Some(e),
            FilterError::Io(_) => None,
        }
    }
}
impl std::error::Error for CapabilityError {}
impl std::error::Error for ConfigurationError {}
impl std::error::Error for GpuError {}

impl From<CapabilityError> for FilterError {
    fn from(err: CapabilityError) -> Self {
        FilterError::Capability(err)
    }
}

impl From<ConfigurationError> for FilterError {
    fn from(err: ConfigurationError) -> Self {
        FilterError::Configuration(err)
    }
}

impl From<GpuError> for FilterError {
    fn from(err: GpuError) -> Self {
        FilterError::Gpu(err)
    }
}

impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        FilterError::Io(err.to_string())
    }
}

impl From<image::ImageError> for FilterError {
    fn from(err: image::ImageError) -> Self {
        FilterError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

impl From<wgpu::Error> for GpuError {
    fn from(err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { .. } => GpuError::OutOfMemory(err.to_string()),
            wgpu::Error::Validation { description, .. } => GpuError::Validation(description),
            other => GpuError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_wraps() {
        let err: FilterError = ConfigurationError::NonPositiveRadius.into();
        assert!(matches!(
            err,
            FilterError::Configuration(ConfigurationError::NonPositiveRadius)
        ));
        assert_eq!(
            err.to_string(),
            "Configuration error: Radius must be positive"
        );
    }

    #[test]
    fn test_invalid_plane_message_reports_expected_len() {
        let err = ConfigurationError::InvalidPlane {
            width: 4,
            height: 3,
            len: 10,
        };
        assert_eq!(err.to_string(), "Plane of 4x3 needs 12 bytes, got 10");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err = FilterError::from(GpuError::ResourcesInvalidated);
        assert!(err.source().is_some());
        assert!(FilterError::Io("x".into()).source().is_none());
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Mask and guide input planes and their GPU textures

use super::store::{Filter, StoredTexture};
use crate::errors::ConfigurationError;
use crate::gpu::wgpu;
use image::DynamicImage;
use std::borrow::Cow;
use tracing::debug;

/// A single-channel 8-bit image, rows top to bottom with no padding
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<'a> {
    data: Cow<'a, [u8]>,
    width: u32,
    height: u32,
}

impl<'a> Plane<'a> {
    /// Borrow `data` as a `width` x `height` plane
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self, ConfigurationError> {
        Self::checked(Cow::Borrowed(data), width, height)
    }

    fn checked(data: Cow<'a, [u8]>, width: u32, height: u32) -> Result<Self, ConfigurationError> {
        if width == 0 || height == 0 || data.len() != width as usize * height as usize {
            return Err(ConfigurationError::InvalidPlane {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Value at (x, y), or `None` outside the plane
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Reject planes the device cannot hold in one texture
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

impl Plane<'static> {
    /// Take ownership of `data`
    pub fn from_vec(data: Vec<u8>, width: u32, height: u32) -> Result<Self, ConfigurationError> {
        Self::checked(Cow::Owned(data), width, height)
    }

    /// Guide plane: luminance of any image
    pub fn luminance_of(image: &DynamicImage) -> Result<Self, ConfigurationError> {
        let luma = image.to_luma8();
        let (width, height) = luma.dimensions();
        Self::from_vec(luma.into_raw(), width, height)
    }

    /// Mask plane: alpha channel of an RGBA image (opaque when it has none)
    pub fn alpha_of(image: &DynamicImage) -> Result<Self, ConfigurationError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let alpha = rgba.pixels().map(|p| p[3]).collect();
        Self::from_vec(alpha, width, height)
    }

    /// Mask plane from a grayscale segmentation image
    pub fn luma_of(image: &DynamicImage) -> Result<Self, ConfigurationError> {
        Self::luminance_of(image)
    }
}

/// How mask/guide textures are obtained on each `apply`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputStrategy {
    /// Allocate new textures on every call
    #[default]
    Fresh,
    /// Reuse textures until the plane dimensions change
    Pooled,
}

/// Cached texture dimensions - avoids reallocation when dimensions match
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if dimensions have changed and need update
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Check if dimensions are initialized (non-zero)
    pub fn is_initialized(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// One input texture slot
struct InputSlot {
    label: &'static str,
    filter: Filter,
    texture: Option<StoredTexture>,
    dimensions: CachedDimensions,
}

impl InputSlot {
    fn new(label: &'static str, filter: Filter) -> Self {
        Self {
            label,
            filter,
            texture: None,
            dimensions: CachedDimensions::default(),
        }
    }

    fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        plane: &Plane<'_>,
        strategy: InputStrategy,
    ) -> &StoredTexture {
        let (width, height) = (plane.width(), plane.height());
        let reuse = strategy == InputStrategy::Pooled
            && self.dimensions.is_initialized()
            && !self.dimensions.needs_update(width, height);

        let texture = match self.texture.take() {
            Some(texture) if reuse => texture,
            _ => {
                debug!(input = self.label, width, height, "Allocating input texture");
                self.dimensions.update(width, height);
                StoredTexture::input(device, self.label, width, height, self.filter)
            }
        };
        texture.upload(queue, plane.data());
        self.texture.insert(texture)
    }

    fn clear(&mut self) {
        self.texture = None;
        self.dimensions = CachedDimensions::default();
    }
}

/// Mask (nearest) and guide (linear) input textures
pub(crate) struct InputTextures {
    strategy: InputStrategy,
    mask: InputSlot,
    guide: InputSlot,
}

impl InputTextures {
    pub fn new(strategy: InputStrategy) -> Self {
        Self {
            strategy,
            mask: InputSlot::new("guided-filter mask", Filter::Nearest),
            guide: InputSlot::new("guided-filter guide", Filter::Linear),
        }
    }

    pub fn strategy(&self) -> InputStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: InputStrategy) {
        if strategy != self.strategy {
            self.clear();
            self.strategy = strategy;
        }
    }

    /// Upload both planes, returning (mask, guide)
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mask: &Plane<'_>,
        guide: &Plane<'_>,
    ) -> (&StoredTexture, &StoredTexture) {
        let strategy = self.strategy;
        let mask_texture = self.mask.upload(device, queue, mask, strategy);
        let guide_texture = self.guide.upload(device, queue, guide, strategy);
        (mask_texture, guide_texture)
    }

    pub fn clear(&mut self) {
        self.mask.clear();
        self.guide.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn test_plane_rejects_wrong_length() {
        let data = [0u8; 10];
        assert_eq!(
            Plane::new(&data, 4, 3),
            Err(ConfigurationError::InvalidPlane {
                width: 4,
                height: 3,
                len: 10
            })
        );
    }

    #[test]
    fn test_plane_rejects_empty() {
        assert!(Plane::new(&[], 0, 0).is_err());
    }

    #[test]
    fn test_alpha_of_takes_alpha_channel() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 200]));
        let plane = Plane::alpha_of(&DynamicImage::ImageRgba8(image)).unwrap();
        assert_eq!((plane.width(), plane.height()), (3, 2));
        assert!(plane.data().iter().all(|&v| v == 200));
    }

    #[test]
    fn test_luminance_of_gray_is_identity() {
        let mut image = GrayImage::new(2, 2);
        image.put_pixel(1, 0, Luma([77]));
        let plane = Plane::luminance_of(&DynamicImage::ImageLuma8(image)).unwrap();
        assert_eq!(plane.get(1, 0), Some(77));
        assert_eq!(plane.get(0, 1), Some(0));
        assert_eq!(plane.get(2, 0), None);
        assert_eq!(plane.get(0, 2), None);
    }

    #[test]
    fn test_plane_over_device_limit_is_rejected() {
        let data = vec![0u8; 17];
        let wide = Plane::new(&data, 17, 1).unwrap();
        assert_eq!(
            wide.check_device_limit(16),
            Err(ConfigurationError::ExceedsDeviceLimit {
                width: 17,
                height: 1,
                max: 16
            })
        );
        assert!(wide.check_device_limit(17).is_ok());

        let tall = Plane::new(&data, 1, 17).unwrap();
        assert!(tall.check_device_limit(16).is_err());
    }

    #[test]
    fn test_cached_dimensions() {
        let mut dims = CachedDimensions::default();
        assert!(!dims.is_initialized());
        assert!(dims.needs_update(4, 4));
        dims.update(4, 4);
        assert!(dims.is_initialized());
        assert!(!dims.needs_update(4, 4));
        assert_eq!(dims, CachedDimensions::new(4, 4));
    }

    #[test]
    fn test_default_strategy_is_fresh() {
        assert_eq!(InputStrategy::default(), InputStrategy::Fresh);
    }
}

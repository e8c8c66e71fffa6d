//! 8-bit grayscale framebuffer
//!
//! Classifies update regions for automatic waveform selection. Only the top
//! nibble of each pixel is significant; black and white are `0x0` and `0xF`,
//! the four-level palette adds `0x5` and `0xA`.

use epdc_core::traits::{GrayProfile, PixelSource};
use epdc_core::update::Region;

/// Borrowed 8-bit grayscale framebuffer
#[derive(Debug, Clone, Copy)]
pub struct Gray8Framebuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    /// Bytes per row
    stride: u32,
}

impl<'a> Gray8Framebuffer<'a> {
    /// Wrap `data`, or `None` if it is too small for the geometry
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: u32) -> Option<Self> {
        if stride < width {
            return None;
        }
        let needed = (stride as usize).checked_mul(height as usize)?;
        if data.len() < needed {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    fn row(&self, y: u32, x1: u32, x2: u32) -> &'a [u8] {
        let start = (y * self.stride + x1) as usize;
        let end = (y * self.stride + x2) as usize;
        self.data.get(start..end).unwrap_or(&[])
    }
}

fn is_black_white(level: u8) -> bool {
    matches!(level, 0x0 | 0xF)
}

fn is_four_level(level: u8) -> bool {
    matches!(level, 0x0 | 0x5 | 0xA | 0xF)
}

impl PixelSource for Gray8Framebuffer<'_> {
    fn gray_profile(&self, region: &Region) -> GrayProfile {
        let x2 = region.x2.min(self.width);
        let y2 = region.y2.min(self.height);
        let mut profile = GrayProfile::BlackWhite;

        for y in region.y1..y2 {
            for &px in self.row(y, region.x1.min(x2), x2) {
                let level = px >> 4;
                if is_black_white(level) {
                    continue;
                }
                if !is_four_level(level) {
                    return GrayProfile::Full;
                }
                profile = GrayProfile::FourLevel;
            }
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 8;
    const H: u32 = 4;
    const STRIDE: u32 = 10;

    fn fb(data: &[u8]) -> Gray8Framebuffer<'_> {
        Gray8Framebuffer::new(data, W, H, STRIDE).unwrap()
    }

    #[test]
    fn test_geometry_checked() {
        let data = [0u8; 40];
        assert!(Gray8Framebuffer::new(&data, 8, 4, 10).is_some());
        assert!(Gray8Framebuffer::new(&data, 8, 5, 10).is_none());
        assert!(Gray8Framebuffer::new(&data, 12, 2, 10).is_none());
    }

    #[test]
    fn test_profiles() {
        let mut data = [0xFFu8; (STRIDE * H) as usize];
        data[0] = 0x00;
        let all = Region::full(W, H);
        assert_eq!(fb(&data).gray_profile(&all), GrayProfile::BlackWhite);

        data[(STRIDE + 2) as usize] = 0x55;
        assert_eq!(fb(&data).gray_profile(&all), GrayProfile::FourLevel);

        data[(2 * STRIDE + 5) as usize] = 0x80;
        assert_eq!(fb(&data).gray_profile(&all), GrayProfile::Full);

        // The gray pixel is outside this region
        let left = Region::new(0, 0, 4, 4).unwrap();
        assert_eq!(fb(&data).gray_profile(&left), GrayProfile::FourLevel);
    }

    #[test]
    fn test_padding_is_ignored() {
        let mut data = [0x00u8; (STRIDE * H) as usize];
        // Bytes past the visible width belong to the stride padding
        data[8] = 0x80;
        data[9] = 0x80;
        assert_eq!(fb(&data).gray_profile(&Region::full(W, H)), GrayProfile::BlackWhite);
    }

    #[test]
    fn test_low_nibble_ignored() {
        let data = [0x0Au8; (STRIDE * H) as usize];
        assert_eq!(fb(&data).gray_profile(&Region::full(W, H)), GrayProfile::BlackWhite);
    }
}

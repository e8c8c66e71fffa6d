//! Waveform data lookups

use crate::update::Region;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gray levels present in a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GrayProfile {
    /// Only pure black and white
    BlackWhite,
    /// At most four evenly spaced levels
    FourLevel,
    /// Anything else
    Full,
}

/// Temperature ranges of the loaded waveform
pub trait WaveformTable {
    /// Range index for a temperature, or `None` if no range covers it
    fn temperature_index(&self, celsius: i16) -> Option<u8>;
}

/// Pixel data behind the working buffers
pub trait PixelSource {
    /// Classify the pixels inside `region`
    fn gray_profile(&self, region: &Region) -> GrayProfile;
}

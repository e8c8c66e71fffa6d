//! Update requests and merging

use super::region::Region;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Logical waveform mode
///
/// `Auto` is resolved to a concrete mode from the pixel content just before
/// the update is handed to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WaveformMode {
    /// Pick from the gray levels present in the region
    Auto,
    /// Initialization (clear to white)
    Init,
    /// Direct update, black and white only
    Du,
    /// 4-level grayscale clear
    Gc4,
    /// 8-level grayscale clear
    Gc8,
    /// 16-level grayscale clear
    Gc16,
    /// 32-level grayscale clear
    Gc32,
    /// Fast animation mode
    A2,
}

/// Whether only changed pixels or every pixel in the region is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpdateMode {
    Partial,
    Full,
}

/// A queued screen update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdateRequest {
    pub region: Region,
    pub waveform: WaveformMode,
    pub mode: UpdateMode,
    /// Submission order; larger is newer
    pub order: u64,
}

impl UpdateRequest {
    pub const fn new(region: Region, waveform: WaveformMode, mode: UpdateMode, order: u64) -> Self {
        Self {
            region,
            waveform,
            mode,
            order,
        }
    }

    /// Fold `other` into `self` if their regions are not disjoint
    ///
    /// Returns `false` and leaves `self` untouched when they are disjoint.
    /// The merged update keeps the larger order so it is never considered
    /// older than anything it absorbed.
    pub fn merge(&mut self, other: &UpdateRequest) -> bool {
        if self.region.is_disjoint(&other.region) {
            return false;
        }

        self.region = self.region.union(&other.region);
        if self.waveform != other.waveform {
            self.waveform = WaveformMode::Auto;
        }
        if self.mode != other.mode {
            self.mode = UpdateMode::Full;
        }
        self.order = self.order.max(other.order);
        true
    }
}

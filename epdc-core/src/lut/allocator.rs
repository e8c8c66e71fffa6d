//! LUT selection
//!
//! Early controller silicon raises a timing-controller underrun when a newly
//! submitted update lands on a LUT of lower priority than an already active
//! one. On those parts (and whenever the 5-bit pixel format halves the LUT
//! count) the allocator prefers the LUT just above every used LUT.

use super::mask::{Lut, LutMask};
use crate::config::{HwRevision, PixelFormat};
use crate::traits::EpdcRegisters;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a free LUT is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LutPolicy {
    /// Lowest LUT above all used LUTs, else lowest free LUT
    AboveActive,
    /// First free LUT in the low word, then the high word
    FirstFree,
}

/// Snapshot of LUT usage read from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LutStatus {
    /// LUTs currently driving the panel
    pub active: LutMask,
    /// LUTs that completed but whose interrupt has not been drained yet
    pub unprocessed: LutMask,
}

impl LutStatus {
    /// Read both status masks, restricted to `lut_count` LUTs
    pub fn read<R: EpdcRegisters>(regs: &mut R, lut_count: u8) -> Self {
        Self {
            active: regs.lut_active().truncate(lut_count),
            unprocessed: regs.lut_complete_pending().truncate(lut_count),
        }
    }

    /// LUTs that must not be handed out
    pub fn used(&self) -> LutMask {
        self.active.union(self.unprocessed)
    }
}

/// LUT allocator for one controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LutAllocator {
    policy: LutPolicy,
    lut_count: u8,
}

impl LutAllocator {
    /// Create an allocator with an explicit policy
    pub const fn new(policy: LutPolicy, lut_count: u8) -> Self {
        Self { policy, lut_count }
    }

    /// Derive policy and LUT count from the controller revision and format
    pub fn for_hardware(revision: HwRevision, format: PixelFormat) -> Self {
        let lut_count = revision.lut_count(format);
        let policy = if revision.has_underrun_erratum() || format.is_reduced_lut() {
            LutPolicy::AboveActive
        } else {
            LutPolicy::FirstFree
        };
        Self::new(policy, lut_count)
    }

    pub fn policy(&self) -> LutPolicy {
        self.policy
    }

    pub fn lut_count(&self) -> u8 {
        self.lut_count
    }

    /// Pick the next LUT, or `None` if every LUT is in use
    ///
    /// The result is never a member of `status.used()`. The caller must hold
    /// the scheduler lock from this call until the update is submitted.
    pub fn choose(&self, status: LutStatus) -> Option<Lut> {
        let used = status.used().truncate(self.lut_count);

        match self.policy {
            LutPolicy::AboveActive => {
                let above = match used.highest() {
                    Some(top) => top.index() + 1,
                    None => 0,
                };
                if above < self.lut_count {
                    Lut::new(above)
                } else {
                    used.first_zero(self.lut_count)
                }
            }
            LutPolicy::FirstFree => {
                let low_width = self.lut_count.min(32);
                let low = LutMask::from_bits(used.low() as u64);
                if let Some(lut) = low.first_zero(low_width) {
                    return Some(lut);
                }
                if self.lut_count <= 32 {
                    return None;
                }
                let high = LutMask::from_bits(used.high() as u64);
                high.first_zero(self.lut_count - 32)
                    .and_then(|lut| Lut::new(lut.index() + 32))
            }
        }
    }
}

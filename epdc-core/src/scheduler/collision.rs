//! Collision resolution for a finished working buffer

use crate::config::HwRevision;
use crate::lut::{LutMask, LutOrders};
use crate::traits::EpdcRegisters;
use crate::update::Region;

/// Working-buffer status captured before the interrupt is cleared
///
/// Clearing the working-buffer interrupt resets the shadow collision
/// registers, so this must be read first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WorkingBufferStatus {
    pub void: bool,
    pub collision: bool,
    pub mask: LutMask,
    pub region: Option<Region>,
}

impl WorkingBufferStatus {
    pub fn capture<R: EpdcRegisters>(regs: &mut R, lut_count: u8) -> Self {
        let void = regs.update_void();
        let collision = regs.collision_detected();
        let (mask, region) = if collision {
            (regs.collision_mask().truncate(lut_count), regs.collision_region())
        } else {
            (LutMask::EMPTY, None)
        };

        Self {
            void,
            collision,
            mask,
            region,
        }
    }
}

/// Outcome for the update that just left the working buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// Processed normally
    Completed,
    /// No pixel changed; the LUT was never started
    Cancelled,
    /// Collided only with newer updates that already cover these pixels
    Stale,
    /// Collided with older updates; retry once `mask` clears
    Collided { mask: LutMask, region: Option<Region> },
}

/// Decide what happens to an update after its working buffer finished
///
/// `completed` holds the LUTs that retired while this update was in the
/// working buffer; they can no longer block it.
pub fn resolve(
    status: &WorkingBufferStatus,
    order: u64,
    completed: LutMask,
    orders: &LutOrders,
    revision: HwRevision,
) -> Resolution {
    if !status.collision {
        return if status.void {
            Resolution::Cancelled
        } else {
            Resolution::Completed
        };
    }

    let mask = status.mask.without(completed);
    if mask.iter().any(|lut| orders.get(lut) >= order) {
        return Resolution::Stale;
    }

    let region = if revision.reports_collision_region() {
        status.region
    } else {
        None
    };
    Resolution::Collided { mask, region }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::Lut;

    fn collided(mask: u64) -> WorkingBufferStatus {
        WorkingBufferStatus {
            void: false,
            collision: true,
            mask: LutMask::from_bits(mask),
            region: Region::new(10, 10, 20, 20),
        }
    }

    fn orders(entries: &[(u8, u64)]) -> LutOrders {
        let mut orders = LutOrders::new();
        for &(lut, order) in entries {
            orders.record(Lut::new(lut).unwrap(), order);
        }
        orders
    }

    #[test]
    fn test_plain_completion() {
        let status = WorkingBufferStatus::default();
        let res = resolve(&status, 5, LutMask::EMPTY, &LutOrders::new(), HwRevision::new(20));
        assert_eq!(res, Resolution::Completed);
    }

    #[test]
    fn test_void_is_cancelled() {
        let status = WorkingBufferStatus {
            void: true,
            ..Default::default()
        };
        let res = resolve(&status, 5, LutMask::EMPTY, &LutOrders::new(), HwRevision::new(20));
        assert_eq!(res, Resolution::Cancelled);
    }

    #[test]
    fn test_void_with_collision_is_not_cancelled() {
        let mut status = collided(0b10);
        status.void = true;
        let res = resolve(&status, 5, LutMask::EMPTY, &orders(&[(1, 2)]), HwRevision::new(20));
        assert!(matches!(res, Resolution::Collided { .. }));
    }

    #[test]
    fn test_collision_with_newer_lut_is_stale() {
        // LUT 1 carries order 7, newer than our order 5
        let res = resolve(&collided(0b110), 5, LutMask::EMPTY, &orders(&[(1, 7), (2, 3)]), HwRevision::new(20));
        assert_eq!(res, Resolution::Stale);

        // Equal order is stale too
        let res = resolve(&collided(0b10), 5, LutMask::EMPTY, &orders(&[(1, 5)]), HwRevision::new(20));
        assert_eq!(res, Resolution::Stale);
    }

    #[test]
    fn test_collision_with_older_lut_retries() {
        let res = resolve(&collided(0b110), 5, LutMask::EMPTY, &orders(&[(1, 2), (2, 3)]), HwRevision::new(20));
        assert_eq!(
            res,
            Resolution::Collided {
                mask: LutMask::from_bits(0b110),
                region: Region::new(10, 10, 20, 20),
            }
        );
    }

    #[test]
    fn test_completed_luts_leave_the_mask() {
        // LUT 1 was newer but finished during this window
        let res = resolve(
            &collided(0b110),
            5,
            LutMask::from_bits(0b010),
            &orders(&[(1, 9), (2, 3)]),
            HwRevision::new(20),
        );
        assert_eq!(
            res,
            Resolution::Collided {
                mask: LutMask::from_bits(0b100),
                region: Region::new(10, 10, 20, 20),
            }
        );
    }

    #[test]
    fn test_old_revision_keeps_full_region() {
        let res = resolve(&collided(0b10), 5, LutMask::EMPTY, &orders(&[(1, 2)]), HwRevision::new(10));
        assert_eq!(
            res,
            Resolution::Collided {
                mask: LutMask::from_bits(0b10),
                region: None,
            }
        );
    }
}

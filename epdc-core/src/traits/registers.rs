//! Controller register interface

use crate::lut::{Lut, LutMask};
use crate::update::{Region, UpdateMode};

/// Everything the hardware needs to start one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubmitCommand {
    /// Physical address of the working buffer
    pub buffer_addr: u32,
    pub region: Region,
    /// Hardware waveform mode id
    pub waveform: u8,
    pub mode: UpdateMode,
    pub lut: Lut,
    /// Index into the waveform temperature ranges
    pub temp_index: u8,
}

/// Register-level access to the display controller
///
/// Status reads take `&mut self` because some controllers latch status on
/// read. Implementations only translate to register bits; all scheduling
/// decisions live in the scheduler.
pub trait EpdcRegisters {
    /// LUTs currently processing an update
    fn lut_active(&mut self) -> LutMask;

    /// LUTs with a raised completion interrupt
    fn lut_complete_pending(&mut self) -> LutMask;

    /// Working buffer is still being processed
    fn working_buffer_busy(&mut self) -> bool;

    /// Working buffer completion interrupt is raised
    fn working_buffer_complete(&mut self) -> bool;

    /// Last update produced no changed pixels
    fn update_void(&mut self) -> bool;

    /// Last update collided with an active LUT
    fn collision_detected(&mut self) -> bool;

    /// LUTs the last update collided with
    fn collision_mask(&mut self) -> LutMask;

    /// Colliding sub-rectangle, when the controller reports one
    fn collision_region(&mut self) -> Option<Region>;

    /// Timing controller underrun interrupt is raised
    fn underrun(&mut self) -> bool;

    /// Clear the working buffer interrupt
    ///
    /// This also resets the shadow collision status, so void and collision
    /// state must be read first.
    fn clear_working_buffer_irq(&mut self);

    fn enable_working_buffer_irq(&mut self, enable: bool);

    fn clear_lut_complete_irq(&mut self, lut: Lut);

    fn enable_lut_complete_irq(&mut self, lut: Lut);

    fn disable_lut_complete_irq(&mut self, lut: Lut);

    fn clear_underrun_irq(&mut self);

    /// Program and start an update
    fn submit(&mut self, cmd: &SubmitCommand);
}

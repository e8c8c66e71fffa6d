//! Simulated collaborators for host testing
//!
//! [`SimController`] models the register file closely enough to exercise
//! the scheduler: LUT activity, working-buffer completion, the shadow
//! collision status that is lost when the interrupt is cleared, and
//! underruns. It also counts submissions that would have clobbered an
//! active LUT or a busy working buffer.

use heapless::{Deque, Vec};

use crate::lut::{Lut, LutMask};
use crate::traits::{
    EpdcRegisters, GrayProfile, PixelSource, PowerControl, SubmitCommand, WaveformTable,
};
use crate::update::Region;

const OP_LOG: usize = 32;

/// Register writes recorded by [`SimController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Submit(SubmitCommand),
    ClearWorkingBuffer,
    EnableWorkingBuffer(bool),
    ClearLut(Lut),
    EnableLut(Lut),
    DisableLut(Lut),
    ClearUnderrun,
}

/// Simulated display controller
#[derive(Debug, Clone, Default)]
pub struct SimController {
    active: LutMask,
    complete: LutMask,
    irq_enabled: LutMask,
    wb_busy: bool,
    wb_complete: bool,
    wb_irq_enabled: bool,
    void: bool,
    collision: bool,
    collision_mask: LutMask,
    collision_region: Option<Region>,
    underrun: bool,
    last: Option<SubmitCommand>,
    submits: u32,
    conflicts: u32,
    ops: Deque<Op, OP_LOG>,
}

impl SimController {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&mut self, op: Op) {
        if self.ops.is_full() {
            self.ops.pop_front();
        }
        let _ = self.ops.push_back(op);
    }

    /// Most recent register writes, oldest first
    pub fn ops(&self) -> impl Iterator<Item = Op> + '_ {
        self.ops.iter().copied()
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn submit_count(&self) -> u32 {
        self.submits
    }

    pub fn last_submit(&self) -> Option<SubmitCommand> {
        self.last
    }

    pub fn last_lut(&self) -> Option<Lut> {
        self.last.map(|cmd| cmd.lut)
    }

    /// Submissions onto a used LUT or a busy working buffer
    pub fn conflicts(&self) -> u32 {
        self.conflicts
    }

    pub fn active_luts(&self) -> LutMask {
        self.active
    }

    pub fn wb_irq_enabled(&self) -> bool {
        self.wb_irq_enabled
    }

    pub fn lut_irq_enabled(&self, lut: Lut) -> bool {
        self.irq_enabled.contains(lut)
    }

    /// Force LUTs active, as if driven by an earlier owner
    pub fn set_active(&mut self, mask: LutMask) {
        self.active = mask;
    }

    /// Working buffer finished without incident
    pub fn finish_working_buffer(&mut self) {
        if self.wb_busy {
            self.wb_busy = false;
            self.wb_complete = true;
        }
    }

    /// Working buffer finished and collided with `mask`
    pub fn collide(&mut self, mask: LutMask, region: Option<Region>) {
        if self.wb_busy {
            self.finish_working_buffer();
            self.collision = !mask.is_empty();
            self.collision_mask = mask;
            self.collision_region = region;
        }
    }

    /// Working buffer finished with no changed pixels
    pub fn void_update(&mut self) {
        if self.wb_busy {
            self.finish_working_buffer();
            self.void = true;
            if let Some(lut) = self.last_lut() {
                self.active.clear(lut);
            }
        }
    }

    /// LUT finished driving the panel
    ///
    /// Ignored for the LUT whose working buffer is still being processed.
    pub fn finish_lut(&mut self, lut: Lut) {
        if self.wb_busy && self.last_lut() == Some(lut) {
            return;
        }
        if self.active.contains(lut) {
            self.active.clear(lut);
            self.complete.set(lut);
        }
    }

    /// Finish every active LUT not tied to a busy working buffer
    pub fn finish_all_luts(&mut self) {
        for lut in self.active.iter() {
            self.finish_lut(lut);
        }
    }

    pub fn raise_underrun(&mut self) {
        self.underrun = true;
    }
}

impl EpdcRegisters for SimController {
    fn lut_active(&mut self) -> LutMask {
        self.active
    }

    fn lut_complete_pending(&mut self) -> LutMask {
        self.complete
    }

    fn working_buffer_busy(&mut self) -> bool {
        self.wb_busy
    }

    fn working_buffer_complete(&mut self) -> bool {
        self.wb_complete
    }

    fn update_void(&mut self) -> bool {
        self.void
    }

    fn collision_detected(&mut self) -> bool {
        self.collision
    }

    fn collision_mask(&mut self) -> LutMask {
        self.collision_mask
    }

    fn collision_region(&mut self) -> Option<Region> {
        self.collision_region
    }

    fn underrun(&mut self) -> bool {
        self.underrun
    }

    fn clear_working_buffer_irq(&mut self) {
        self.wb_complete = false;
        // Shadow status is reset along with the interrupt
        self.void = false;
        self.collision = false;
        self.collision_mask = LutMask::EMPTY;
        self.collision_region = None;
        self.log(Op::ClearWorkingBuffer);
    }

    fn enable_working_buffer_irq(&mut self, enable: bool) {
        self.wb_irq_enabled = enable;
        self.log(Op::EnableWorkingBuffer(enable));
    }

    fn clear_lut_complete_irq(&mut self, lut: Lut) {
        self.complete.clear(lut);
        self.log(Op::ClearLut(lut));
    }

    fn enable_lut_complete_irq(&mut self, lut: Lut) {
        self.irq_enabled.set(lut);
        self.log(Op::EnableLut(lut));
    }

    fn disable_lut_complete_irq(&mut self, lut: Lut) {
        self.irq_enabled.clear(lut);
        self.log(Op::DisableLut(lut));
    }

    fn clear_underrun_irq(&mut self) {
        self.underrun = false;
        self.log(Op::ClearUnderrun);
    }

    fn submit(&mut self, cmd: &SubmitCommand) {
        if self.wb_busy || self.active.contains(cmd.lut) || self.complete.contains(cmd.lut) {
            self.conflicts += 1;
        }
        self.active.set(cmd.lut);
        self.wb_busy = true;
        self.wb_complete = false;
        self.void = false;
        self.collision = false;
        self.collision_mask = LutMask::EMPTY;
        self.collision_region = None;
        self.last = Some(*cmd);
        self.submits += 1;
        self.log(Op::Submit(*cmd));
    }
}

/// Power error injected by [`MockPower`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPowerError;

/// Counting power controller with injectable failures
#[derive(Debug, Clone, Default)]
pub struct MockPower {
    pub power_ups: u32,
    pub power_downs: u32,
    pub fail_power_up: bool,
    pub fail_power_down: bool,
    pub powered: bool,
}

impl MockPower {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PowerControl for MockPower {
    type Error = MockPowerError;

    fn power_up(&mut self) -> Result<(), Self::Error> {
        if self.fail_power_up {
            return Err(MockPowerError);
        }
        self.power_ups += 1;
        self.powered = true;
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), Self::Error> {
        if self.fail_power_down {
            return Err(MockPowerError);
        }
        self.power_downs += 1;
        self.powered = false;
        Ok(())
    }
}

/// Waveform table with ascending range bounds
///
/// Range `i` covers `bounds[i]..bounds[i + 1]`.
#[derive(Debug, Clone, Default)]
pub struct FixedTable {
    bounds: Vec<i16, 16>,
}

impl FixedTable {
    pub fn new(bounds: &[i16]) -> Self {
        let mut table = Vec::new();
        for &b in bounds.iter().take(16) {
            let _ = table.push(b);
        }
        Self { bounds: table }
    }
}

impl WaveformTable for FixedTable {
    fn temperature_index(&self, celsius: i16) -> Option<u8> {
        self.bounds
            .windows(2)
            .position(|w| celsius >= w[0] && celsius < w[1])
            .map(|i| i as u8)
    }
}

/// Pixel source reporting the same profile for every region
#[derive(Debug, Clone, Copy)]
pub struct UniformPixels(pub GrayProfile);

impl PixelSource for UniformPixels {
    fn gray_profile(&self, _region: &Region) -> GrayProfile {
        self.0
    }
}

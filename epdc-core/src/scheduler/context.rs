//! Scheduler context

use heapless::Deque;

use super::collision::{resolve, Resolution, WorkingBufferStatus};
use super::pool::{BufferId, BufferPool, Census};
use crate::config::{SchedulerConfig, MAX_PENDING};
use crate::lut::{Lut, LutAllocator, LutMask, LutOrders, LutStatus};
use crate::traits::{EpdcRegisters, PixelSource, SubmitCommand, WaveformTable};
use crate::update::{Region, UpdateMode, UpdateRequest, WaveformMode};
use crate::waveform::WaveformSelector;
use crate::Error;

/// Whether new updates are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Acceptance {
    /// Controller not initialized yet
    NotReady,
    /// Updates paused by the caller
    Paused,
    Ready,
}

/// Running counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Requests accepted by `enqueue`
    pub submitted: u32,
    /// Requests folded into another update
    pub merged: u32,
    pub completed: u32,
    /// Updates that changed no pixels
    pub cancelled: u32,
    /// Collisions discarded because a newer update covers them
    pub stale_collisions: u32,
    /// Updates moved to the collision retry list
    pub retried: u32,
    pub underruns: u32,
    pub power_ups: u32,
    pub power_downs: u32,
}

/// Result of one submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubmitOutcome {
    /// Nothing ready to submit
    Idle,
    /// Work is staged but the working buffer is occupied
    WaitBuffer,
    /// Work is staged but every LUT is in use
    WaitLut,
    Submitted(SubmitCommand),
}

/// What one bottom-half pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptReport {
    pub underrun: bool,
    /// LUTs that became available
    pub luts_freed: LutMask,
    /// Outcome for the working buffer, if it finished
    pub resolution: Option<Resolution>,
}

impl InterruptReport {
    /// Whether the working buffer was released
    pub fn wb_freed(&self) -> bool {
        self.resolution.is_some()
    }
}

/// All mutable scheduling state for one controller
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    queue: Deque<UpdateRequest, MAX_PENDING>,
    pool: BufferPool,
    allocator: LutAllocator,
    lut_orders: LutOrders,
    /// LUTs that completed since the current working buffer was submitted
    luts_complete_wb: LutMask,
    next_order: u64,
    acceptance: Acceptance,
    selector: WaveformSelector,
    stats: Stats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            queue: Deque::new(),
            pool: BufferPool::new(&config.buffers, config.buffer_count()),
            allocator: LutAllocator::for_hardware(config.hw.revision, config.hw.pixel_format),
            lut_orders: LutOrders::new(),
            luts_complete_wb: LutMask::EMPTY,
            next_order: 1,
            acceptance: Acceptance::NotReady,
            selector: WaveformSelector::new(config.waveforms, config.default_temperature_c),
            stats: Stats::default(),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn allocator(&self) -> &LutAllocator {
        &self.allocator
    }

    pub fn waveforms(&self) -> &WaveformSelector {
        &self.selector
    }

    pub fn waveforms_mut(&mut self) -> &mut WaveformSelector {
        &mut self.selector
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    /// Start accepting updates after initialization
    pub fn set_ready(&mut self) {
        self.acceptance = Acceptance::Ready;
    }

    pub fn pause(&mut self) {
        if self.acceptance == Acceptance::Ready {
            self.acceptance = Acceptance::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.acceptance == Acceptance::Paused {
            self.acceptance = Acceptance::Ready;
        }
    }

    pub fn census(&self) -> Census {
        self.pool.census()
    }

    /// Requests waiting for a buffer
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Recorded order of the update on `lut`, zero if none
    pub fn lut_order(&self, lut: Lut) -> u64 {
        self.lut_orders.get(lut)
    }

    /// Check that an update could be accepted right now
    pub fn check_accept(&self, region: &Region) -> Result<(), Error> {
        if self.acceptance != Acceptance::Ready {
            return Err(Error::Busy);
        }
        if !region.fits(self.config.panel.width, self.config.panel.height) {
            return Err(Error::InvalidRegion);
        }
        if self.queue.len() >= self.config.queue_depth() {
            return Err(Error::ResourceExhausted);
        }
        Ok(())
    }

    /// Queue an update and return its order number
    pub fn enqueue(
        &mut self,
        region: Region,
        waveform: WaveformMode,
        mode: UpdateMode,
    ) -> Result<u64, Error> {
        self.check_accept(&region)?;

        let order = self.next_order;
        self.queue
            .push_back(UpdateRequest::new(region, waveform, mode, order))
            .map_err(|_| Error::ResourceExhausted)?;
        self.next_order += 1;
        self.stats.submitted += 1;
        trace!("queued update {}", order);
        Ok(order)
    }

    /// Stage the next update in the pending slot
    ///
    /// Resumes an already staged update first. Otherwise unblocked retries
    /// take precedence over new requests, and everything that overlaps the
    /// seed is merged into it.
    pub fn select_next(&mut self) -> Option<BufferId> {
        if let Some(id) = self.pool.pending() {
            return Some(id);
        }
        if let Some(id) = self.stage_retry() {
            return Some(id);
        }
        self.stage_pending()
    }

    fn stage_retry(&mut self) -> Option<BufferId> {
        let seed = self.first_unblocked()?;
        if !self.pool.retry_to_pending(seed) {
            return None;
        }
        let mut request = self.pool.get(seed).and_then(|b| b.request)?;

        let mut cursor = 0;
        while let Some(&id) = self.pool.retry_ids().get(cursor) {
            let candidate = self
                .pool
                .get(id)
                .filter(|b| b.collision_mask.is_empty())
                .and_then(|b| b.request);
            match candidate {
                Some(other) if request.merge(&other) => {
                    // Releasing shifts the remaining entries down
                    self.pool.release(id);
                    self.stats.merged += 1;
                }
                _ => cursor += 1,
            }
        }

        if let Some(buffer) = self.pool.get_mut(seed) {
            buffer.request = Some(request);
        }
        Some(seed)
    }

    fn first_unblocked(&self) -> Option<BufferId> {
        self.pool.retry_ids().iter().copied().find(|&id| {
            self.pool
                .get(id)
                .map_or(false, |b| b.collision_mask.is_empty())
        })
    }

    fn stage_pending(&mut self) -> Option<BufferId> {
        if self.queue.is_empty() {
            return None;
        }
        let id = self.pool.claim_pending()?;
        let mut request = self.queue.pop_front()?;

        for _ in 0..self.queue.len() {
            let Some(other) = self.queue.pop_front() else {
                break;
            };
            if request.merge(&other) {
                self.stats.merged += 1;
            } else {
                // Room was made by the pop above
                let _ = self.queue.push_back(other);
            }
        }

        if let Some(buffer) = self.pool.get_mut(id) {
            buffer.request = Some(request);
        }
        Some(id)
    }

    /// Pick a LUT that is neither active nor waiting to be drained
    pub fn choose_lut<R: EpdcRegisters>(&self, regs: &mut R) -> Option<Lut> {
        let status = LutStatus::read(regs, self.allocator.lut_count());
        self.allocator.choose(status)
    }

    /// Move the pending update in flight on `lut`
    ///
    /// Records the LUT order and starts a fresh completion window. Returns
    /// the buffer and its request, or `None` if nothing is pending or the
    /// working buffer is occupied.
    pub fn commit(&mut self, lut: Lut) -> Option<(BufferId, UpdateRequest)> {
        let id = self.pool.pending_to_in_flight()?;
        let buffer = self.pool.get_mut(id)?;
        let request = buffer.request?;
        buffer.lut = Some(lut);
        buffer.collision_mask = LutMask::EMPTY;

        self.lut_orders.record(lut, request.order);
        self.luts_complete_wb = LutMask::EMPTY;
        Some((id, request))
    }

    /// One submission attempt
    ///
    /// Stages work, waits for nothing, and either submits to the hardware or
    /// reports which resource is missing. Must run under the same lock as
    /// [`Scheduler::service_interrupts`].
    pub fn try_submit<R, T, P>(&mut self, regs: &mut R, table: &T, pixels: &P) -> SubmitOutcome
    where
        R: EpdcRegisters,
        T: WaveformTable,
        P: PixelSource,
    {
        if self.select_next().is_none() {
            return SubmitOutcome::Idle;
        }
        if self.pool.in_flight().is_some() || regs.working_buffer_busy() {
            return SubmitOutcome::WaitBuffer;
        }
        let Some(lut) = self.choose_lut(regs) else {
            return SubmitOutcome::WaitLut;
        };

        let Some((id, request)) = self.commit(lut) else {
            return SubmitOutcome::WaitBuffer;
        };
        let cmd = SubmitCommand {
            buffer_addr: self.pool.get(id).map_or(0, |b| b.addr()),
            region: request.region,
            waveform: self.selector.mode_id(request.waveform, pixels, &request.region),
            mode: request.mode,
            lut,
            temp_index: self.selector.temperature_index(table),
        };

        regs.enable_lut_complete_irq(lut);
        regs.enable_working_buffer_irq(true);
        regs.submit(&cmd);
        debug!("update {} submitted on LUT {}", request.order, lut.index());
        SubmitOutcome::Submitted(cmd)
    }

    /// Drain hardware status after an interrupt
    ///
    /// Handles underruns, retires completed LUTs and resolves the in-flight
    /// update once the working buffer is done. Never blocks.
    pub fn service_interrupts<R: EpdcRegisters>(&mut self, regs: &mut R) -> InterruptReport {
        let mut report = InterruptReport::default();

        if regs.underrun() {
            warn!("timing controller underrun");
            regs.clear_underrun_irq();
            self.stats.underruns += 1;
            report.underrun = true;
        }

        let lut_count = self.allocator.lut_count();
        let done = regs.lut_complete_pending().truncate(lut_count);
        for lut in done.iter() {
            regs.disable_lut_complete_irq(lut);
            regs.clear_lut_complete_irq(lut);
            self.lut_orders.release(lut);
        }
        if !done.is_empty() {
            self.luts_complete_wb = self.luts_complete_wb.union(done);
            self.pool.clear_collisions(done);
            report.luts_freed = done;
        }

        let Some(id) = self.pool.in_flight() else {
            return report;
        };
        if !regs.working_buffer_complete() || regs.working_buffer_busy() {
            return report;
        }

        let status = WorkingBufferStatus::capture(regs, lut_count);
        regs.clear_working_buffer_irq();
        regs.enable_working_buffer_irq(false);

        let (order, lut) = match self.pool.get(id) {
            Some(buffer) => (buffer.request.map_or(0, |r| r.order), buffer.lut),
            None => return report,
        };
        let resolution = resolve(
            &status,
            order,
            self.luts_complete_wb,
            &self.lut_orders,
            self.config.hw.revision,
        );

        match resolution {
            Resolution::Completed => {
                self.pool.release(id);
                self.stats.completed += 1;
            }
            Resolution::Cancelled => {
                if let Some(lut) = lut {
                    regs.disable_lut_complete_irq(lut);
                    regs.clear_lut_complete_irq(lut);
                    self.lut_orders.release(lut);
                    report.luts_freed.set(lut);
                }
                self.pool.release(id);
                self.stats.cancelled += 1;
            }
            Resolution::Stale => {
                debug!("update {} collided with newer updates, dropped", order);
                self.pool.release(id);
                self.stats.stale_collisions += 1;
            }
            Resolution::Collided { mask, region } => {
                debug!("update {} collided, waiting on {} LUTs", order, mask.count());
                if let Some(buffer) = self.pool.get_mut(id) {
                    buffer.collision_mask = mask;
                    buffer.lut = None;
                    if let (Some(narrow), Some(request)) = (region, buffer.request.as_mut()) {
                        request.region = narrow;
                    }
                }
                if self.pool.in_flight_to_retry().is_none() {
                    self.pool.release(id);
                }
                self.stats.retried += 1;
            }
        }

        report.resolution = Some(resolution);
        report
    }

    /// Whether a submission pass would find something to do
    pub fn has_ready_work(&self) -> bool {
        self.pool.pending().is_some()
            || (!self.queue.is_empty() && self.pool.has_free())
            || self.first_unblocked().is_some()
    }

    /// Queue, pending slot, retry list and in-flight slot are all empty
    pub fn is_buffer_idle(&self) -> bool {
        self.queue.is_empty() && self.pool.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FixedTable, SimController, UniformPixels};
    use crate::traits::GrayProfile;
    use proptest::prelude::*;

    fn ready(config: SchedulerConfig) -> Scheduler {
        let mut sched = Scheduler::new(config);
        sched.set_ready();
        sched
    }

    fn region(x1: u32, y1: u32, x2: u32, y2: u32) -> Region {
        Region::new(x1, y1, x2, y2).unwrap()
    }

    fn table() -> FixedTable {
        FixedTable::new(&[0, 10, 20, 30, 40])
    }

    fn pixels() -> UniformPixels {
        UniformPixels(GrayProfile::Full)
    }

    fn submit(sched: &mut Scheduler, sim: &mut SimController) -> SubmitOutcome {
        sched.try_submit(sim, &table(), &pixels())
    }

    #[test]
    fn test_not_ready_and_paused_are_busy() {
        let mut sched = Scheduler::new(SchedulerConfig::new());
        let r = region(0, 0, 10, 10);
        assert_eq!(sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial), Err(Error::Busy));

        sched.set_ready();
        sched.pause();
        assert_eq!(sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial), Err(Error::Busy));
        sched.resume();
        assert_eq!(sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial), Ok(1));
    }

    #[test]
    fn test_region_must_fit_panel() {
        let mut sched = ready(SchedulerConfig::new());
        let r = region(700, 500, 801, 600);
        assert_eq!(
            sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial),
            Err(Error::InvalidRegion)
        );
    }

    #[test]
    fn test_queue_full_is_exhausted() {
        let mut config = SchedulerConfig::new();
        config.max_pending = 2;
        let mut sched = ready(config);
        let r = region(0, 0, 10, 10);
        assert_eq!(sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial), Ok(1));
        assert_eq!(sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial), Ok(2));
        assert_eq!(
            sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial),
            Err(Error::ResourceExhausted)
        );
        assert_eq!(sched.stats().submitted, 2);
    }

    #[test]
    fn test_overlapping_requests_submit_once() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();

        sched.enqueue(region(0, 0, 100, 100), WaveformMode::Du, UpdateMode::Partial).unwrap();
        sched.enqueue(region(50, 50, 200, 200), WaveformMode::Gc16, UpdateMode::Partial).unwrap();

        let SubmitOutcome::Submitted(cmd) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        assert_eq!(cmd.region, region(0, 0, 200, 200));
        // Auto resolved from a full-gray region
        assert_eq!(cmd.waveform, sched.config().waveforms.gc16);
        assert_eq!(sim.submit_count(), 1);
        assert_eq!(sched.stats().merged, 1);
        assert_eq!(sched.queued(), 0);

        assert_eq!(submit(&mut sched, &mut sim), SubmitOutcome::Idle);
    }

    #[test]
    fn test_disjoint_requests_keep_order() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        sched.enqueue(region(100, 100, 110, 110), WaveformMode::Du, UpdateMode::Partial).unwrap();

        let SubmitOutcome::Submitted(first) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        assert_eq!(first.region, region(0, 0, 10, 10));
        assert_eq!(first.waveform, sched.config().waveforms.du);

        // Second update is staged but the working buffer is occupied
        assert_eq!(submit(&mut sched, &mut sim), SubmitOutcome::WaitBuffer);
        assert_eq!(sched.census().pending, 1);

        sim.finish_working_buffer();
        let report = sched.service_interrupts(&mut sim);
        assert_eq!(report.resolution, Some(Resolution::Completed));

        let SubmitOutcome::Submitted(second) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        assert_eq!(second.region, region(100, 100, 110, 110));
        assert_ne!(second.lut, first.lut);
    }

    #[test]
    fn test_submission_sequence_on_registers() {
        use crate::mock::Op;

        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();
        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Full).unwrap();
        let SubmitOutcome::Submitted(cmd) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };

        let ops: heapless::Vec<Op, 8> = sim.ops().collect();
        assert_eq!(
            &ops[..],
            &[
                Op::EnableLut(cmd.lut),
                Op::EnableWorkingBuffer(true),
                Op::Submit(cmd),
            ]
        );
        assert_eq!(cmd.buffer_addr, sched.config().buffers.address(0));
        assert_eq!(sched.lut_order(cmd.lut), 1);
    }

    #[test]
    fn test_all_luts_busy() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();
        sim.set_active(LutMask::first(sched.allocator().lut_count()));

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        assert_eq!(submit(&mut sched, &mut sim), SubmitOutcome::WaitLut);
        assert_eq!(sched.census().pending, 1);
        assert!(sched.has_ready_work());
    }

    #[test]
    fn test_void_update_is_cancelled() {
        use crate::mock::Op;

        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();
        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(cmd) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };

        sim.void_update();
        sim.clear_ops();
        let report = sched.service_interrupts(&mut sim);
        assert_eq!(report.resolution, Some(Resolution::Cancelled));
        assert!(report.luts_freed.contains(cmd.lut));

        // The LUT never raises completion, so it is released here
        let ops: heapless::Vec<Op, 8> = sim.ops().collect();
        assert_eq!(
            &ops[..],
            &[
                Op::ClearWorkingBuffer,
                Op::EnableWorkingBuffer(false),
                Op::DisableLut(cmd.lut),
                Op::ClearLut(cmd.lut),
            ]
        );
        assert!(!sim.lut_irq_enabled(cmd.lut));
        assert_eq!(sched.lut_order(cmd.lut), 0);
        assert!(sched.is_buffer_idle());
        assert_eq!(sched.stats().cancelled, 1);
    }

    #[test]
    fn test_collision_with_newer_update_is_dropped() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();

        // Older update on LUT A is still in the working buffer while a
        // newer update already occupies LUT B
        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(a) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(b) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        // Collides with A (order 1 < 2): retried
        sim.collide(LutMask::single(a.lut), None);
        let report = sched.service_interrupts(&mut sim);
        assert!(matches!(report.resolution, Some(Resolution::Collided { .. })));
        assert_eq!(sched.census().retry, 1);

        // A new update on LUT C, then the retry collides with C: dropped
        sched.enqueue(region(200, 200, 300, 300), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(c) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        sim.finish_lut(a.lut);
        sched.service_interrupts(&mut sim);
        let SubmitOutcome::Submitted(retry) = submit(&mut sched, &mut sim) else {
            panic!("expected the retry to be submitted");
        };
        assert_eq!(retry.region, b.region);
        sim.collide(LutMask::single(c.lut), None);
        let report = sched.service_interrupts(&mut sim);
        assert_eq!(report.resolution, Some(Resolution::Stale));
        assert_eq!(sched.census().retry, 0);
        assert_eq!(sched.stats().stale_collisions, 1);
        assert_eq!(sched.census().total(), sched.pool().capacity());
    }

    #[test]
    fn test_orders_past_u32_keep_newer_updates() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();
        sched.next_order = u32::MAX as u64;

        let first = sched
            .enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial)
            .unwrap();
        assert_eq!(first, u32::MAX as u64);
        let SubmitOutcome::Submitted(a) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        let second = sched
            .enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial)
            .unwrap();
        assert_eq!(second, first + 1);
        submit(&mut sched, &mut sim);
        sim.collide(LutMask::single(a.lut), None);
        let report = sched.service_interrupts(&mut sim);
        assert!(matches!(report.resolution, Some(Resolution::Collided { .. })));
        assert_eq!(sched.census().retry, 1);
        assert_eq!(sched.stats().stale_collisions, 0);
    }

    #[test]
    fn test_collision_region_narrows_retry() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();

        sched.enqueue(region(0, 0, 100, 100), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(a) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        sched.enqueue(region(50, 50, 150, 150), WaveformMode::Du, UpdateMode::Partial).unwrap();
        submit(&mut sched, &mut sim);
        sim.collide(LutMask::single(a.lut), Region::new(50, 50, 100, 100));
        sched.service_interrupts(&mut sim);

        // Still blocked on A
        assert_eq!(submit(&mut sched, &mut sim), SubmitOutcome::Idle);

        sim.finish_lut(a.lut);
        let report = sched.service_interrupts(&mut sim);
        assert!(report.luts_freed.contains(a.lut));
        let SubmitOutcome::Submitted(retry) = submit(&mut sched, &mut sim) else {
            panic!("expected the retry to be submitted");
        };
        assert_eq!(retry.region, region(50, 50, 100, 100));
    }

    #[test]
    fn test_collision_must_be_read_before_clear() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(a) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        submit(&mut sched, &mut sim);
        sim.collide(LutMask::single(a.lut), None);

        // Clearing first wipes the shadow collision status
        let mut early = sim.clone();
        early.clear_working_buffer_irq();
        assert!(!early.collision_detected());
        assert_eq!(WorkingBufferStatus::capture(&mut early, 64).mask, LutMask::EMPTY);

        let report = sched.service_interrupts(&mut sim);
        assert!(matches!(report.resolution, Some(Resolution::Collided { .. })));
    }

    #[test]
    fn test_luts_completed_during_window_leave_collision_mask() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(a) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        sched.enqueue(region(0, 0, 10, 10), WaveformMode::Du, UpdateMode::Partial).unwrap();
        submit(&mut sched, &mut sim);
        // A retires in the same pass that reports the collision against it
        sim.collide(LutMask::single(a.lut), None);
        sim.finish_lut(a.lut);

        let report = sched.service_interrupts(&mut sim);
        assert_eq!(
            report.resolution,
            Some(Resolution::Collided {
                mask: LutMask::EMPTY,
                region: None
            })
        );
        // Unblocked immediately
        assert!(sched.has_ready_work());
    }

    #[test]
    fn test_underrun_is_counted() {
        let mut sched = ready(SchedulerConfig::new());
        let mut sim = SimController::new();
        sim.raise_underrun();
        let report = sched.service_interrupts(&mut sim);
        assert!(report.underrun);
        assert!(!sim.underrun());
        assert_eq!(sched.stats().underruns, 1);
    }

    #[test]
    fn test_unblocked_retries_merge() {
        let mut config = SchedulerConfig::new();
        config.buffers.count = 4;
        let mut sched = ready(config);
        let mut sim = SimController::new();

        sched.enqueue(region(0, 0, 50, 50), WaveformMode::Du, UpdateMode::Partial).unwrap();
        let SubmitOutcome::Submitted(a) = submit(&mut sched, &mut sim) else {
            panic!("expected a submission");
        };
        sim.finish_working_buffer();
        sched.service_interrupts(&mut sim);

        // Two later updates both collide with A
        for r in [region(0, 0, 20, 20), region(10, 10, 40, 40)] {
            sched.enqueue(r, WaveformMode::Du, UpdateMode::Partial).unwrap();
            assert!(matches!(submit(&mut sched, &mut sim), SubmitOutcome::Submitted(_)));
            sim.collide(LutMask::single(a.lut), None);
            sched.service_interrupts(&mut sim);
        }
        assert_eq!(sched.census().retry, 2);

        sim.finish_lut(a.lut);
        sched.service_interrupts(&mut sim);
        let before = sched.stats().merged;
        let SubmitOutcome::Submitted(retry) = submit(&mut sched, &mut sim) else {
            panic!("expected the retry to be submitted");
        };
        assert_eq!(retry.region, region(0, 0, 40, 40));
        assert_eq!(sched.stats().merged, before + 1);
        assert_eq!(sched.census().retry, 0);
        assert_eq!(sched.census().total(), 4);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Enqueue(u32, u32, u32, u32),
        Submit,
        FinishWorkingBuffer,
        Collide(u64),
        Void,
        FinishLut(u8),
        Underrun,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => (0u32..700, 0u32..500, 1u32..100, 1u32..100)
                .prop_map(|(x, y, w, h)| Step::Enqueue(x, y, w, h)),
            3 => Just(Step::Submit),
            2 => Just(Step::FinishWorkingBuffer),
            1 => any::<u64>().prop_map(Step::Collide),
            1 => Just(Step::Void),
            2 => (0u8..16).prop_map(Step::FinishLut),
            1 => Just(Step::Underrun),
        ]
    }

    proptest! {
        #[test]
        fn interleavings_keep_buffers_and_luts_consistent(
            steps in proptest::collection::vec(step(), 1..150),
            old_silicon in any::<bool>(),
        ) {
            let mut config = SchedulerConfig::new();
            config.buffers.count = 3;
            config.max_pending = 4;
            if old_silicon {
                config.hw.revision = crate::config::HwRevision::new(10);
            }
            let mut sched = ready(config);
            let mut sim = SimController::new();
            let lut_count = sched.allocator().lut_count();
            let mut retry_masks: heapless::Vec<(BufferId, LutMask), 8> = heapless::Vec::new();

            for step in steps {
                match step {
                    Step::Enqueue(x, y, w, h) => {
                        let _ = sched.enqueue(region(x, y, x + w, y + h), WaveformMode::Auto, UpdateMode::Partial);
                    }
                    Step::Submit => {
                        let _ = submit(&mut sched, &mut sim);
                    }
                    Step::FinishWorkingBuffer => sim.finish_working_buffer(),
                    Step::Collide(bits) => {
                        let mask = LutMask::from_bits(bits).without(LutMask::single(sim.last_lut().unwrap_or(Lut::INIT)));
                        sim.collide(mask.intersection(sim.active_luts()), None);
                    }
                    Step::Void => sim.void_update(),
                    Step::FinishLut(lut) => {
                        if let Some(lut) = Lut::new(lut % lut_count) {
                            sim.finish_lut(lut);
                        }
                    }
                    Step::Underrun => sim.raise_underrun(),
                }
                sched.service_interrupts(&mut sim);

                let census = sched.census();
                prop_assert_eq!(census.total(), 3);
                prop_assert!(census.in_flight <= 1);
                prop_assert!(sched.pool().is_consistent());
                prop_assert_eq!(sim.conflicts(), 0);

                // Retry masks only ever shrink while a buffer waits
                let mut next: heapless::Vec<(BufferId, LutMask), 8> = heapless::Vec::new();
                for &id in sched.pool().retry_ids() {
                    let mask = sched.pool().get(id).unwrap().collision_mask;
                    if let Some(&(_, prev)) = retry_masks.iter().find(|(prev_id, _)| *prev_id == id) {
                        prop_assert!(mask.is_subset_of(prev));
                    }
                    next.push((id, mask)).unwrap();
                }
                retry_masks = next;
            }
        }
    }
}

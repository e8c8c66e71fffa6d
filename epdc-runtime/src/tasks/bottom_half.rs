//! Interrupt bottom-half

use embassy_sync::blocking_mutex::raw::RawMutex;

use epdc_core::scheduler::InterruptReport;
use epdc_core::traits::{EpdcRegisters, PixelSource, PowerControl, WaveformTable};

use crate::device::Epdc;

impl<M, R, P, T, X> Epdc<M, R, P, T, X>
where
    M: RawMutex,
    R: EpdcRegisters,
    P: PowerControl,
    T: WaveformTable,
    X: PixelSource,
{
    /// Drain controller status once and wake whoever can make progress
    pub async fn service_interrupts(&self) -> InterruptReport {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        let report = inner.sched.service_interrupts(&mut inner.regs);

        if !report.luts_freed.is_empty() {
            self.lut_freed.signal(());
        }
        if report.wb_freed() {
            self.wb_freed.signal(());
        }
        if inner.sched.has_ready_work() {
            self.submit.signal(());
        }
        if inner.sched.is_buffer_idle() {
            self.idle.signal(());
        }
        if let Some(ticket) = inner.check_idle() {
            trace!("power-down in {} ms", ticket.delay_ms);
            self.power_cmd.signal(ticket);
        }
        report
    }

    /// Service interrupts as they are reported
    pub async fn run_bottom_half(&self) {
        debug!("bottom half started");

        loop {
            let _event = self.events.receive().await;
            // One pass reads every status bit, so queued events are redundant
            while self.events.try_receive().is_ok() {}
            self.service_interrupts().await;
        }
    }
}

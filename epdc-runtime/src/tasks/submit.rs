//! Submit worker

use embassy_sync::blocking_mutex::raw::RawMutex;

use epdc_core::scheduler::SubmitOutcome;
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
    /// One submission attempt under the device lock
    pub async fn process_submissions(&self) -> SubmitOutcome {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        inner.sched.try_submit(&mut inner.regs, &inner.table, &inner.pixels)
    }

    /// Submit staged work whenever the resources it needs are free
    pub async fn run_submit_worker(&self) {
        debug!("submit worker started");

        loop {
            match self.process_submissions().await {
                SubmitOutcome::Submitted(_) => {}
                SubmitOutcome::WaitBuffer => self.wb_freed.wait().await,
                SubmitOutcome::WaitLut => self.lut_freed.wait().await,
                SubmitOutcome::Idle => self.submit.wait().await,
            }
        }
    }
}

//! Power-down debounce worker

use embassy_futures::join::join3;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};

use epdc_core::power::PowerDownTicket;
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
    /// Cut power if `ticket` is still the current debounce window
    async fn expire_power_down(&self, ticket: PowerDownTicket) {
        let mut guard = self.lock().await;
        let inner = &mut *guard;
        match inner.power.expire(ticket, &mut inner.power_ctl) {
            Ok(true) => {}
            Ok(false) => trace!("power-down {} superseded", ticket.generation),
            // Logged by the power machine
            Err(_) => {}
        }
    }

    /// Wait out each debounce delay and then power down
    ///
    /// A newer ticket restarts the delay.
    pub async fn run_power_worker(&self) {
        debug!("power worker started");

        let mut ticket = self.power_cmd.wait().await;
        loop {
            let delay = Duration::from_millis(ticket.delay_ms as u64);
            match select(Timer::after(delay), self.power_cmd.wait()).await {
                Either::First(()) => {
                    self.expire_power_down(ticket).await;
                    ticket = self.power_cmd.wait().await;
                }
                Either::Second(newer) => ticket = newer,
            }
        }
    }

    /// Run every worker on the current task
    pub async fn run(&self) {
        join3(
            self.run_submit_worker(),
            self.run_bottom_half(),
            self.run_power_worker(),
        )
        .await;
    }
}

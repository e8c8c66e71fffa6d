//! EPDC device
//!
//! One [`Epdc`] owns the scheduler, the power machine and every
//! collaborator behind a single async mutex. No lock is held across an
//! await point other than the lock acquisition itself.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use embassy_time::{with_deadline, Duration, Instant, Timer};

use epdc_core::config::{PowerDownDelay, SchedulerConfig};
use epdc_core::lut::Lut;
use epdc_core::power::{PowerDownTicket, PowerMachine, PowerState};
use epdc_core::scheduler::{Census, Scheduler, Stats};
use epdc_core::traits::{EpdcRegisters, PixelSource, PowerControl, SubmitCommand, WaveformTable};
use epdc_core::update::{Region, UpdateMode, WaveformMode};
use epdc_core::waveform::Temperature;
use epdc_core::Error;

use crate::events::{EventQueue, InterruptLine};

/// State guarded by the device lock
pub(crate) struct Inner<R, P, T, X> {
    pub(crate) sched: Scheduler,
    pub(crate) power: PowerMachine,
    pub(crate) regs: R,
    pub(crate) power_ctl: P,
    pub(crate) table: T,
    pub(crate) pixels: X,
}

impl<R, P, T, X> Inner<R, P, T, X>
where
    R: EpdcRegisters,
    P: PowerControl,
{
    /// Start the power-down debounce if nothing is left to do
    ///
    /// A zero delay cuts power right away; otherwise the ticket is returned
    /// for the power worker.
    pub(crate) fn check_idle(&mut self) -> Option<PowerDownTicket> {
        if !self.sched.is_buffer_idle() || !self.regs.lut_active().is_empty() {
            return None;
        }
        let ticket = self.power.queue_idle()?;
        if ticket.delay_ms > 0 {
            return Some(ticket);
        }
        // A failed cut is logged by the machine and leaves the controller on
        let _ = self.power.expire(ticket, &mut self.power_ctl);
        None
    }
}

/// Display controller with its update scheduler
pub struct Epdc<M: RawMutex, R, P, T, X> {
    pub(crate) inner: Mutex<M, Inner<R, P, T, X>>,
    /// New work may be ready
    pub(crate) submit: Signal<M, ()>,
    /// Working buffer released
    pub(crate) wb_freed: Signal<M, ()>,
    /// A LUT became available
    pub(crate) lut_freed: Signal<M, ()>,
    /// Queues drained
    pub(crate) idle: Signal<M, ()>,
    /// Debounce request for the power worker
    pub(crate) power_cmd: Signal<M, PowerDownTicket>,
    pub(crate) events: EventQueue<M>,
    config: SchedulerConfig,
}

impl<M, R, P, T, X> Epdc<M, R, P, T, X>
where
    M: RawMutex,
    R: EpdcRegisters,
    P: PowerControl,
    T: WaveformTable,
    X: PixelSource,
{
    pub fn new(config: SchedulerConfig, regs: R, power_ctl: P, table: T, pixels: X) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sched: Scheduler::new(config),
                power: PowerMachine::new(config.power_down),
                regs,
                power_ctl,
                table,
                pixels,
            }),
            submit: Signal::new(),
            wb_freed: Signal::new(),
            lut_freed: Signal::new(),
            idle: Signal::new(),
            power_cmd: Signal::new(),
            events: Channel::new(),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Handle for the hard interrupt handler
    pub fn interrupt_line(&self) -> InterruptLine<'_, M> {
        InterruptLine::new(&self.events)
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, M, Inner<R, P, T, X>> {
        self.inner.lock().await
    }

    /// Power up, clear the panel and start accepting updates
    pub async fn init(&self) -> Result<(), Error> {
        self.draw_full_refresh(WaveformMode::Init).await?;

        self.lock().await.sched.set_ready();
        info!("display controller ready");
        Ok(())
    }

    /// Queue a screen update
    ///
    /// Powers the controller up if needed and cancels a pending power-down.
    /// Returns the order number assigned to the update.
    pub async fn submit_update(
        &self,
        region: Region,
        waveform: WaveformMode,
        mode: UpdateMode,
    ) -> Result<u64, Error> {
        let order = {
            let mut guard = self.lock().await;
            let inner = &mut *guard;
            inner.sched.check_accept(&region)?;
            inner.power.ensure_on(&mut inner.power_ctl)?;
            inner.sched.enqueue(region, waveform, mode)?
        };
        self.submit.signal(());
        Ok(order)
    }

    /// Wait until every queued update has left the working buffer
    ///
    /// Supports a single waiter at a time.
    pub async fn flush_updates(&self) -> Result<(), Error> {
        let timeout = Duration::from_millis(self.config.timing.flush_timeout_ms as u64);
        let deadline = Instant::now() + timeout;

        loop {
            if self.lock().await.sched.is_buffer_idle() {
                return Ok(());
            }
            if with_deadline(deadline, self.idle.wait()).await.is_err() {
                error!("flush timed out after {} ms", self.config.timing.flush_timeout_ms);
                return Err(Error::Timeout);
            }
        }
    }

    /// Refresh the whole panel on LUT 0 and poll for completion
    ///
    /// Bypasses the scheduler, so it is refused while an update occupies
    /// the working buffer or LUT 0. Uses its own working buffer placed
    /// after the pool. Work queued meanwhile is released once the refresh
    /// leaves the working buffer.
    pub async fn draw_full_refresh(&self, mode: WaveformMode) -> Result<(), Error> {
        {
            let mut guard = self.lock().await;
            let inner = &mut *guard;

            if inner.sched.pool().in_flight().is_some()
                || inner.regs.working_buffer_busy()
                || inner.regs.lut_active().contains(Lut::INIT)
            {
                return Err(Error::Busy);
            }
            inner.power.ensure_on(&mut inner.power_ctl)?;

            let region = Region::full(self.config.panel.width, self.config.panel.height);
            let selector = inner.sched.waveforms();
            let cmd = SubmitCommand {
                buffer_addr: self.config.buffers.refresh_addr(),
                region,
                waveform: selector.mode_id(mode, &inner.pixels, &region),
                mode: UpdateMode::Full,
                lut: Lut::INIT,
                temp_index: selector.temperature_index(&inner.table),
            };
            inner.regs.submit(&cmd);
            debug!("full refresh started");
        }

        let poll = Duration::from_millis(self.config.timing.full_refresh_poll_ms as u64);
        for _ in 0..self.config.timing.full_refresh_poll_limit {
            Timer::after(poll).await;

            let mut guard = self.lock().await;
            let inner = &mut *guard;
            if inner.regs.lut_active().contains(Lut::INIT) || inner.regs.working_buffer_busy() {
                continue;
            }
            inner.regs.clear_lut_complete_irq(Lut::INIT);
            inner.regs.clear_working_buffer_irq();
            debug!("full refresh done");

            // The submit worker may be parked behind the refresh
            self.wb_freed.signal(());
            if inner.sched.has_ready_work() {
                self.submit.signal(());
            }
            if let Some(ticket) = inner.check_idle() {
                self.power_cmd.signal(ticket);
            }
            return Ok(());
        }

        error!("full refresh did not complete");
        Err(Error::Timeout)
    }

    /// Reject new updates with `Busy`; queued work still drains
    pub async fn pause_updates(&self) {
        self.lock().await.sched.pause();
    }

    pub async fn resume_updates(&self) {
        self.lock().await.sched.resume();
    }

    /// Force a temperature or return to the ambient reading
    pub async fn set_temperature(&self, temperature: Temperature) {
        self.lock().await.sched.waveforms_mut().set_temperature(temperature);
    }

    pub async fn set_ambient_temperature(&self, celsius: i16) {
        self.lock().await.sched.waveforms_mut().set_ambient(celsius);
    }

    pub async fn set_power_down_delay(&self, delay: PowerDownDelay) {
        let mut inner = self.lock().await;
        inner.power.set_policy(delay);
        if let Some(ticket) = inner.check_idle() {
            self.power_cmd.signal(ticket);
        }
    }

    pub async fn census(&self) -> Census {
        self.lock().await.sched.census()
    }

    pub async fn power_state(&self) -> PowerState {
        self.lock().await.power.state()
    }

    pub async fn stats(&self) -> Stats {
        let inner = self.lock().await;
        let mut stats = inner.sched.stats();
        stats.power_ups = inner.power.power_ups();
        stats.power_downs = inner.power.power_downs();
        stats
    }

    /// Run `f` on the register interface under the device lock
    pub async fn with_registers<F, O>(&self, f: F) -> O
    where
        F: FnOnce(&mut R) -> O,
    {
        f(&mut self.lock().await.regs)
    }

    /// Run `f` on the power controller under the device lock
    pub async fn with_power_control<F, O>(&self, f: F) -> O
    where
        F: FnOnce(&mut P) -> O,
    {
        f(&mut self.lock().await.power_ctl)
    }
}

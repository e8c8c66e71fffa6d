//! Hardware interrupt events

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

/// Capacity of the interrupt event queue
pub const EVENT_QUEUE_DEPTH: usize = 4;

/// Interrupt source reported by the hard interrupt handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwEvent {
    /// Working buffer finished processing
    WorkingBuffer,
    /// One or more LUTs finished driving the panel
    LutComplete,
    /// Timing controller underrun
    Underrun,
}

pub(crate) type EventQueue<M> = Channel<M, HwEvent, EVENT_QUEUE_DEPTH>;

/// Producer handle for the interrupt handler
///
/// The bottom-half reads all status registers on every pass, so events only
/// need to wake it. A full queue already guarantees a pass.
pub struct InterruptLine<'a, M: RawMutex> {
    queue: &'a EventQueue<M>,
}

impl<'a, M: RawMutex> InterruptLine<'a, M> {
    pub(crate) fn new(queue: &'a EventQueue<M>) -> Self {
        Self { queue }
    }

    /// Report an interrupt; never blocks
    ///
    /// Returns `false` if the event was coalesced into a queued one.
    pub fn notify(&self, event: HwEvent) -> bool {
        self.queue.try_send(event).is_ok()
    }
}

impl<M: RawMutex> Clone for InterruptLine<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for InterruptLine<'_, M> {}

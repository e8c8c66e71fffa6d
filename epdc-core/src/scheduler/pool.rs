//! Working-buffer pool
//!
//! Buffers live in a fixed arena and are referenced by [`BufferId`]. Every
//! buffer is owned by exactly one place at a time: the free list, the
//! pending slot, the collision retry list or the in-flight slot. The only
//! way to change ownership is through the transfer methods below, each of
//! which removes the buffer from one place before adding it to another.

use heapless::{Deque, Vec};

use crate::config::{BufferConfig, MAX_BUFFERS};
use crate::lut::{Lut, LutMask};
use crate::update::UpdateRequest;

/// Index of a buffer in the pool arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferId(u8);

impl BufferId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a buffer currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Location {
    Free,
    Pending,
    Retry,
    InFlight,
}

/// One working buffer
#[derive(Debug, Clone, Copy)]
pub struct UpdateBuffer {
    addr: u32,
    location: Location,
    /// Update staged in this buffer
    pub request: Option<UpdateRequest>,
    /// LUT driving the update; only meaningful while submitted
    pub lut: Option<Lut>,
    /// LUTs that must complete before a retry
    pub collision_mask: LutMask,
}

impl UpdateBuffer {
    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn location(&self) -> Location {
        self.location
    }

    fn reset(&mut self) {
        self.request = None;
        self.lut = None;
        self.collision_mask = LutMask::EMPTY;
    }
}

/// Buffer counts per owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Census {
    pub free: usize,
    pub pending: usize,
    pub retry: usize,
    pub in_flight: usize,
}

impl Census {
    pub fn total(&self) -> usize {
        self.free + self.pending + self.retry + self.in_flight
    }
}

/// Fixed pool of working buffers
#[derive(Debug)]
pub struct BufferPool {
    slots: Vec<UpdateBuffer, MAX_BUFFERS>,
    free: Deque<BufferId, MAX_BUFFERS>,
    retry: Vec<BufferId, MAX_BUFFERS>,
    pending: Option<BufferId>,
    in_flight: Option<BufferId>,
}

impl BufferPool {
    /// Create `count` buffers (clamped to `1..=MAX_BUFFERS`), all free
    pub fn new(config: &BufferConfig, count: usize) -> Self {
        let count = count.clamp(1, MAX_BUFFERS);
        let mut slots = Vec::new();
        let mut free = Deque::new();

        for i in 0..count as u8 {
            let buffer = UpdateBuffer {
                addr: config.address(i),
                location: Location::Free,
                request: None,
                lut: None,
                collision_mask: LutMask::EMPTY,
            };
            // Both have MAX_BUFFERS capacity and count is clamped to it
            let _ = slots.push(buffer);
            let _ = free.push_back(BufferId(i));
        }

        Self {
            slots,
            free,
            retry: Vec::new(),
            pending: None,
            in_flight: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: BufferId) -> Option<&UpdateBuffer> {
        self.slots.get(id.index())
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut UpdateBuffer> {
        self.slots.get_mut(id.index())
    }

    pub fn census(&self) -> Census {
        Census {
            free: self.free.len(),
            pending: self.pending.is_some() as usize,
            retry: self.retry.len(),
            in_flight: self.in_flight.is_some() as usize,
        }
    }

    pub fn pending(&self) -> Option<BufferId> {
        self.pending
    }

    pub fn in_flight(&self) -> Option<BufferId> {
        self.in_flight
    }

    pub fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    /// Buffers waiting for a collision to clear, oldest first
    pub fn retry_ids(&self) -> &[BufferId] {
        &self.retry
    }

    /// Every buffer is on the free list
    pub fn is_idle(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// Move a free buffer into the empty pending slot
    pub fn claim_pending(&mut self) -> Option<BufferId> {
        if self.pending.is_some() {
            return None;
        }
        let id = self.free.pop_front()?;
        self.set_location(id, Location::Pending);
        self.pending = Some(id);
        Some(id)
    }

    /// Move a retry buffer into the empty pending slot
    pub fn retry_to_pending(&mut self, id: BufferId) -> bool {
        if self.pending.is_some() || !self.take_retry(id) {
            return false;
        }
        self.set_location(id, Location::Pending);
        self.pending = Some(id);
        true
    }

    /// Hand the pending buffer to the hardware
    pub fn pending_to_in_flight(&mut self) -> Option<BufferId> {
        if self.in_flight.is_some() {
            return None;
        }
        let id = self.pending.take()?;
        self.set_location(id, Location::InFlight);
        self.in_flight = Some(id);
        Some(id)
    }

    /// Park the in-flight buffer until its collision mask clears
    pub fn in_flight_to_retry(&mut self) -> Option<BufferId> {
        let id = self.in_flight?;
        if self.retry.push(id).is_err() {
            return None;
        }
        self.in_flight = None;
        self.set_location(id, Location::Retry);
        Some(id)
    }

    /// Return a buffer to the free list from wherever it is
    ///
    /// Returns `false` if the buffer is already free or unknown.
    pub fn release(&mut self, id: BufferId) -> bool {
        let location = match self.get(id) {
            Some(buffer) => buffer.location,
            None => return false,
        };

        let removed = match location {
            Location::Free => false,
            Location::Pending => take_if(&mut self.pending, id),
            Location::InFlight => take_if(&mut self.in_flight, id),
            Location::Retry => self.take_retry(id),
        };
        if !removed || self.free.push_back(id).is_err() {
            return false;
        }

        if let Some(buffer) = self.get_mut(id) {
            buffer.reset();
            buffer.location = Location::Free;
        }
        true
    }

    /// Remove completed LUTs from every retry mask
    pub fn clear_collisions(&mut self, completed: LutMask) {
        for i in 0..self.retry.len() {
            let id = self.retry[i];
            if let Some(buffer) = self.slots.get_mut(id.index()) {
                buffer.collision_mask = buffer.collision_mask.without(completed);
            }
        }
    }

    /// Whether list membership agrees with every buffer's location
    pub fn is_consistent(&self) -> bool {
        let census = self.census();
        if census.total() != self.slots.len() {
            return false;
        }

        self.slots.iter().enumerate().all(|(i, buffer)| {
            let id = BufferId(i as u8);
            let listed = match buffer.location {
                Location::Free => self.free.iter().filter(|&&f| f == id).count(),
                Location::Retry => self.retry.iter().filter(|&&r| r == id).count(),
                Location::Pending => (self.pending == Some(id)) as usize,
                Location::InFlight => (self.in_flight == Some(id)) as usize,
            };
            listed == 1
        })
    }

    fn take_retry(&mut self, id: BufferId) -> bool {
        match self.retry.iter().position(|&r| r == id) {
            Some(pos) => {
                // Keep retry order stable
                self.retry.remove(pos);
                true
            }
            None => false,
        }
    }

    fn set_location(&mut self, id: BufferId, location: Location) {
        if let Some(buffer) = self.get_mut(id) {
            buffer.location = location;
        }
    }
}

fn take_if(slot: &mut Option<BufferId>, id: BufferId) -> bool {
    if *slot == Some(id) {
        *slot = None;
        true
    } else {
        false
    }
}

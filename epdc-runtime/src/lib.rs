//! Async runtime for the EPDC update scheduler
//!
//! Wraps an [`epdc_core::scheduler::Scheduler`] in a single async mutex and
//! runs it with three cooperating workers:
//!
//! - Submit worker: stages updates and hands them to the controller
//! - Interrupt bottom-half: drains controller status after each interrupt
//! - Power worker: cuts controller power after the idle debounce
//!
//! The hard interrupt handler only pushes [`HwEvent`]s through an
//! [`InterruptLine`]; everything else runs in task context.

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod device;
pub mod events;
mod tasks;

pub use device::Epdc;
pub use events::{HwEvent, InterruptLine, EVENT_QUEUE_DEPTH};
